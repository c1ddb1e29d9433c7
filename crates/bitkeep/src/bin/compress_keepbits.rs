//! Bit-round and compress one container file.
//!
//! ```bash
//! compress-keepbits run.toml
//! ```
//!
//! Reads `INPUT_FILE`, `OUTPUT_FILE` and `KEEPBITS_INI` or `KEEPBITS_INF`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};

use bitkeep::{cli, compress_with_keepbits};

#[derive(Parser, Debug)]
#[command(name = "compress-keepbits")]
#[command(version)]
#[command(about = "Bit-round and compress one file using its keepbit map", long_about = None)]
struct Args {
    /// Run configuration file (TOML with a [config] table)
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    cli::run(&args.config, |config| {
        let (input, output) = config.compress_paths()?;
        let keepbits = config.keepbit_source()?.load_for(input)?;

        let outcome = compress_with_keepbits(input, output, &keepbits, &config.compression_options())?;
        info!("{} → {}", outcome.summary_line(), outcome.output.display());
        info!(
            "rounded {} of {} variables, {:.1}% smaller",
            outcome.quantized_variables,
            outcome.variables,
            outcome.stats.savings_percent()
        );
        if !outcome.quality.all_within_bound() {
            warn!("rounding error above bound for: {}", outcome.quality.violations.join(", "));
        }
        Ok(true)
    })
}
