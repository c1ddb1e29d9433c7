//! Compute the keepbit map of one container file.
//!
//! ```bash
//! find-keepbits run.toml
//! ```
//!
//! Reads `INPUT_FILE`, `OUTPUT_DIR` and `INFLEVEL` from the `[config]`
//! table and writes `<OUTPUT_DIR>/<input name>.keepbits.toml`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use bitkeep::{cli, compute_and_save_keepbits};

#[derive(Parser, Debug)]
#[command(name = "find-keepbits")]
#[command(version)]
#[command(about = "Compute per-variable keepbits from bit information", long_about = None)]
struct Args {
    /// Run configuration file (TOML with a [config] table)
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    cli::run(&args.config, |config| {
        let (input, output_dir) = config.find_keepbits_paths()?;
        info!("analyzing {} at inflevel {}", input.display(), config.inflevel);

        let path = compute_and_save_keepbits(input, output_dir, config.inflevel, &config.analyzer_config())?;
        println!("{}", path.display());
        Ok(true)
    })
}
