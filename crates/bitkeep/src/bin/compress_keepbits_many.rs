//! Compress a whole directory tree, mirroring it under a destination.
//!
//! ```bash
//! compress-keepbits-many run.toml
//! ```
//!
//! Reads `SOURCE_DIR`, `DEST_DIR` and `KEEPBITS_INI` or `KEEPBITS_INF`,
//! plus the optional `WORKERS`, `FILE_EXTENSION` and `PROGRESS`. Exits
//! non-zero if any file failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};

use bitkeep::{cli, run_batch, FileOutcome};

#[derive(Parser, Debug)]
#[command(name = "compress-keepbits-many")]
#[command(version)]
#[command(about = "Bit-round and compress every file under a source tree", long_about = None)]
struct Args {
    /// Run configuration file (TOML with a [config] table)
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    cli::run(&args.config, |config| {
        let batch = config.batch_config()?;
        let report = run_batch(&batch)?;

        info!(
            "{} succeeded, {} failed in {:.1}s",
            report.succeeded(),
            report.failed(),
            report.elapsed_seconds
        );
        for failure in report.failures() {
            if let FileOutcome::Failed { input, reason, category } = failure {
                warn!("  {} [{}]: {}", input.display(), category, reason);
            }
        }
        Ok(report.is_success())
    })
}
