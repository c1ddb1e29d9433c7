//! Shared plumbing for the command-line binaries.

use std::path::Path;
use std::process::ExitCode;

use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::RunConfig;
use crate::Result;

/// Parse a log level name, defaulting to `INFO` for anything unknown.
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global tracing subscriber. Returns false if one was
/// already installed.
pub fn init_tracing(level: Level) -> bool {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// Load the config at `config_path`, set up logging from it and run `task`.
///
/// `task` returns whether the run fully succeeded; any error is logged.
/// The process exits 0 only on full success.
pub fn run<F>(config_path: &Path, task: F) -> ExitCode
where
    F: FnOnce(&RunConfig) -> Result<bool>,
{
    if run_task(config_path, task) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_task<F>(config_path: &Path, task: F) -> bool
where
    F: FnOnce(&RunConfig) -> Result<bool>,
{
    let config = match RunConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(Level::INFO);
            error!("{}", e);
            return false;
        }
    };
    init_tracing(parse_level(&config.log_level));

    match task(&config) {
        Ok(done) => done,
        Err(e) => {
            error!("[{}] {}", e.category(), e);
            false
        }
    }
}
