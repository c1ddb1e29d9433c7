//! Batch compression of a directory tree.
//!
//! Walks a source tree, compresses every container file with its keepbit
//! map and writes the result at the same relative path under the
//! destination tree. A failing file is recorded in the report and the batch
//! moves on.
//!
//! ## Usage
//!
//! ```ignore
//! use bitkeep::{run_batch, BatchConfig, KeepbitSource};
//!
//! let config = BatchConfig::new("/data/src", "/data/dst", KeepbitSource::directory("/data/maps"));
//! let report = run_batch(&config)?;
//! println!("{}", report.metrics.summary());
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use bitkeep_core::Metrics;

use crate::container::DEFAULT_EXTENSION;
use crate::keepbits::{KeepbitMap, KeepbitSource};
use crate::pipeline::{compress_with_keepbits, CompressionOptions, CompressionOutcome};
use crate::{Error, Result};

/// Upper bound on the default worker count.
const MAX_DEFAULT_WORKERS: usize = 16;

/// Default worker count: available CPUs, capped.
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)
}

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Root of the tree to compress.
    pub source_dir: PathBuf,
    /// Root of the mirrored output tree.
    pub dest_dir: PathBuf,
    /// Where each file's keepbit map comes from.
    pub keepbits: KeepbitSource,
    /// Extension of files to process, without the dot.
    pub extension: String,
    /// Worker threads.
    pub workers: usize,
    pub options: CompressionOptions,
    /// Show a progress bar on stderr.
    pub progress: bool,
}

impl BatchConfig {
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>, keepbits: KeepbitSource) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            keepbits,
            extension: DEFAULT_EXTENSION.to_string(),
            workers: default_workers(),
            options: CompressionOptions::default(),
            progress: false,
        }
    }
}

/// Result for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Succeeded(CompressionOutcome),
    Failed {
        input: PathBuf,
        reason: String,
        /// Stable error category, see [`Error::category`].
        category: String,
    },
}

impl FileOutcome {
    pub fn input(&self) -> &Path {
        match self {
            FileOutcome::Succeeded(outcome) => &outcome.input,
            FileOutcome::Failed { input, .. } => input,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Succeeded(_))
    }
}

/// Final report after a batch completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per source file, in sorted source order.
    pub outcomes: Vec<FileOutcome>,
    pub metrics: Metrics,
    pub elapsed_seconds: f64,
    pub workers: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// True if every file was compressed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// All files under `root` with `extension`, sorted by path.
pub fn discover_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::configuration(format!(
            "source directory {} does not exist",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == extension) {
            files.push(entry.into_path());
        }
    }

    // Sort for deterministic order
    files.sort();
    Ok(files)
}

/// Destination of `file` under `dest_root`, at its path relative to
/// `source_root`.
pub fn mirror_path(source_root: &Path, dest_root: &Path, file: &Path) -> Result<PathBuf> {
    let relative = file.strip_prefix(source_root).map_err(|_| {
        Error::configuration(format!(
            "{} is not under {}",
            file.display(),
            source_root.display()
        ))
    })?;
    Ok(dest_root.join(relative))
}

fn progress_bar(len: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn compress_one(config: &BatchConfig, shared: Option<&KeepbitMap>, file: &Path) -> Result<CompressionOutcome> {
    let output = mirror_path(&config.source_dir, &config.dest_dir, file)?;

    let loaded;
    let map = match shared {
        Some(map) => map,
        None => {
            loaded = config.keepbits.load_for(file)?;
            &loaded
        }
    };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::write_io(&output, "cannot create destination directory", e))?;
    }

    compress_with_keepbits(file, &output, map, &config.options)
}

/// Compress every matching file under `config.source_dir`.
///
/// Fails up front only for problems that would fail every file: a missing
/// source tree, an unusable destination root or an invalid shared keepbit
/// map. Everything else is recorded per file.
pub fn run_batch(config: &BatchConfig) -> Result<BatchReport> {
    let start = Instant::now();

    let files = discover_files(&config.source_dir, &config.extension)?;
    std::fs::create_dir_all(&config.dest_dir)
        .map_err(|e| Error::write_io(&config.dest_dir, "cannot create destination directory", e))?;

    let shared = match &config.keepbits {
        KeepbitSource::Shared(path) => Some(KeepbitMap::load(path)?),
        KeepbitSource::Directory { .. } => None,
    };

    let workers = config.workers.max(1);
    info!(
        "compressing {} files from {} with {} workers",
        files.len(),
        config.source_dir.display(),
        workers
    );

    let pb = progress_bar(files.len(), config.progress);
    let process = |file: &PathBuf| -> FileOutcome {
        let result = compress_one(config, shared.as_ref(), file);
        pb.inc(1);
        if let Some(name) = file.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }

        match result {
            Ok(outcome) => {
                info!("{} → {}", outcome.summary_line(), outcome.output.display());
                FileOutcome::Succeeded(outcome)
            }
            Err(e) => {
                error!("{}: {}", file.display(), e);
                FileOutcome::Failed {
                    input: file.clone(),
                    reason: e.to_string(),
                    category: e.category().to_string(),
                }
            }
        }
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<FileOutcome> = {
        use rayon::prelude::*;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create thread pool: {}", e)))?;
        pool.install(|| files.par_iter().map(process).collect())
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<FileOutcome> = files.iter().map(process).collect();

    pb.finish_with_message("done");

    let mut metrics = Metrics::new();
    for outcome in &outcomes {
        match outcome {
            FileOutcome::Succeeded(o) => metrics.record(&o.stats),
            FileOutcome::Failed { .. } => metrics.record_error(),
        }
    }

    let report = BatchReport {
        outcomes,
        metrics,
        elapsed_seconds: start.elapsed().as_secs_f64(),
        workers,
    };

    info!("{}", report.metrics.summary());
    if !report.is_success() {
        warn!("{} of {} files failed", report.failed(), report.outcomes.len());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/deep")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        for f in ["b/deep/z.gac", "a/y.gac", "top.gac", "a/notes.txt", "b/x.gac.keepbits.toml"] {
            fs::write(root.join(f), b"").unwrap();
        }
        fs::create_dir_all(root.join("dir.gac")).unwrap();

        let files = discover_files(root, "gac").unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(rel, vec!["a/y.gac", "b/deep/z.gac", "top.gac"]);
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_files(&dir.path().join("absent"), "gac").unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_mirror_path() {
        let out = mirror_path(Path::new("/src"), Path::new("/dst"), Path::new("/src/a/b/x.gac")).unwrap();
        assert_eq!(out, PathBuf::from("/dst/a/b/x.gac"));
        assert!(mirror_path(Path::new("/src"), Path::new("/dst"), Path::new("/other/x.gac")).is_err());
    }

    #[test]
    fn test_default_workers_bounded() {
        let n = default_workers();
        assert!((1..=MAX_DEFAULT_WORKERS).contains(&n));
    }

    #[test]
    fn test_invalid_shared_map_fails_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let map = dir.path().join("shared.toml");
        fs::write(&map, "[meta]\nformat_version = 1\n").unwrap();

        let config = BatchConfig::new(&src, dir.path().join("dst"), KeepbitSource::Shared(map));
        assert_eq!(run_batch(&config).unwrap_err().category(), "configuration");
    }

    #[test]
    fn test_empty_tree_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let config = BatchConfig::new(&src, dir.path().join("dst"), KeepbitSource::directory(dir.path()));
        let report = run_batch(&config).unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.is_success());
        assert!(dir.path().join("dst").is_dir());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let failed = FileOutcome::Failed {
            input: PathBuf::from("a.gac"),
            reason: "boom".into(),
            category: "write".into(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["category"], "write");
        assert_eq!(failed.input(), Path::new("a.gac"));
    }
}
