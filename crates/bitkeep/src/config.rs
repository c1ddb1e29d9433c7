//! Run configuration.
//!
//! Every binary takes one TOML file with a `[config]` table:
//!
//! ```toml
//! [config]
//! SOURCE_DIR   = "/data/src"
//! DEST_DIR     = "/data/dst"
//! KEEPBITS_INF = "/data/maps"   # or KEEPBITS_INI = "/data/shared.keepbits.toml"
//! INFLEVEL     = 0.99
//! WORKERS      = 8
//! ```
//!
//! Keys a binary does not use are ignored; keys it needs but cannot find
//! are configuration errors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bitkeep_core::CompressionLevel;
use bitkeep_filters::CompressionFilter;

use crate::batch::{default_workers, BatchConfig};
use crate::bitinfo::{AnalyzerConfig, DEFAULT_EXCLUDED_DIMS, DEFAULT_EXCLUDED_VARIABLES};
use crate::container::DEFAULT_EXTENSION;
use crate::keepbits::KeepbitSource;
use crate::pipeline::{CompressionOptions, KeepbitPolicy};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct ConfigFile {
    config: RunConfig,
}

/// Contents of the `[config]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RunConfig {
    /// Root of the tree to compress.
    pub source_dir: Option<PathBuf>,
    /// Root of the mirrored output tree.
    pub dest_dir: Option<PathBuf>,
    /// One keepbit map shared by every file.
    pub keepbits_ini: Option<PathBuf>,
    /// Directory holding one keepbit map per file.
    pub keepbits_inf: Option<PathBuf>,
    /// Fraction of information to retain.
    #[serde(default = "default_inflevel")]
    pub inflevel: f64,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    /// Where find-keepbits writes its map.
    pub output_dir: Option<PathBuf>,

    /// Batch worker threads.
    pub workers: Option<usize>,
    /// Extension of container files, without the dot.
    #[serde(default = "default_extension")]
    pub file_extension: String,
    /// Zlib level, 0-9.
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Reject float variables missing from the keepbit map.
    #[serde(default)]
    pub strict_keepbits: bool,
    #[serde(default = "default_excluded_variables")]
    pub excluded_variables: Vec<String>,
    #[serde(default = "default_excluded_dims")]
    pub excluded_dims: Vec<String>,
    #[serde(default = "default_min_dim_extent")]
    pub min_dim_extent: usize,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Show a progress bar during batches.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            dest_dir: None,
            keepbits_ini: None,
            keepbits_inf: None,
            inflevel: default_inflevel(),
            input_file: None,
            output_file: None,
            output_dir: None,
            workers: None,
            file_extension: default_extension(),
            compression_level: default_compression_level(),
            strict_keepbits: false,
            excluded_variables: default_excluded_variables(),
            excluded_dims: default_excluded_dims(),
            min_dim_extent: default_min_dim_extent(),
            confidence: default_confidence(),
            log_level: default_log_level(),
            progress: default_progress(),
        }
    }
}

fn required<'a>(value: &'a Option<PathBuf>, key: &str) -> Result<&'a Path> {
    value
        .as_deref()
        .ok_or_else(|| Error::configuration(format!("missing required key {}", key)))
}

impl RunConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| Error::configuration(format!("malformed config: {}", e)))?;
        file.config.validate()?;
        Ok(file.config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.inflevel > 0.0 && self.inflevel <= 1.0) {
            return Err(Error::configuration(format!(
                "INFLEVEL must be in (0, 1], got {}",
                self.inflevel
            )));
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(Error::configuration(format!(
                "COMPRESSION_LEVEL must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.workers == Some(0) {
            return Err(Error::configuration("WORKERS must be at least 1"));
        }
        if self.file_extension.is_empty() || self.file_extension.starts_with('.') {
            return Err(Error::configuration(format!(
                "FILE_EXTENSION must be a bare extension like \"{}\", got \"{}\"",
                DEFAULT_EXTENSION, self.file_extension
            )));
        }
        self.analyzer_config().validate()
    }

    /// Keepbit map location; a shared map wins over a map directory.
    pub fn keepbit_source(&self) -> Result<KeepbitSource> {
        match (&self.keepbits_ini, &self.keepbits_inf) {
            (Some(shared), _) => Ok(KeepbitSource::Shared(shared.clone())),
            (None, Some(dir)) => Ok(KeepbitSource::directory(dir.clone())),
            (None, None) => Err(Error::configuration(
                "missing required key KEEPBITS_INI or KEEPBITS_INF",
            )),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            excluded_variables: self.excluded_variables.clone(),
            excluded_dims: self.excluded_dims.clone(),
            min_dim_extent: self.min_dim_extent,
            confidence: self.confidence,
            ..AnalyzerConfig::default()
        }
    }

    pub fn compression_options(&self) -> CompressionOptions {
        CompressionOptions {
            compression: CompressionFilter::Zlib(CompressionLevel::from_level(self.compression_level)),
            excluded_variables: self.excluded_variables.clone(),
            policy: if self.strict_keepbits {
                KeepbitPolicy::Strict
            } else {
                KeepbitPolicy::PassThrough
            },
            ..CompressionOptions::default()
        }
    }

    /// `INPUT_FILE` and `OUTPUT_DIR` for find-keepbits.
    pub fn find_keepbits_paths(&self) -> Result<(&Path, &Path)> {
        Ok((
            required(&self.input_file, "INPUT_FILE")?,
            required(&self.output_dir, "OUTPUT_DIR")?,
        ))
    }

    /// `INPUT_FILE` and `OUTPUT_FILE` for compress-keepbits.
    pub fn compress_paths(&self) -> Result<(&Path, &Path)> {
        Ok((
            required(&self.input_file, "INPUT_FILE")?,
            required(&self.output_file, "OUTPUT_FILE")?,
        ))
    }

    /// Batch settings for compress-keepbits-many.
    pub fn batch_config(&self) -> Result<BatchConfig> {
        let source = required(&self.source_dir, "SOURCE_DIR")?;
        let dest = required(&self.dest_dir, "DEST_DIR")?;

        let mut config = BatchConfig::new(source, dest, self.keepbit_source()?);
        config.extension = self.file_extension.clone();
        config.workers = self.workers.unwrap_or_else(default_workers);
        config.options = self.compression_options();
        config.progress = self.progress;
        Ok(config)
    }
}

fn default_inflevel() -> f64 {
    0.99
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_compression_level() -> i32 {
    6
}

fn default_excluded_variables() -> Vec<String> {
    DEFAULT_EXCLUDED_VARIABLES.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_dims() -> Vec<String> {
    DEFAULT_EXCLUDED_DIMS.iter().map(|s| s.to_string()).collect()
}

fn default_min_dim_extent() -> usize {
    5
}

fn default_confidence() -> f64 {
    0.99
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_progress() -> bool {
    true
}
