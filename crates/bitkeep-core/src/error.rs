//! Error types for analysis, quantization and compression.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for bitkeep operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Bitkeep error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration key is missing or malformed.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A container file could not be opened or decoded.
    #[error("cannot open dataset {}: {message}", path.display())]
    DatasetOpen { path: PathBuf, message: String },

    /// In-memory dataset violates a structural invariant.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// A variable has no eligible dimension and no fallback applies.
    #[error("variable '{variable}' cannot be analyzed: {reason}")]
    UnanalyzableVariable { variable: String, reason: String },

    /// Serialization or filesystem failure while writing the temporary file.
    #[error("write failed for {}: {message}", path.display())]
    Write {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The rename onto the destination failed after a successful write.
    #[error("publish to {} failed: {source}", path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input bytes are corrupted or truncated.
    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    /// Codec-specific failure.
    #[error("{algorithm} error: {message}")]
    Algorithm {
        algorithm: &'static str,
        message: String,
    },

    /// I/O error from an underlying file or stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported element type, version or feature.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a dataset open error for `path`.
    pub fn dataset_open(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Error::DatasetOpen {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create an invalid dataset error.
    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Error::InvalidDataset(message.into())
    }

    /// Create a write error without an underlying I/O cause.
    pub fn write(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Error::Write {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a write error wrapping an I/O cause.
    pub fn write_io(path: impl AsRef<Path>, message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Write {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a publish error.
    pub fn publish(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Publish {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a corrupted data error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Error::CorruptedData {
            message: message.into(),
        }
    }

    /// Create a corrupted data error with offset context.
    pub fn corrupted_at(message: impl Into<String>, offset: usize) -> Self {
        Error::CorruptedData {
            message: format!("{} at offset {}", message.into(), offset),
        }
    }

    /// Create an algorithm-specific error.
    pub fn algorithm(algorithm: &'static str, message: impl Into<String>) -> Self {
        Error::Algorithm {
            algorithm,
            message: message.into(),
        }
    }

    /// Get error category for batch reports and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Configuration { .. } => "configuration",
            Error::DatasetOpen { .. } => "dataset_open",
            Error::InvalidDataset(_) => "invalid_dataset",
            Error::UnanalyzableVariable { .. } => "unanalyzable_variable",
            Error::Write { .. } => "write",
            Error::Publish { .. } => "publish",
            Error::CorruptedData { .. } => "corrupted_data",
            Error::Algorithm { .. } => "algorithm_error",
            Error::Io(_) => "io_error",
            Error::Unsupported(_) => "unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(Error::configuration("x").category(), "configuration");
        assert_eq!(Error::dataset_open("/a", "x").category(), "dataset_open");
        assert_eq!(Error::write("/a", "x").category(), "write");
        assert_eq!(
            Error::publish("/a", std::io::Error::other("x")).category(),
            "publish"
        );
    }

    #[test]
    fn test_messages_include_context() {
        let err = Error::dataset_open("/data/x.gac", "bad magic");
        let msg = err.to_string();
        assert!(msg.contains("/data/x.gac"));
        assert!(msg.contains("bad magic"));

        let err = Error::corrupted_at("truncated payload", 42);
        assert!(err.to_string().contains("offset 42"));
    }
}
