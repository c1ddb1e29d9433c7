//! Statistics and metrics for compression runs.

use serde::{Deserialize, Serialize};

use crate::types::CompressionRatio;

/// Statistics from compressing one container file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Size of the source file in bytes.
    pub original_size: u64,

    /// Size of the published file in bytes.
    pub compressed_size: u64,

    /// Time taken in microseconds.
    pub time_us: u64,

    /// Number of variables written.
    pub variables: usize,

    /// Number of variables that went through bit-rounding.
    pub quantized_variables: usize,
}

impl CompressionStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create stats from a completed file.
    pub fn from_operation(original_size: u64, compressed_size: u64, time_us: u64) -> Self {
        CompressionStats {
            original_size,
            compressed_size,
            time_us,
            ..Default::default()
        }
    }

    /// Get compression ratio.
    pub fn ratio(&self) -> CompressionRatio {
        CompressionRatio::new(self.original_size, self.compressed_size)
    }

    /// Get space savings as percentage.
    pub fn savings_percent(&self) -> f64 {
        self.ratio().savings_percent()
    }
}

/// Metrics collector for batch-level aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Files compressed successfully.
    pub total_operations: u64,

    /// Total bytes read from source files.
    pub total_bytes_in: u64,

    /// Total bytes published.
    pub total_bytes_out: u64,

    /// Total time spent in microseconds.
    pub total_time_us: u64,

    /// Number of files that failed.
    pub error_count: u64,
}

impl Metrics {
    /// Create new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed file.
    pub fn record(&mut self, stats: &CompressionStats) {
        self.total_operations += 1;
        self.total_bytes_in += stats.original_size;
        self.total_bytes_out += stats.compressed_size;
        self.total_time_us += stats.time_us;
    }

    /// Record a failed file.
    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Get aggregate compression ratio (bytes in / bytes out).
    pub fn average_ratio(&self) -> f64 {
        if self.total_bytes_out == 0 {
            return 1.0;
        }
        self.total_bytes_in as f64 / self.total_bytes_out as f64
    }

    /// Get average throughput in MB/s.
    pub fn average_throughput_mbs(&self) -> f64 {
        if self.total_time_us == 0 {
            return 0.0;
        }
        self.total_bytes_in as f64 / self.total_time_us as f64
    }

    /// Get metrics summary as string.
    pub fn summary(&self) -> String {
        format!(
            "Files: {}, Bytes: {} -> {} (ratio: {:.2}x), Throughput: {:.1} MB/s, Errors: {}",
            self.total_operations,
            self.total_bytes_in,
            self.total_bytes_out,
            self.average_ratio(),
            self.average_throughput_mbs(),
            self.error_count,
        )
    }
}
