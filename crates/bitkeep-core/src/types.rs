//! Core type definitions for compression operations.

use serde::{Deserialize, Serialize};

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressionLevel {
    /// Stored blocks only.
    None,

    /// Optimized for speed over ratio (level 1).
    Fast,

    /// Balanced speed and ratio (level 6, default).
    #[default]
    Default,

    /// Optimized for ratio over speed (level 9).
    Best,

    /// Explicit numeric level (clamped to the codec's range).
    Custom(i32),
}

impl CompressionLevel {
    /// Convert to the numeric deflate level (0-9).
    pub fn to_level(self) -> u32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
            CompressionLevel::Custom(level) => level.clamp(0, 9) as u32,
        }
    }

    /// Create from numeric level.
    pub fn from_level(level: i32) -> Self {
        match level {
            0 => CompressionLevel::None,
            1 => CompressionLevel::Fast,
            6 => CompressionLevel::Default,
            9 => CompressionLevel::Best,
            _ => CompressionLevel::Custom(level),
        }
    }
}

/// Supported lossless algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Deflate - raw RFC 1951 stream.
    Deflate,
    /// Zlib - Deflate with RFC 1950 framing and Adler-32.
    Zlib,
}

impl Algorithm {
    /// Get algorithm name as string.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Deflate => "deflate",
            Algorithm::Zlib => "zlib",
        }
    }
}

/// Compression ratio metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionRatio {
    /// Original size in bytes.
    pub original_size: u64,
    /// Compressed size in bytes.
    pub compressed_size: u64,
}

impl CompressionRatio {
    /// Create new ratio from sizes.
    pub fn new(original: u64, compressed: u64) -> Self {
        CompressionRatio {
            original_size: original,
            compressed_size: compressed,
        }
    }

    /// Calculate ratio (original / compressed).
    /// Higher is better (more compression).
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    /// Calculate space savings as percentage (0-100).
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - (self.compressed_size as f64 / self.original_size as f64)) * 100.0
    }
}
