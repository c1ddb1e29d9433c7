//! Core traits for compression and decompression.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! Compressor / Decompressor  (one-shot operations)
//!       ↓
//! Codec  (combined compress + decompress)
//! ```

use crate::error::Result;
use crate::types::{Algorithm, CompressionLevel};

/// One-shot compression operations.
pub trait Compressor {
    /// Get the compression algorithm.
    fn algorithm(&self) -> Algorithm;

    /// Get the configured compression level.
    fn level(&self) -> CompressionLevel;

    /// Compress data in one shot.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// One-shot decompression operations.
pub trait Decompressor {
    /// Get the decompression algorithm.
    fn algorithm(&self) -> Algorithm;

    /// Decompress data in one shot.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress with known output size, failing if the stream decodes to
    /// a different length.
    fn decompress_with_size(&self, input: &[u8], output_size: usize) -> Result<Vec<u8>> {
        let output = self.decompress(input)?;
        if output.len() != output_size {
            return Err(crate::Error::corrupted(format!(
                "{} stream decoded to {} bytes, expected {}",
                self.algorithm().name(),
                output.len(),
                output_size
            )));
        }
        Ok(output)
    }
}

/// Combined codec for both compression and decompression.
pub trait Codec: Compressor + Decompressor {
    /// Create a new codec with default settings.
    fn new() -> Self
    where
        Self: Sized;

    /// Create a new codec with specified level.
    fn with_level(level: CompressionLevel) -> Self
    where
        Self: Sized;
}
