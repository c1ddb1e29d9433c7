//! Codec implementations for DEFLATE and Zlib.

use bitkeep_core::{Algorithm, Codec, CompressionLevel, Compressor, Decompressor, Result};

use crate::flate::{deflate, inflate, zlib_compress, zlib_decompress};

// ============================================================================
// Deflate Codec
// ============================================================================

/// Raw DEFLATE codec.
#[derive(Debug, Clone)]
pub struct DeflateCodec {
    level: CompressionLevel,
}

impl DeflateCodec {
    /// Create a new DEFLATE codec.
    pub fn new() -> Self {
        Self {
            level: CompressionLevel::Default,
        }
    }

    /// Create with compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self { level }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for DeflateCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Deflate
    }

    fn level(&self) -> CompressionLevel {
        self.level
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        deflate(input, self.level)
    }
}

impl Decompressor for DeflateCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Deflate
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        inflate(input)
    }
}

impl Codec for DeflateCodec {
    fn new() -> Self {
        DeflateCodec::new()
    }

    fn with_level(level: CompressionLevel) -> Self {
        DeflateCodec::with_level(level)
    }
}

// ============================================================================
// Zlib Codec
// ============================================================================

/// Zlib codec (DEFLATE with zlib wrapper).
#[derive(Debug, Clone)]
pub struct ZlibCodec {
    level: CompressionLevel,
}

impl ZlibCodec {
    /// Create a new Zlib codec.
    pub fn new() -> Self {
        Self {
            level: CompressionLevel::Default,
        }
    }

    /// Create with compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self { level }
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZlibCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zlib
    }

    fn level(&self) -> CompressionLevel {
        self.level
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        zlib_compress(input, self.level)
    }
}

impl Decompressor for ZlibCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zlib
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        zlib_decompress(input)
    }
}

impl Codec for ZlibCodec {
    fn new() -> Self {
        ZlibCodec::new()
    }

    fn with_level(level: CompressionLevel) -> Self {
        ZlibCodec::with_level(level)
    }
}
