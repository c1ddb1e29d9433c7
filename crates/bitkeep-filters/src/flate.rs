//! Raw DEFLATE and Zlib streams (RFC 1951 / RFC 1950).
//!
//! Thin wrappers around `flate2` that speak the workspace error type.

use std::io::{Read, Write};

use bitkeep_core::{CompressionLevel, Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;

fn compression(level: CompressionLevel) -> Compression {
    Compression::new(level.to_level())
}

/// Compress data into a raw DEFLATE stream.
pub fn deflate(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(input.len() / 2), compression(level));
    encoder
        .write_all(input)
        .map_err(|e| Error::algorithm("deflate", format!("encode failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::algorithm("deflate", format!("finish failed: {}", e)))
}

/// Decompress a raw DEFLATE stream.
pub fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    DeflateDecoder::new(input)
        .read_to_end(&mut output)
        .map_err(|e| Error::corrupted(format!("invalid deflate stream: {}", e)))?;
    Ok(output)
}

/// Compress data with zlib wrapper.
pub fn zlib_compress(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(input.len() / 2), compression(level));
    encoder
        .write_all(input)
        .map_err(|e| Error::algorithm("zlib", format!("encode failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::algorithm("zlib", format!("finish failed: {}", e)))
}

/// Decompress zlib-wrapped data, verifying the Adler-32 trailer.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < 6 {
        return Err(Error::corrupted("zlib data too short"));
    }

    let mut output = Vec::new();
    ZlibDecoder::new(input)
        .read_to_end(&mut output)
        .map_err(|e| Error::corrupted(format!("invalid zlib stream: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_roundtrip_empty() {
        let compressed = zlib_compress(b"", CompressionLevel::Default).unwrap();
        let decompressed = zlib_decompress(&compressed).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn test_zlib_roundtrip_large() {
        let pattern = b"The quick brown fox jumps over the lazy dog. ";
        let input: Vec<u8> = pattern.iter().cycle().take(10000).copied().collect();

        let compressed = zlib_compress(&input, CompressionLevel::Default).unwrap();
        assert!(compressed.len() < input.len());

        let decompressed = zlib_decompress(&compressed).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn test_deflate_roundtrip_all_levels() {
        let input: Vec<u8> = (0..4096u32).map(|i| (i % 17) as u8).collect();
        for level in [
            CompressionLevel::None,
            CompressionLevel::Fast,
            CompressionLevel::Default,
            CompressionLevel::Best,
        ] {
            let c = deflate(&input, level).unwrap();
            assert_eq!(inflate(&c).unwrap(), input);
        }
    }

    #[test]
    fn test_zlib_rejects_garbage() {
        assert!(zlib_decompress(b"abc").is_err());
        assert!(zlib_decompress(&[0x78, 0x9c, 0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_zlib_detects_checksum_damage() {
        let input = b"Testing zlib trailer verification against corruption.";
        let mut compressed = zlib_compress(input, CompressionLevel::Default).unwrap();
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;
        assert!(zlib_decompress(&compressed).is_err());
    }
}
