//! Per-variable filter chain: optional shuffle, then a lossless codec.

use serde::{Deserialize, Serialize};

use bitkeep_core::{CompressionLevel, Compressor, Decompressor, Error, Result};

use crate::codec::{DeflateCodec, ZlibCodec};
use crate::shuffle::{shuffle, unshuffle};

/// Lossless codec applied after the shuffle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", content = "level", rename_all = "lowercase")]
pub enum CompressionFilter {
    /// Store bytes as-is.
    None,
    /// Raw DEFLATE.
    Deflate(CompressionLevel),
    /// Zlib-framed DEFLATE.
    Zlib(CompressionLevel),
}

impl Default for CompressionFilter {
    fn default() -> Self {
        CompressionFilter::Zlib(CompressionLevel::Default)
    }
}

impl CompressionFilter {
    /// Short name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            CompressionFilter::None => "none",
            CompressionFilter::Deflate(_) => "deflate",
            CompressionFilter::Zlib(_) => "zlib",
        }
    }
}

/// Encoder/decoder for one variable's byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterChain {
    compression: CompressionFilter,
    shuffle: bool,
    element_size: usize,
}

impl FilterChain {
    /// Create a chain for elements of `element_size` bytes.
    pub fn new(compression: CompressionFilter, shuffle: bool, element_size: usize) -> Self {
        Self {
            compression,
            shuffle,
            element_size,
        }
    }

    /// Encode raw little-endian element bytes into stored bytes.
    pub fn encode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let staged = if self.shuffle {
            shuffle(raw, self.element_size)
        } else {
            raw.to_vec()
        };

        match self.compression {
            CompressionFilter::None => Ok(staged),
            CompressionFilter::Deflate(level) => DeflateCodec::with_level(level).compress(&staged),
            CompressionFilter::Zlib(level) => ZlibCodec::with_level(level).compress(&staged),
        }
    }

    /// Decode stored bytes back into `raw_len` raw bytes.
    pub fn decode(&self, stored: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let staged = match self.compression {
            CompressionFilter::None => {
                if stored.len() != raw_len {
                    return Err(Error::corrupted(format!(
                        "stored payload is {} bytes, expected {}",
                        stored.len(),
                        raw_len
                    )));
                }
                stored.to_vec()
            }
            CompressionFilter::Deflate(_) => DeflateCodec::new().decompress_with_size(stored, raw_len)?,
            CompressionFilter::Zlib(_) => ZlibCodec::new().decompress_with_size(stored, raw_len)?,
        };

        if self.shuffle {
            Ok(unshuffle(&staged, self.element_size))
        } else {
            Ok(staged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rounded_floats() -> Vec<u8> {
        // Values with the low mantissa bits cleared, as after bit-rounding
        (0..4096)
            .map(|i| {
                let v = 280.0 + (i as f64 * 0.01).sin() * 15.0;
                f64::from_bits(v.to_bits() & !((1u64 << 44) - 1))
            })
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_chain_roundtrip_all_filters() {
        let raw = rounded_floats();
        for compression in [
            CompressionFilter::None,
            CompressionFilter::Deflate(CompressionLevel::Fast),
            CompressionFilter::Zlib(CompressionLevel::Default),
        ] {
            for shuffle in [false, true] {
                let chain = FilterChain::new(compression, shuffle, 8);
                let stored = chain.encode(&raw).unwrap();
                assert_eq!(chain.decode(&stored, raw.len()).unwrap(), raw);
            }
        }
    }

    #[test]
    fn test_shuffle_improves_rounded_payload() {
        let raw = rounded_floats();
        let plain = FilterChain::new(CompressionFilter::default(), false, 8)
            .encode(&raw)
            .unwrap();
        let shuffled = FilterChain::new(CompressionFilter::default(), true, 8)
            .encode(&raw)
            .unwrap();
        assert!(shuffled.len() < plain.len());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let chain = FilterChain::new(CompressionFilter::None, false, 4);
        assert!(chain.decode(&[0u8; 8], 12).is_err());

        let chain = FilterChain::new(CompressionFilter::default(), true, 4);
        let stored = chain.encode(&[0u8; 16]).unwrap();
        assert!(chain.decode(&stored, 20).is_err());
    }

    #[test]
    fn test_filter_serde_shape() {
        let json = serde_json::to_string(&CompressionFilter::default()).unwrap();
        assert_eq!(json, r#"{"codec":"zlib","level":"Default"}"#);
        let none: CompressionFilter = serde_json::from_str(r#"{"codec":"none"}"#).unwrap();
        assert_eq!(none, CompressionFilter::None);
    }
}
