//! Per-variable storage encoding.

use serde::{Deserialize, Serialize};

use bitkeep_core::CompressionLevel;
use bitkeep_filters::{CompressionFilter, FilterChain};

use crate::dataset::DType;

/// Bit-rounding applied to a variable before it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantization {
    /// Mantissa bits kept.
    pub bits: u32,
}

/// How one variable is stored.
///
/// `quantization` records rounding that was already applied to the values;
/// the writer stores the values it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSpec {
    pub compression: CompressionFilter,
    pub shuffle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
}

impl Default for EncodingSpec {
    fn default() -> Self {
        Self::lossless(CompressionFilter::default())
    }
}

impl EncodingSpec {
    /// Shuffle + `compression`, no rounding.
    pub fn lossless(compression: CompressionFilter) -> Self {
        Self {
            compression,
            shuffle: true,
            quantization: None,
        }
    }

    /// Shuffle + zlib at `level`.
    pub fn zlib(level: CompressionLevel) -> Self {
        Self::lossless(CompressionFilter::Zlib(level))
    }

    pub fn with_quantization(mut self, bits: u32) -> Self {
        self.quantization = Some(Quantization { bits });
        self
    }

    pub fn is_quantized(&self) -> bool {
        self.quantization.is_some()
    }

    /// Filter chain for elements of `dtype`.
    pub fn filter_chain(&self, dtype: DType) -> FilterChain {
        FilterChain::new(self.compression, self.shuffle, dtype.size())
    }
}
