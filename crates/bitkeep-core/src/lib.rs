//! # Bitkeep Core
//!
//! Shared error type, codec traits and statistics for the bitkeep
//! workspace.
//!
//! Bitkeep compresses gridded scientific arrays in two stages: a lossy
//! bit-rounding step that keeps only the mantissa bits carrying real
//! information, followed by a lossless byte codec. This crate holds the
//! pieces both stages and the batch tooling agree on.
//!
//! ## Core Traits
//!
//! - [`Compressor`] - One-shot compression of a byte buffer
//! - [`Decompressor`] - One-shot decompression of a byte buffer
//! - [`Codec`] - Combined compress/decompress capability
//!
//! ## Example
//!
//! ```ignore
//! use bitkeep_core::{Codec, CompressionLevel};
//! use bitkeep_filters::ZlibCodec;
//!
//! let codec = ZlibCodec::with_level(CompressionLevel::Default);
//! let compressed = codec.compress(data)?;
//! let original = codec.decompress(&compressed)?;
//! ```

pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use stats::{CompressionStats, Metrics};
pub use traits::{Codec, Compressor, Decompressor};
pub use types::{Algorithm, CompressionLevel, CompressionRatio};
