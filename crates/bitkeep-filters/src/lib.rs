//! # Bitkeep Filters
//!
//! Lossless byte filters applied to every variable payload.
//!
//! Bit-rounded floats end in long runs of zero mantissa bits, but those
//! zeros are spread across every element. The shuffle pre-filter groups
//! byte `k` of all elements together so the zeros become contiguous, and a
//! deflate-class codec then removes them.
//!
//! ## Filters
//!
//! - **Shuffle**: element-size byte transposition (reversible)
//! - **Deflate**: raw DEFLATE (RFC 1951)
//! - **Zlib**: DEFLATE with Zlib wrapper (RFC 1950), the default
//!
//! ## Example
//!
//! ```ignore
//! use bitkeep_filters::{CompressionFilter, FilterChain};
//!
//! let chain = FilterChain::new(CompressionFilter::default(), true, 8);
//! let stored = chain.encode(&raw_le_bytes)?;
//! let raw = chain.decode(&stored, raw_le_bytes.len())?;
//! ```

pub mod chain;
pub mod codec;
pub mod flate;
pub mod shuffle;

pub use chain::{CompressionFilter, FilterChain};
pub use codec::{DeflateCodec, ZlibCodec};
pub use flate::{deflate, inflate, zlib_compress, zlib_decompress};
pub use shuffle::{shuffle, unshuffle};
