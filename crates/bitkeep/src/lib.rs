// Allow explicit indexing in bit-counting loops where it's clearer
#![allow(clippy::needless_range_loop)]

//! # Bitkeep
//!
//! Information-guided bit-rounding compression for gridded scientific
//! arrays.
//!
//! Most of the low mantissa bits of a float field are noise. Bitkeep
//! measures, per variable, how much real information each bit position
//! carries, keeps just enough mantissa bits to retain a chosen fraction of
//! it, rounds the rest away and stores the result through a shuffle + zlib
//! filter chain.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bitkeep::{analyze, compress_with_keepbits, open_dataset, AnalyzerConfig, CompressionOptions};
//!
//! // Analysis: which mantissa bits matter?
//! let dataset = open_dataset("run/x.gac")?;
//! let map = analyze(&dataset, &AnalyzerConfig::default(), 0.99)?;
//! map.save("maps/x.gac.keepbits.toml")?;
//!
//! // Compression: round and publish atomically
//! let outcome = compress_with_keepbits("run/x.gac", "out/x.gac", &map, &CompressionOptions::default())?;
//! println!("{:.2}x", outcome.ratio);
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ Dataset  │───▶│ Analyzer │───▶│ Keepbit  │  find-keepbits
//! │  (GAC)   │    │ (bitinfo)│    │   map    │
//! └──────────┘    └──────────┘    └────┬─────┘
//!                                      │
//! ┌──────────┐    ┌──────────┐    ┌────▼─────┐
//! │  Atomic  │◀───│ Shuffle  │◀───│ Bitround │  compress-keepbits
//! │  writer  │    │  + zlib  │    │          │
//! └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` - rayon worker pool for batches and per-variable encoding (default)

pub mod batch;
pub mod bitinfo;
pub mod cli;
pub mod config;
pub mod container;
pub mod dataset;
pub mod encoding;
pub mod float_bits;
pub mod keepbits;
pub mod pipeline;
pub mod quality;
pub mod quantize;
pub mod writer;

pub use batch::{discover_files, mirror_path, run_batch, BatchConfig, BatchReport, FileOutcome};
pub use bitinfo::{
    analyze, analyze_variable, bit_information, keepbits_from_info, AnalyzerConfig,
    VariableAnalysis,
};
pub use config::RunConfig;
pub use container::{open_dataset, read_container, save_dataset, write_container, DEFAULT_EXTENSION};
pub use dataset::{ArrayData, DType, Dataset, Variable};
pub use encoding::{EncodingSpec, Quantization};
pub use float_bits::FloatBits;
pub use keepbits::{KeepbitMap, KeepbitSource};
pub use pipeline::{
    compress_with_keepbits, compute_and_save_keepbits, plan_encodings, CompressionOptions,
    CompressionOutcome, KeepbitPolicy,
};
pub use quality::{QualityReport, QualitySummary};
pub use quantize::{bitround, quantize, quantize_in_place};
pub use writer::{publish_atomically, write_dataset, WriteReport};

pub use bitkeep_core::{CompressionLevel, Error, Result};
pub use bitkeep_filters::CompressionFilter;
