//! Single-file pipelines.
//!
//! - [`compute_and_save_keepbits`]: open → analyze → save keepbit map
//! - [`compress_with_keepbits`]: open → plan encodings → bit-round → publish

use std::path::{Path, PathBuf};
use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bitkeep_core::CompressionStats;
use bitkeep_filters::CompressionFilter;

use crate::bitinfo::{analyze, AnalyzerConfig, DEFAULT_EXCLUDED_VARIABLES};
use crate::container::open_dataset;
use crate::dataset::Dataset;
use crate::encoding::EncodingSpec;
use crate::keepbits::{KeepbitMap, KeepbitSource};
use crate::quality::{QualityReport, QualitySummary};
use crate::quantize::{effective_keepbits, quantize_in_place};
use crate::writer::write_dataset;
use crate::{Error, Result};

const MB: f64 = 1024.0 * 1024.0;

/// What to do with a float variable the keepbit map does not mention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepbitPolicy {
    /// Store it losslessly.
    #[default]
    PassThrough,
    /// Fail the file with a configuration error.
    Strict,
}

/// Settings for [`compress_with_keepbits`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionOptions {
    /// Lossless codec behind the shuffle filter.
    pub compression: CompressionFilter,
    pub shuffle: bool,
    /// Variables never rounded, whatever the map says.
    pub excluded_variables: Vec<String>,
    pub policy: KeepbitPolicy,
    /// Measure rounding error per variable.
    pub measure_quality: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            compression: CompressionFilter::default(),
            shuffle: true,
            excluded_variables: DEFAULT_EXCLUDED_VARIABLES.iter().map(|s| s.to_string()).collect(),
            policy: KeepbitPolicy::PassThrough,
            measure_quality: true,
        }
    }
}

impl CompressionOptions {
    fn is_excluded(&self, variable: &str) -> bool {
        self.excluded_variables.iter().any(|v| v == variable)
    }
}

/// Result of compressing one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// `input_bytes / output_bytes`.
    pub ratio: f64,
    pub variables: usize,
    pub quantized_variables: usize,
    pub quality: QualitySummary,
    pub stats: CompressionStats,
}

impl CompressionOutcome {
    /// "in MB → out MB | ratio x"
    pub fn summary_line(&self) -> String {
        format!(
            "{:.2} MB → {:.2} MB | {:.2}x",
            self.input_bytes as f64 / MB,
            self.output_bytes as f64 / MB,
            self.ratio
        )
    }
}

/// Analyze `input` and save its keepbit map under `output_dir`.
///
/// The map is named after the input file (see [`KeepbitSource::directory`]).
/// Returns the path of the saved map.
pub fn compute_and_save_keepbits(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    inflevel: f64,
    config: &AnalyzerConfig,
) -> Result<PathBuf> {
    let input = input.as_ref();
    let dataset = open_dataset(input)?;
    let map = analyze(&dataset, config, inflevel)?;

    let path = KeepbitSource::directory(output_dir.as_ref()).map_path_for(input);
    map.save(&path)?;

    info!(
        "saved keepbits for {} variables at inflevel {} to {}",
        map.len(),
        inflevel,
        path.display()
    );
    Ok(path)
}

/// Build the per-variable encoding for `dataset` from `keepbits`.
///
/// Every variable gets the shuffle + codec chain. Rounding is added only
/// for non-excluded float variables whose keepbits actually change values
/// (`0 < k < mantissa width`).
pub fn plan_encodings(
    dataset: &Dataset,
    keepbits: &KeepbitMap,
    options: &CompressionOptions,
) -> Result<IndexMap<String, EncodingSpec>> {
    let base = EncodingSpec {
        compression: options.compression,
        shuffle: options.shuffle,
        quantization: None,
    };

    let mut plan = IndexMap::with_capacity(dataset.len());
    for variable in dataset.variables() {
        let name = variable.name();
        let spec = if options.is_excluded(name) {
            base
        } else {
            match keepbits.get(name) {
                Some(k) => match effective_keepbits(variable.dtype(), k) {
                    Some(bits) => base.with_quantization(bits),
                    None => base,
                },
                None if options.policy == KeepbitPolicy::Strict && variable.dtype().is_float() => {
                    return Err(Error::configuration(format!(
                        "variable '{}' has no keepbits in the map for {}",
                        name, keepbits.file
                    )));
                }
                None => base,
            }
        };
        plan.insert(name.to_string(), spec);
    }

    for (name, _) in keepbits.iter() {
        if dataset.variable(name).is_none() {
            debug!("keepbit map entry '{}' matches no variable", name);
        }
    }

    Ok(plan)
}

/// Bit-round `input` with `keepbits` and publish it atomically at `output`.
pub fn compress_with_keepbits(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    keepbits: &KeepbitMap,
    options: &CompressionOptions,
) -> Result<CompressionOutcome> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let start = Instant::now();

    let mut dataset = open_dataset(input)?;
    let encodings = plan_encodings(&dataset, keepbits, options)?;

    let mut reports = Vec::new();
    for variable in dataset.variables_mut() {
        let Some(q) = encodings.get(variable.name()).and_then(|e| e.quantization) else {
            continue;
        };
        if options.measure_quality {
            let original = variable.clone();
            quantize_in_place(variable, q.bits as i32);
            reports.extend(QualityReport::for_variables(&original, variable, q.bits));
        } else {
            quantize_in_place(variable, q.bits as i32);
        }
    }

    let quality = QualitySummary::from_reports(&reports);
    if !quality.all_within_bound() {
        warn!(
            "{}: rounding error above bound for {:?}",
            input.display(),
            quality.violations
        );
    }

    // Before publishing, since output may replace input
    let input_bytes = std::fs::metadata(input)?.len();
    let report = write_dataset(&dataset, &encodings, output)?;
    let output_bytes = report.bytes_written;

    let mut stats = CompressionStats::from_operation(
        input_bytes,
        output_bytes,
        start.elapsed().as_micros() as u64,
    );
    stats.variables = report.variables;
    stats.quantized_variables = report.quantized_variables;
    let ratio = stats.ratio().ratio();

    Ok(CompressionOutcome {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        input_bytes,
        output_bytes,
        ratio,
        variables: report.variables,
        quantized_variables: report.quantized_variables,
        quality,
        stats,
    })
}
