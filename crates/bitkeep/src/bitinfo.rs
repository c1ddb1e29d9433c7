//! Bit-information analysis.
//!
//! For every bit position of a float (sign, exponent, mantissa; most
//! significant first) the analyzer measures the mutual information between
//! that bit in element `i` and the same bit in its neighbour `i + 1` along
//! one dimension. Bits that are pure noise carry no mutual information;
//! bits that describe the field's structure do. The keepbit count of a
//! variable is the number of mantissa bits needed to retain a chosen
//! fraction (`inflevel`) of the total.
//!
//! ## Algorithm
//!
//! ```text
//! values ──▶ neighbour pairs along dim ──▶ 2×2 bit-pair counts per bit
//!        ──▶ mutual information per bit ──▶ zero bits below free entropy
//!        ──▶ cumulative sum ≥ inflevel × total ──▶ keepbits for dim
//! keepbits(variable) = max over analyzed dims
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{ArrayData, Dataset, Variable};
use crate::float_bits::FloatBits;
use crate::keepbits::KeepbitMap;
use crate::{Error, Result};

/// Variables never analyzed or quantized unless configured otherwise.
pub const DEFAULT_EXCLUDED_VARIABLES: [&str; 5] =
    ["TAITIME", "contacts", "corner_lons", "corner_lats", "anchor"];

/// Dimensions never analyzed along unless configured otherwise.
pub const DEFAULT_EXCLUDED_DIMS: [&str; 1] = ["nf"];

/// Analyzer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Variables skipped entirely.
    pub excluded_variables: Vec<String>,
    /// Dimension names never analyzed along.
    pub excluded_dims: Vec<String>,
    /// A dimension is analyzed only if its extent is strictly greater.
    pub min_dim_extent: usize,
    /// Confidence for discarding insignificant information, in (0, 1).
    pub confidence: f64,
    /// Re-encode the exponent as sign and magnitude before counting.
    pub signed_exponent: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            excluded_variables: DEFAULT_EXCLUDED_VARIABLES.iter().map(|s| s.to_string()).collect(),
            excluded_dims: DEFAULT_EXCLUDED_DIMS.iter().map(|s| s.to_string()).collect(),
            min_dim_extent: 5,
            confidence: 0.99,
            signed_exponent: true,
        }
    }
}

impl AnalyzerConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(Error::configuration(format!(
                "confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }

    pub fn is_excluded(&self, variable: &str) -> bool {
        self.excluded_variables.iter().any(|v| v == variable)
    }

    /// Axes of `variable` that are long enough and not excluded.
    pub fn eligible_axes(&self, variable: &Variable) -> Vec<usize> {
        variable
            .dims()
            .iter()
            .zip(variable.shape())
            .enumerate()
            .filter(|(_, (dim, &extent))| {
                extent > self.min_dim_extent && !self.excluded_dims.iter().any(|d| d == *dim)
            })
            .map(|(axis, _)| axis)
            .collect()
    }
}

/// Diagnostic result for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableAnalysis {
    pub name: String,
    /// Dimensions analyzed along.
    pub dims: Vec<String>,
    /// Keepbits derived along each analyzed dimension.
    pub per_dim: Vec<i32>,
    /// Final keepbits: max over `per_dim`, clamped to the mantissa width.
    pub keepbits: i32,
    /// True when no dimension was eligible and the full width was kept.
    pub fallback: bool,
}

// ============================================================================
// Statistics
// ============================================================================

/// Inverse of the standard normal CDF.
///
/// Rational approximation after P. J. Acklam, relative error below 1.2e-9.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Shannon entropy of a Bernoulli(p) variable, in bits.
pub fn binary_entropy(p: f64) -> f64 {
    let h = |x: f64| if x > 0.0 { -x * x.log2() } else { 0.0 };
    h(p) + h(1.0 - p)
}

/// Information level indistinguishable from sampling noise for `pairs`
/// samples at `confidence`.
pub fn free_entropy(pairs: u64, confidence: f64) -> f64 {
    if pairs == 0 {
        return 1.0;
    }
    let z = normal_quantile(1.0 - (1.0 - confidence) / 2.0);
    let p = (0.5 + z / (2.0 * (pairs as f64).sqrt())).min(1.0);
    1.0 - binary_entropy(p)
}

/// Mutual information of a 2×2 joint count table `[c00, c01, c10, c11]`.
fn mutual_information(counts: [u64; 4], total: u64) -> f64 {
    let n = total as f64;
    let p = counts.map(|c| c as f64 / n);
    let pa = [p[0] + p[1], p[2] + p[3]];
    let pb = [p[0] + p[2], p[1] + p[3]];

    let mut mi = 0.0;
    for a in 0..2 {
        for b in 0..2 {
            let pab = p[2 * a + b];
            if pab > 0.0 {
                mi += pab * (pab / (pa[a] * pb[b])).log2();
            }
        }
    }
    mi.max(0.0)
}

// ============================================================================
// Bit information
// ============================================================================

/// Per-bit information of `values` (row-major, `shape`) along `axis`.
///
/// Returns `T::BITS` entries, most significant bit first. Pairs where either
/// element is NaN or infinite are skipped. Information not exceeding the
/// free entropy at `config.confidence` is set to zero.
pub fn bit_information<T: FloatBits>(
    values: &[T],
    shape: &[usize],
    axis: usize,
    config: &AnalyzerConfig,
) -> Vec<f64> {
    let nbits = T::BITS as usize;
    let mut info = vec![0.0; nbits];
    if axis >= shape.len() || shape[axis] < 2 {
        return info;
    }

    let outer: usize = shape[..axis].iter().product();
    let n = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();

    let transform = |x: T| {
        let bits = x.to_bits_u64();
        if config.signed_exponent {
            T::signed_exponent(bits)
        } else {
            bits
        }
    };

    // Per bit: ones in a, ones in b, ones in both
    let mut ones_a = vec![0u64; nbits];
    let mut ones_b = vec![0u64; nbits];
    let mut ones_ab = vec![0u64; nbits];
    let mut pairs = 0u64;

    for o in 0..outer {
        for i in 0..n - 1 {
            let row = o * n * inner + i * inner;
            for j in 0..inner {
                let (x, y) = (values[row + j], values[row + j + inner]);
                if !x.is_finite_value() || !y.is_finite_value() {
                    continue;
                }
                let (a, b) = (transform(x), transform(y));
                let both = a & b;
                for p in 0..nbits {
                    let shift = nbits - 1 - p;
                    ones_a[p] += (a >> shift) & 1;
                    ones_b[p] += (b >> shift) & 1;
                    ones_ab[p] += (both >> shift) & 1;
                }
                pairs += 1;
            }
        }
    }

    if pairs == 0 {
        return info;
    }

    let threshold = free_entropy(pairs, config.confidence);
    for p in 0..nbits {
        let c11 = ones_ab[p];
        let c10 = ones_a[p] - c11;
        let c01 = ones_b[p] - c11;
        let c00 = pairs - c11 - c10 - c01;
        let mi = mutual_information([c00, c01, c10, c11], pairs);
        info[p] = if mi > threshold { mi } else { 0.0 };
    }

    info
}

/// Mantissa bits needed to retain `inflevel` of the information in `info`.
///
/// `info` is MSB first over sign, exponent and mantissa. Total information
/// of zero gives 0; `inflevel >= 1.0` gives the full mantissa width.
pub fn keepbits_from_info(info: &[f64], inflevel: f64, exponent_bits: u32, mantissa_bits: u32) -> i32 {
    let width = mantissa_bits as i32;
    if inflevel >= 1.0 {
        return width;
    }

    let total: f64 = info.iter().sum();
    if total <= 0.0 {
        return 0;
    }

    let target = inflevel * total;
    let head = 1 + exponent_bits as i32;
    let mut cumulative = 0.0;
    for (i, &x) in info.iter().enumerate() {
        cumulative += x;
        if cumulative >= target {
            return (i as i32 + 1 - head).clamp(0, width);
        }
    }
    width
}

fn axis_keepbits<T: FloatBits>(
    values: &[T],
    shape: &[usize],
    axes: &[usize],
    config: &AnalyzerConfig,
    inflevel: f64,
) -> Vec<i32> {
    axes.iter()
        .map(|&axis| {
            let info = bit_information(values, shape, axis, config);
            keepbits_from_info(&info, inflevel, T::EXPONENT_BITS, T::MANTISSA_BITS)
        })
        .collect()
}

// ============================================================================
// Variables and datasets
// ============================================================================

/// Analyze one variable.
///
/// Excluded and integer variables cannot be analyzed. A variable with no
/// eligible dimension keeps its full mantissa width.
pub fn analyze_variable(
    variable: &Variable,
    config: &AnalyzerConfig,
    inflevel: f64,
) -> Result<VariableAnalysis> {
    let unanalyzable = |reason: &str| Error::UnanalyzableVariable {
        variable: variable.name().to_string(),
        reason: reason.to_string(),
    };

    if config.is_excluded(variable.name()) {
        return Err(unanalyzable("variable is excluded"));
    }
    let width = variable
        .dtype()
        .mantissa_bits()
        .ok_or_else(|| unanalyzable("not a floating-point variable"))? as i32;

    let axes = config.eligible_axes(variable);
    let dims: Vec<String> = axes.iter().map(|&a| variable.dims()[a].clone()).collect();

    if axes.is_empty() {
        warn!(
            "{}: no dimension longer than {} to analyze, keeping all {} mantissa bits",
            variable.name(),
            config.min_dim_extent,
            width
        );
        return Ok(VariableAnalysis {
            name: variable.name().to_string(),
            dims,
            per_dim: Vec::new(),
            keepbits: width,
            fallback: true,
        });
    }

    let per_dim = match variable.data() {
        ArrayData::F32(v) => axis_keepbits(v, variable.shape(), &axes, config, inflevel),
        ArrayData::F64(v) => axis_keepbits(v, variable.shape(), &axes, config, inflevel),
        ArrayData::I32(_) | ArrayData::I64(_) => {
            return Err(unanalyzable("not a floating-point variable"))
        }
    };
    let keepbits = per_dim.iter().copied().max().unwrap_or(width).clamp(0, width);

    debug!("{}: per-dim keepbits {:?} along {:?}", variable.name(), per_dim, dims);

    Ok(VariableAnalysis {
        name: variable.name().to_string(),
        dims,
        per_dim,
        keepbits,
        fallback: false,
    })
}

/// Analyze every eligible variable, returning the map and per-variable
/// diagnostics.
///
/// Excluded and integer variables are skipped and absent from the map.
pub fn analyze_with_details(
    dataset: &Dataset,
    config: &AnalyzerConfig,
    inflevel: f64,
) -> Result<(KeepbitMap, Vec<VariableAnalysis>)> {
    config.validate()?;
    let source = dataset
        .source()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let mut map = KeepbitMap::new(source, inflevel)?;

    let candidates: Vec<&Variable> = dataset
        .variables()
        .filter(|v| {
            let keep = v.dtype().is_float() && !config.is_excluded(v.name());
            if !keep {
                debug!("skipping {} ({})", v.name(), v.dtype().name());
            }
            keep
        })
        .collect();

    #[cfg(feature = "parallel")]
    let analyses: Vec<VariableAnalysis> = {
        use rayon::prelude::*;
        candidates
            .par_iter()
            .map(|v| analyze_variable(v, config, inflevel))
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let analyses: Vec<VariableAnalysis> = candidates
        .iter()
        .map(|v| analyze_variable(v, config, inflevel))
        .collect::<Result<_>>()?;

    for analysis in &analyses {
        info!(
            "{:<24} keepbits {:>2}  dims [{}]{}",
            analysis.name,
            analysis.keepbits,
            analysis.dims.join(", "),
            if analysis.fallback { "  (fallback)" } else { "" }
        );
        map.insert(analysis.name.clone(), analysis.keepbits);
    }

    Ok((map, analyses))
}

/// Analyze every eligible variable of `dataset` at `inflevel`.
pub fn analyze(dataset: &Dataset, config: &AnalyzerConfig, inflevel: f64) -> Result<KeepbitMap> {
    analyze_with_details(dataset, config, inflevel).map(|(map, _)| map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_grid() -> Variable {
        // Values depend only on the column: 1.0 on even, 1.5 on odd columns
        let values: Vec<f64> = (0..6 * 8).map(|i| if (i % 8) % 2 == 0 { 1.0 } else { 1.5 }).collect();
        Variable::new("T", vec!["lat", "lon"], vec![6, 8], ArrayData::F64(values)).unwrap()
    }

    #[test]
    fn test_normal_quantile() {
        assert!(normal_quantile(0.5).abs() < 1e-9);
        assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-5);
        assert!((normal_quantile(0.995) - 2.575829).abs() < 1e-5);
        assert!((normal_quantile(0.01) + 2.326348).abs() < 1e-5);
    }

    #[test]
    fn test_binary_entropy() {
        assert_eq!(binary_entropy(0.0), 0.0);
        assert_eq!(binary_entropy(1.0), 0.0);
        assert!((binary_entropy(0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_free_entropy_shrinks_with_samples() {
        let small = free_entropy(10, 0.99);
        let large = free_entropy(100_000, 0.99);
        assert!(small > large);
        assert!(large > 0.0 && large < 1e-3);
        assert_eq!(free_entropy(1, 0.99), 1.0);
    }

    #[test]
    fn test_mutual_information_extremes() {
        // Independent fair bits
        assert!(mutual_information([25, 25, 25, 25], 100).abs() < 1e-12);
        // Identical fair bits
        assert!((mutual_information([50, 0, 0, 50], 100) - 1.0).abs() < 1e-12);
        // Constant bit
        assert_eq!(mutual_information([100, 0, 0, 0], 100), 0.0);
    }

    #[test]
    fn test_bit_information_pair_indexing() {
        let var = two_level_grid();
        let ArrayData::F64(values) = var.data() else { unreachable!() };
        let config = AnalyzerConfig::default();

        // First mantissa bit of f64 sits at index 1 + 11
        for axis in 0..2 {
            let info = bit_information(values, var.shape(), axis, &config);
            assert_eq!(info.len(), 64);
            assert!(info[12] > 0.9, "axis {} info {}", axis, info[12]);
            let rest: f64 = info.iter().enumerate().filter(|(i, _)| *i != 12).map(|(_, x)| x).sum();
            assert_eq!(rest, 0.0);
        }
    }

    #[test]
    fn test_bit_information_skips_non_finite() {
        let values = vec![f32::NAN; 16];
        let info = bit_information(&values, &[16], 0, &AnalyzerConfig::default());
        assert!(info.iter().all(|&x| x == 0.0));

        let mut values: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { 1.5 }).collect();
        values[10] = f32::INFINITY;
        let info = bit_information(&values, &[64], 0, &AnalyzerConfig::default());
        assert!(info[9] > 0.9);
    }

    #[test]
    fn test_constant_field_has_no_information() {
        let values = vec![273.15f64; 100];
        let info = bit_information(&values, &[10, 10], 1, &AnalyzerConfig::default());
        assert!(info.iter().all(|&x| x == 0.0));
        assert_eq!(keepbits_from_info(&info, 0.99, 11, 52), 0);
    }

    #[test]
    fn test_keepbits_from_info() {
        let mut info = vec![0.0; 32];
        info[9] = 1.0;
        assert_eq!(keepbits_from_info(&info, 0.99, 8, 23), 1);

        info[15] = 1.0;
        assert_eq!(keepbits_from_info(&info, 0.4, 8, 23), 1);
        assert_eq!(keepbits_from_info(&info, 0.99, 8, 23), 7);

        // Information only in sign/exponent bits
        let mut head = vec![0.0; 32];
        head[3] = 0.8;
        assert_eq!(keepbits_from_info(&head, 0.99, 8, 23), 0);

        assert_eq!(keepbits_from_info(&info, 1.0, 8, 23), 23);
        assert_eq!(keepbits_from_info(&[0.0; 64], 1.0, 11, 52), 52);
    }

    #[test]
    fn test_eligible_axes() {
        let config = AnalyzerConfig::default();
        let v = Variable::new(
            "T",
            vec!["nf", "lat", "lev", "lon"],
            vec![6, 7, 5, 9],
            ArrayData::F32(vec![0.0; 6 * 7 * 5 * 9]),
        )
        .unwrap();
        assert_eq!(config.eligible_axes(&v), vec![1, 3]);
    }

    #[test]
    fn test_analyze_variable() {
        let config = AnalyzerConfig::default();
        let analysis = analyze_variable(&two_level_grid(), &config, 0.99).unwrap();
        assert_eq!(analysis.dims, vec!["lat", "lon"]);
        assert_eq!(analysis.per_dim, vec![1, 1]);
        assert_eq!(analysis.keepbits, 1);
        assert!(!analysis.fallback);
    }

    #[test]
    fn test_short_dims_fall_back_to_full_width() {
        let config = AnalyzerConfig::default();
        let v = Variable::new("anchor_like", vec!["nf", "x"], vec![8, 5], ArrayData::F32(vec![1.0; 40])).unwrap();
        let analysis = analyze_variable(&v, &config, 0.99).unwrap();
        assert!(analysis.fallback);
        assert_eq!(analysis.keepbits, 23);
    }

    #[test]
    fn test_unanalyzable_variables() {
        let config = AnalyzerConfig::default();
        let ints = Variable::new("n", vec!["x"], vec![10], ArrayData::I32(vec![0; 10])).unwrap();
        assert_eq!(
            analyze_variable(&ints, &config, 0.99).unwrap_err().category(),
            "unanalyzable_variable"
        );

        let excluded = Variable::new("TAITIME", vec!["x"], vec![10], ArrayData::F64(vec![0.0; 10])).unwrap();
        assert!(analyze_variable(&excluded, &config, 0.99).is_err());
    }

    #[test]
    fn test_analyze_dataset_skips_excluded_and_integers() {
        let mut ds = Dataset::new();
        ds.add_variable(two_level_grid()).unwrap();
        ds.add_variable(Variable::new("TAITIME", vec!["lat"], vec![6], ArrayData::F64(vec![1.0; 6])).unwrap())
            .unwrap();
        ds.add_variable(Variable::new("flags", vec!["lat"], vec![6], ArrayData::I64(vec![3; 6])).unwrap())
            .unwrap();
        ds.add_variable(Variable::new("lon_bnds", vec!["lon"], vec![8], ArrayData::F32(vec![2.0; 8])).unwrap())
            .unwrap();

        let (map, details) = analyze_with_details(&ds, &AnalyzerConfig::default(), 0.99).unwrap();
        assert_eq!(map.get("T"), Some(1));
        assert_eq!(map.get("lon_bnds"), Some(0));
        assert!(!map.contains("TAITIME"));
        assert!(!map.contains("flags"));
        assert_eq!(details.len(), 2);
        assert_eq!(map.inflevel, 0.99);
    }

    #[test]
    fn test_analyze_rejects_bad_settings() {
        let ds = Dataset::new();
        assert_eq!(analyze(&ds, &AnalyzerConfig::default(), 0.0).unwrap_err().category(), "configuration");
        assert_eq!(analyze(&ds, &AnalyzerConfig::default(), 1.01).unwrap_err().category(), "configuration");

        let config = AnalyzerConfig {
            confidence: 1.0,
            ..Default::default()
        };
        assert!(analyze(&ds, &config, 0.99).is_err());
    }
}
