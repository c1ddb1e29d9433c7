//! Rounding error measurement.
//!
//! Compares a variable before and after bit-rounding and checks the result
//! against the theoretical bound: for normal numbers rounded to `k`
//! mantissa bits, `|q - x| / |x| <= 2^-(k+1)`.

use serde::{Deserialize, Serialize};

use crate::dataset::{ArrayData, Variable};
use crate::float_bits::FloatBits;

/// Error metrics for one rounded variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Variable name.
    pub name: String,
    /// Mantissa bits kept.
    pub keepbits: u32,
    /// Maximum absolute error.
    pub max_abs_error: f64,
    /// Maximum relative error over normal, finite elements.
    pub max_rel_error: f64,
    /// Root mean squared error over finite elements.
    pub rmse: f64,
    /// Theoretical relative error bound, `2^-(keepbits+1)`.
    pub bound: f64,
    /// Number of elements compared.
    pub num_elements: usize,
}

impl QualityReport {
    /// Computes error metrics between original and rounded values.
    pub fn compute<T: FloatBits>(name: impl Into<String>, original: &[T], rounded: &[T], keepbits: u32) -> Self {
        let name = name.into();
        let bound = 2f64.powi(-(keepbits as i32 + 1));
        let n = original.len().min(rounded.len());

        let mut max_abs = 0.0f64;
        let mut max_rel = 0.0f64;
        let mut sq_sum = 0.0f64;
        let mut finite = 0usize;

        for (&a, &b) in original.iter().zip(rounded) {
            let (a, b) = (a.to_f64(), b.to_f64());
            if !a.is_finite() {
                continue;
            }
            // A finite value rounded past the largest finite number
            if !b.is_finite() {
                max_abs = f64::INFINITY;
                max_rel = f64::INFINITY;
                continue;
            }

            let diff = (a - b).abs();
            max_abs = max_abs.max(diff);
            sq_sum += diff * diff;
            finite += 1;

            if is_normal::<T>(a) {
                max_rel = max_rel.max(diff / a.abs());
            }
        }

        let rmse = if finite > 0 {
            (sq_sum / finite as f64).sqrt()
        } else {
            0.0
        };

        Self {
            name,
            keepbits,
            max_abs_error: max_abs,
            max_rel_error: max_rel,
            rmse,
            bound,
            num_elements: n,
        }
    }

    /// Compare two versions of a float variable. `None` for integers or a
    /// dtype mismatch.
    pub fn for_variables(original: &Variable, rounded: &Variable, keepbits: u32) -> Option<Self> {
        match (original.data(), rounded.data()) {
            (ArrayData::F32(a), ArrayData::F32(b)) => Some(Self::compute(original.name(), a, b, keepbits)),
            (ArrayData::F64(a), ArrayData::F64(b)) => Some(Self::compute(original.name(), a, b, keepbits)),
            _ => None,
        }
    }

    /// Returns true if the relative error respects the rounding bound.
    #[must_use]
    pub fn within_bound(&self) -> bool {
        self.max_rel_error <= self.bound
    }
}

/// Normal in the element type's own precision.
fn is_normal<T: FloatBits>(x: f64) -> bool {
    let smallest = 2f64.powi(1 - T::bias() as i32);
    x.abs() >= smallest
}

/// Aggregate across rounded variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Number of variables measured.
    pub variables: usize,
    /// Largest relative error over all variables.
    pub worst_rel_error: f64,
    /// Variable with the largest relative error.
    pub worst_variable: Option<String>,
    /// Variables exceeding their bound.
    pub violations: Vec<String>,
}

impl QualitySummary {
    pub fn from_reports(reports: &[QualityReport]) -> Self {
        let mut summary = Self {
            variables: reports.len(),
            ..Default::default()
        };
        for report in reports {
            if summary.worst_variable.is_none() || report.max_rel_error > summary.worst_rel_error {
                summary.worst_rel_error = report.max_rel_error;
                summary.worst_variable = Some(report.name.clone());
            }
            if !report.within_bound() {
                summary.violations.push(report.name.clone());
            }
        }
        summary
    }

    #[must_use]
    pub fn all_within_bound(&self) -> bool {
        self.violations.is_empty()
    }
}
