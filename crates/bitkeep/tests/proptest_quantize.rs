//! Property-based tests for bit-rounding.
//!
//! - keepbits 0 (or the full mantissa) leaves every bit pattern unchanged
//! - rounded values stay within half a unit in the last kept place, up to
//!   the largest finite value
//! - NaN, infinities and signed zeros pass through
//!
//! Run with: cargo test --test proptest_quantize

use proptest::prelude::*;

use bitkeep::bitround;

/// Strategy for f32 keepbits that actually round.
fn f32_keepbits_strategy() -> impl Strategy<Value = u32> {
    1u32..23
}

/// Strategy for f64 keepbits that actually round.
fn f64_keepbits_strategy() -> impl Strategy<Value = u32> {
    1u32..52
}

fn relative_error(original: f64, rounded: f64) -> f64 {
    (rounded - original).abs() / original.abs()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    /// Property: rounding to zero or all mantissa bits is bit-for-bit identity.
    #[test]
    fn prop_zero_keepbits_is_identity(bits in any::<u32>(), wide in any::<u64>()) {
        let x = f32::from_bits(bits);
        prop_assert_eq!(bitround(x, 0).to_bits(), bits);
        prop_assert_eq!(bitround(x, 23).to_bits(), bits);

        let y = f64::from_bits(wide);
        prop_assert_eq!(bitround(y, 0).to_bits(), wide);
        prop_assert_eq!(bitround(y, 52).to_bits(), wide);
    }

    /// Property: |q - x| / |x| <= 2^-(k+1) for normal f32, up to f32::MAX.
    #[test]
    fn prop_f32_error_within_bound(bits in any::<u32>(), k in f32_keepbits_strategy()) {
        let x = f32::from_bits(bits);
        prop_assume!(x.is_normal());
        let q = bitround(x, k);
        prop_assert!(q.is_finite());
        prop_assert!(
            relative_error(x as f64, q as f64) <= 2f64.powi(-(k as i32 + 1)),
            "x={} k={} q={}", x, k, q
        );
    }

    /// Property: |q - x| / |x| <= 2^-(k+1) for normal f64, up to f64::MAX.
    #[test]
    fn prop_f64_error_within_bound(bits in any::<u64>(), k in f64_keepbits_strategy()) {
        let x = f64::from_bits(bits);
        prop_assume!(x.is_normal());
        let q = bitround(x, k);
        prop_assert!(q.is_finite());
        prop_assert!(
            relative_error(x, q) <= 2f64.powi(-(k as i32 + 1)),
            "x={} k={} q={}", x, k, q
        );
    }

    /// Property: discarded mantissa bits are zero and rounding twice changes nothing.
    #[test]
    fn prop_trailing_bits_cleared(x in -1.0e6f32..1.0e6, k in f32_keepbits_strategy()) {
        let q = bitround(x, k);
        let trailing = (1u32 << (23 - k)) - 1;
        prop_assert_eq!(q.to_bits() & trailing, 0);
        prop_assert_eq!(bitround(q, k).to_bits(), q.to_bits());
    }

    /// Property: values in the top binade never round to infinity.
    #[test]
    fn prop_top_binade_stays_finite(mantissa in 0u32..(1 << 23), negative in any::<bool>(), k in f32_keepbits_strategy()) {
        let bits = (u32::from(negative) << 31) | (0xFE << 23) | mantissa;
        let x = f32::from_bits(bits);
        let q = bitround(x, k);
        prop_assert!(q.is_finite(), "x={} k={} q={}", x, k, q);
        prop_assert!(relative_error(x as f64, q as f64) <= 2f64.powi(-(k as i32 + 1)));
    }

    /// Property: non-finite values and zeros are never touched.
    #[test]
    fn prop_special_values_unchanged(k in f32_keepbits_strategy()) {
        for x in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 0.0, -0.0] {
            prop_assert_eq!(bitround(x, k).to_bits(), x.to_bits());
        }
    }
}
