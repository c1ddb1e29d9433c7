//! Bit-rounding quantizer.
//!
//! Keeps the sign, the exponent and the top `keepbits` mantissa bits of
//! every element and rounds the discarded bits to nearest, ties to even.
//! The discarded bits become zero, which is what the shuffle + zlib stage
//! later removes.

use crate::dataset::{ArrayData, DType, Variable};
use crate::float_bits::FloatBits;

/// Round one value to `keepbits` mantissa bits.
///
/// `keepbits == 0` and `keepbits >= T::MANTISSA_BITS` return the value
/// unchanged, as do NaN, infinities and zeros. A carry out of the mantissa
/// propagates into the exponent, except where it would reach the all-ones
/// exponent: values that would round up to infinity are truncated instead.
///
/// For normal values the relative error is at most `2^-(keepbits+1)`.
/// Subnormals are rounded on the same grid, so their absolute error is at
/// most `2^-(keepbits+1)` times the smallest normal; small subnormals may
/// round to zero.
#[inline]
pub fn bitround<T: FloatBits>(value: T, keepbits: u32) -> T {
    if keepbits == 0 || keepbits >= T::MANTISSA_BITS || !value.is_finite_value() {
        return value;
    }

    let bits = value.to_bits_u64();
    if bits & !T::sign_mask() == 0 {
        return value;
    }

    let maskbits = T::MANTISSA_BITS - keepbits;
    let mask = !0u64 << maskbits;
    let half = (1u64 << (maskbits - 1)) - 1;

    let rounded = (bits + ((bits >> maskbits) & 1) + half) & mask;
    if rounded & T::exponent_mask() == T::exponent_mask() {
        return T::from_bits_u64(bits & mask);
    }
    T::from_bits_u64(rounded)
}

/// Keepbits that actually change values of `dtype`, if any.
///
/// Integer types, `keepbits <= 0` and `keepbits >= mantissa width` are
/// all the identity.
pub fn effective_keepbits(dtype: DType, keepbits: i32) -> Option<u32> {
    let width = dtype.mantissa_bits()?;
    if keepbits <= 0 || keepbits as u32 >= width {
        return None;
    }
    Some(keepbits as u32)
}

fn round_slice<T: FloatBits>(values: &mut [T], keepbits: u32) {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        values.par_iter_mut().for_each(|v| *v = bitround(*v, keepbits));
    }

    #[cfg(not(feature = "parallel"))]
    values.iter_mut().for_each(|v| *v = bitround(*v, keepbits));
}

/// Return a bit-rounded copy of `variable`.
pub fn quantize(variable: &Variable, keepbits: i32) -> Variable {
    let mut out = variable.with_data(variable.data().clone());
    quantize_in_place(&mut out, keepbits);
    out
}

/// Bit-round `variable` in place. Returns true if rounding was applied.
pub fn quantize_in_place(variable: &mut Variable, keepbits: i32) -> bool {
    let Some(k) = effective_keepbits(variable.dtype(), keepbits) else {
        return false;
    };

    match variable.data_mut() {
        ArrayData::F32(values) => round_slice(values, k),
        ArrayData::F64(values) => round_slice(values, k),
        ArrayData::I32(_) | ArrayData::I64(_) => return false,
    }
    true
}
