//! IEEE 754 bit geometry shared by the analyzer and the quantizer.
//!
//! Bit patterns are widened to `u64` so one code path serves `f32` and
//! `f64`; for `f32` only the low 32 bits are used.

/// Float types that can be analyzed and bit-rounded.
pub trait FloatBits: Copy + PartialEq + Send + Sync + 'static {
    /// Total storage width.
    const BITS: u32;
    /// Exponent field width.
    const EXPONENT_BITS: u32;
    /// Explicit mantissa width.
    const MANTISSA_BITS: u32;

    fn to_bits_u64(self) -> u64;
    fn from_bits_u64(bits: u64) -> Self;
    fn is_finite_value(self) -> bool;
    fn to_f64(self) -> f64;

    /// Exponent bias.
    fn bias() -> i64 {
        (1i64 << (Self::EXPONENT_BITS - 1)) - 1
    }

    fn sign_mask() -> u64 {
        1u64 << (Self::BITS - 1)
    }

    fn mantissa_mask() -> u64 {
        (1u64 << Self::MANTISSA_BITS) - 1
    }

    /// Exponent mask, unshifted.
    fn exponent_mask() -> u64 {
        ((1u64 << Self::EXPONENT_BITS) - 1) << Self::MANTISSA_BITS
    }

    /// Re-encode the biased exponent as sign and magnitude.
    ///
    /// Values just above and below 1.0 differ in every biased exponent
    /// bit; after the transform they differ only in the exponent sign, so
    /// the exponent bits stop looking informative. Only meaningful for
    /// finite inputs.
    fn signed_exponent(bits: u64) -> u64 {
        let kept = bits & (Self::sign_mask() | Self::mantissa_mask());
        let biased = ((bits & Self::exponent_mask()) >> Self::MANTISSA_BITS) as i64;
        let e = biased - Self::bias();

        let magnitude_mask = (1u64 << (Self::EXPONENT_BITS - 1)) - 1;
        let magnitude = e.unsigned_abs() & magnitude_mask;
        let esign = if e < 0 { Self::sign_mask() >> 1 } else { 0 };

        kept | esign | (magnitude << Self::MANTISSA_BITS)
    }
}

impl FloatBits for f32 {
    const BITS: u32 = 32;
    const EXPONENT_BITS: u32 = 8;
    const MANTISSA_BITS: u32 = 23;

    #[inline]
    fn to_bits_u64(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_bits_u64(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }

    #[inline]
    fn is_finite_value(self) -> bool {
        self.is_finite()
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl FloatBits for f64 {
    const BITS: u32 = 64;
    const EXPONENT_BITS: u32 = 11;
    const MANTISSA_BITS: u32 = 52;

    #[inline]
    fn to_bits_u64(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_bits_u64(bits: u64) -> Self {
        f64::from_bits(bits)
    }

    #[inline]
    fn is_finite_value(self) -> bool {
        self.is_finite()
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}
