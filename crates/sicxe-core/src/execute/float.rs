//! SIC/XE 48-bit floating-point format.
//!
//! ```text
//! | s:1 | exponent:11 | fraction:36 |
//! ```
//!
//! The value is `0.fraction × 2^(exponent - 1024)` with a normalized fraction
//! (high bit set) for every non-zero value. Zero is all zero bits.

use crate::state::FLOAT_MASK;

/// Exponent bias.
pub const EXPONENT_BIAS: i32 = 1024;
/// Width of the fraction field.
pub const FRACTION_BITS: u32 = 36;

const FRACTION_MASK: u64 = (1 << FRACTION_BITS) - 1;
const EXPONENT_MAX: i32 = 0x7FF;
const SIGN_BIT: u64 = 1 << 47;

/// Converts register bits to an `f64`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn to_f64(bits: u64) -> f64 {
    let bits = bits & FLOAT_MASK;
    let fraction = bits & FRACTION_MASK;
    if fraction == 0 {
        return 0.0;
    }
    let exponent = ((bits >> FRACTION_BITS) & 0x7FF) as i32;
    let magnitude = (fraction as f64 / 2f64.powi(FRACTION_BITS as i32))
        * 2f64.powi(exponent - EXPONENT_BIAS);
    if bits & SIGN_BIT == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Converts an `f64` to normalized register bits.
///
/// Magnitudes beyond the format saturate to the largest value; magnitudes too
/// small to represent become zero.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn from_f64(value: f64) -> u64 {
    if value == 0.0 || value.is_nan() {
        return 0;
    }
    let sign = if value.is_sign_negative() { SIGN_BIT } else { 0 };
    if value.is_infinite() {
        return sign | ((EXPONENT_MAX as u64) << FRACTION_BITS) | FRACTION_MASK;
    }

    let (mantissa, mut exponent) = frexp(value.abs());
    let mut fraction = (mantissa * 2f64.powi(FRACTION_BITS as i32)).round() as u64;
    if fraction > FRACTION_MASK {
        fraction >>= 1;
        exponent += 1;
    }

    let biased = exponent + EXPONENT_BIAS;
    if biased < 0 {
        return 0;
    }
    if biased > EXPONENT_MAX {
        return sign | ((EXPONENT_MAX as u64) << FRACTION_BITS) | FRACTION_MASK;
    }
    sign | ((biased as u64) << FRACTION_BITS) | fraction
}

/// Splits a positive finite value into a mantissa in `[0.5, 1)` and an exponent.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn frexp(value: f64) -> (f64, i32) {
    const SUBNORMAL_SCALE: i32 = 64;
    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7FF) as i32;
    if exponent == 0 {
        let (mantissa, exponent) = frexp(value * 2f64.powi(SUBNORMAL_SCALE));
        return (mantissa, exponent - SUBNORMAL_SCALE);
    }
    let mantissa = f64::from_bits((bits & !(0x7FF << 52)) | (1022 << 52));
    (mantissa, exponent - 1022)
}

#[cfg(test)]
mod tests {
    use super::{from_f64, to_f64};

    #[test]
    fn one_has_canonical_encoding() {
        assert_eq!(from_f64(1.0), 0x4018_0000_0000);
        assert!((to_f64(0x4018_0000_0000) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_is_all_zero_bits() {
        assert_eq!(from_f64(0.0), 0);
        assert_eq!(from_f64(-0.0), 0);
        assert!(to_f64(0).abs() < f64::EPSILON);
    }

    #[test]
    fn sign_is_bit_47() {
        let negative = from_f64(-2.5);
        assert_eq!(negative >> 47, 1);
        assert!((to_f64(negative) + 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn representable_values_survive_conversion() {
        for value in [0.5, 3.0, 1234.5, -0.125, 1.0e-30, 6.02e23] {
            let back = to_f64(from_f64(value));
            assert!(((back - value) / value).abs() < 1.0e-10, "{value} -> {back}");
        }
    }

    #[test]
    fn out_of_range_magnitudes_saturate() {
        assert_eq!(from_f64(f64::MAX) & 0x7FFF_FFFF_FFFF, 0x7FFF_FFFF_FFFF);
        assert_eq!(from_f64(f64::MIN_POSITIVE * 1.0e-10), 0);
    }
}
