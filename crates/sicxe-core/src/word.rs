//! The 24-bit machine word.

use std::fmt;

/// Number of bits in a SIC/XE word.
pub const WORD_BITS: u32 = 24;
/// Mask selecting the low 24 bits of an integer.
pub const WORD_MASK: u32 = (1 << WORD_BITS) - 1;
/// Number of bytes in a word.
pub const WORD_BYTES: usize = 3;

const SIGN_BIT: u32 = 1 << (WORD_BITS - 1);

/// A single 24-bit cell.
///
/// Every constructor reduces its input modulo 2^24, so a `Word` can never hold
/// a value outside `0..=0xFF_FFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Word(u32);

impl Word {
    /// The zero word.
    pub const ZERO: Self = Self(0);
    /// Largest unsigned value a word can hold.
    pub const MAX: Self = Self(WORD_MASK);

    /// Creates a word from an unsigned value, masking to 24 bits.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value & WORD_MASK)
    }

    /// Creates a word from a signed value using 24-bit two's complement.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_signed(value: i64) -> Self {
        Self((value as u64 & WORD_MASK as u64) as u32)
    }

    /// Assembles a word from three big-endian bytes.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 3]) -> Self {
        Self(((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32)
    }

    /// Returns the raw unsigned value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Interprets the word as a 24-bit two's complement integer.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_signed(self) -> i32 {
        if self.0 & SIGN_BIT == 0 {
            self.0 as i32
        } else {
            (self.0 | !WORD_MASK) as i32
        }
    }

    /// Returns the three big-endian bytes of the word.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_be_bytes(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// Returns `true` when the sign bit (bit 23) is set.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 & SIGN_BIT != 0
    }

    /// Adds with wrap-around at 2^24.
    #[must_use]
    pub const fn wrapping_add(self, rhs: Self) -> Self {
        Self::new(self.0.wrapping_add(rhs.0))
    }

    /// Subtracts with wrap-around at 2^24.
    #[must_use]
    pub const fn wrapping_sub(self, rhs: Self) -> Self {
        Self::new(self.0.wrapping_sub(rhs.0))
    }

    /// Multiplies with wrap-around at 2^24.
    #[must_use]
    pub const fn wrapping_mul(self, rhs: Self) -> Self {
        Self::new(self.0.wrapping_mul(rhs.0))
    }

    /// Signed division truncating toward zero. Returns `None` for a zero divisor.
    #[must_use]
    pub const fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            return None;
        }
        Some(Self::from_signed(
            self.as_signed() as i64 / rhs.as_signed() as i64,
        ))
    }
}

impl From<u32> for Word {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Word> for u32 {
    fn from(word: Word) -> Self {
        word.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::UpperHex for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::{Word, WORD_MASK};
    use proptest::prelude::*;

    #[test]
    fn construction_masks_to_24_bits() {
        assert_eq!(Word::new(0x0123_4567).value(), 0x23_4567);
        assert_eq!(Word::new(u32::MAX).value(), WORD_MASK);
    }

    #[test]
    fn signed_values_use_twos_complement() {
        assert_eq!(Word::from_signed(-1).value(), 0xFF_FFFF);
        assert_eq!(Word::from_signed(-1).as_signed(), -1);
        assert_eq!(Word::new(0x80_0000).as_signed(), -8_388_608);
        assert_eq!(Word::new(0x7F_FFFF).as_signed(), 8_388_607);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(Word::MAX.wrapping_add(Word::new(1)), Word::ZERO);
        assert_eq!(Word::ZERO.wrapping_sub(Word::new(1)), Word::MAX);
        assert_eq!(
            Word::new(0x1000).wrapping_mul(Word::new(0x1000)),
            Word::new(0)
        );
    }

    #[test]
    fn division_is_signed_and_checks_zero() {
        assert_eq!(
            Word::from_signed(-12).checked_div(Word::new(4)),
            Some(Word::from_signed(-3))
        );
        assert_eq!(Word::new(7).checked_div(Word::ZERO), None);
    }

    #[test]
    fn byte_conversion_is_big_endian() {
        let word = Word::new(0x12_3456);
        assert_eq!(word.to_be_bytes(), [0x12, 0x34, 0x56]);
        assert_eq!(Word::from_be_bytes([0x12, 0x34, 0x56]), word);
    }

    proptest! {
        #[test]
        fn value_is_always_in_range(raw in any::<u32>()) {
            prop_assert!(Word::new(raw).value() <= WORD_MASK);
            prop_assert_eq!(Word::new(raw).value(), raw % (1 << 24));
        }

        #[test]
        fn signed_roundtrip_in_range(value in -8_388_608_i64..=8_388_607) {
            prop_assert_eq!(i64::from(Word::from_signed(value).as_signed()), value);
        }
    }
}
