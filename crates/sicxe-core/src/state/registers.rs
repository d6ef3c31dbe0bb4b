//! Register numbering, the register file, and the `SW` condition code.

use std::fmt;
use std::str::FromStr;

use crate::word::{Word, WORD_MASK};

/// Number of architecturally visible registers.
pub const REGISTER_COUNT: usize = 9;
/// Mask selecting the 48 bits of the floating-point register.
pub const FLOAT_MASK: u64 = (1 << 48) - 1;
/// `SW` bits holding the condition code.
pub const SW_CC_MASK: u32 = 0b1100_0000;
/// Condition code value for "less than".
pub const SW_CC_LT: u32 = 0b0000_0000;
/// Condition code value for "equal".
pub const SW_CC_EQ: u32 = 0b0100_0000;
/// Condition code value for "greater than".
pub const SW_CC_GT: u32 = 0b1000_0000;

/// SIC/XE register identifier, numbered as in format-2 instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Register {
    /// Accumulator.
    A = 0,
    /// Index register.
    X = 1,
    /// Linkage register.
    L = 2,
    /// Base register.
    B = 3,
    /// General working register.
    S = 4,
    /// General working register.
    T = 5,
    /// 48-bit floating-point accumulator.
    F = 6,
    /// Program counter.
    PC = 8,
    /// Status word.
    SW = 9,
}

impl Register {
    /// Every register in number order.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::A,
        Self::X,
        Self::L,
        Self::B,
        Self::S,
        Self::T,
        Self::F,
        Self::PC,
        Self::SW,
    ];

    /// Decodes a 4-bit register number from a format-2 instruction.
    #[must_use]
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Self::A),
            1 => Some(Self::X),
            2 => Some(Self::L),
            3 => Some(Self::B),
            4 => Some(Self::S),
            5 => Some(Self::T),
            6 => Some(Self::F),
            8 => Some(Self::PC),
            9 => Some(Self::SW),
            _ => None,
        }
    }

    /// Register number as encoded in format-2 instructions.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Assembler mnemonic for the register.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::X => "X",
            Self::L => "L",
            Self::B => "B",
            Self::S => "S",
            Self::T => "T",
            Self::F => "F",
            Self::PC => "PC",
            Self::SW => "SW",
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::PC => 7,
            Self::SW => 8,
            other => other as usize,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown register name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown register name {0:?}")]
pub struct UnknownRegister(pub String);

impl FromStr for Register {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRegister(s.to_string()))
    }
}

/// Three-way result of the last comparison, stored in `SW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ConditionCode {
    /// First operand was smaller.
    Less,
    /// Operands were equal.
    Equal,
    /// First operand was larger.
    Greater,
}

impl ConditionCode {
    /// Condition code for `lhs` compared with `rhs`.
    #[must_use]
    pub fn compare<T: PartialOrd>(lhs: T, rhs: T) -> Self {
        if lhs < rhs {
            Self::Less
        } else if lhs > rhs {
            Self::Greater
        } else {
            Self::Equal
        }
    }

    const fn sw_bits(self) -> u32 {
        match self {
            Self::Less => SW_CC_LT,
            Self::Equal => SW_CC_EQ,
            Self::Greater => SW_CC_GT,
        }
    }
}

/// The SIC/XE register file.
///
/// `F` is 48 bits wide; every other register holds one 24-bit word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    slots: [u64; REGISTER_COUNT],
}

impl RegisterFile {
    /// Reads any register; `F` yields all 48 bits.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u64 {
        self.slots[reg.slot()]
    }

    /// Writes any register, masking to its width.
    pub const fn set(&mut self, reg: Register, value: u64) {
        let mask = match reg {
            Register::F => FLOAT_MASK,
            _ => WORD_MASK as u64,
        };
        self.slots[reg.slot()] = value & mask;
    }

    /// Reads a 24-bit register as a word. For `F` this is the low 24 bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn word(&self, reg: Register) -> Word {
        Word::new(self.slots[reg.slot()] as u32)
    }

    /// Writes a word into a register.
    pub const fn set_word(&mut self, reg: Register, word: Word) {
        self.set(reg, word.value() as u64);
    }

    /// Reads the `A` register.
    #[must_use]
    pub const fn a(&self) -> Word {
        self.word(Register::A)
    }

    /// Reads the `X` register.
    #[must_use]
    pub const fn x(&self) -> Word {
        self.word(Register::X)
    }

    /// Reads the `L` register.
    #[must_use]
    pub const fn l(&self) -> Word {
        self.word(Register::L)
    }

    /// Reads the `B` register.
    #[must_use]
    pub const fn b(&self) -> Word {
        self.word(Register::B)
    }

    /// Reads the 48-bit `F` register.
    #[must_use]
    pub const fn f(&self) -> u64 {
        self.get(Register::F)
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.word(Register::PC).value()
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, address: u32) {
        self.set(Register::PC, address as u64);
    }

    /// Reads the status word.
    #[must_use]
    pub const fn sw(&self) -> Word {
        self.word(Register::SW)
    }

    /// Decodes the condition code held in `SW`.
    #[must_use]
    pub const fn condition_code(&self) -> ConditionCode {
        match self.sw().value() & SW_CC_MASK {
            SW_CC_LT => ConditionCode::Less,
            SW_CC_EQ => ConditionCode::Equal,
            _ => ConditionCode::Greater,
        }
    }

    /// Replaces the condition-code bits of `SW`, keeping the others.
    pub const fn set_condition_code(&mut self, cc: ConditionCode) {
        let sw = (self.sw().value() & !SW_CC_MASK) | cc.sw_bits();
        self.set(Register::SW, sw as u64);
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reg) in Register::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if *reg == Register::F {
                write!(f, "{reg}={:012X}", self.get(*reg))?;
            } else {
                write!(f, "{reg}={:06X}", self.get(*reg))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConditionCode, Register, RegisterFile, FLOAT_MASK, SW_CC_MASK};
    use crate::word::Word;

    #[test]
    fn register_numbers_match_architecture() {
        for reg in Register::ALL {
            assert_eq!(Register::from_number(reg.number()), Some(reg));
        }
        assert_eq!(Register::from_number(7), None);
        assert_eq!(Register::from_number(10), None);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("pc".parse::<Register>(), Ok(Register::PC));
        assert_eq!("Sw".parse::<Register>(), Ok(Register::SW));
        assert!("R0".parse::<Register>().is_err());
    }

    #[test]
    fn each_register_is_independent() {
        let mut regs = RegisterFile::default();
        for (value, reg) in (1_u64..).zip(Register::ALL) {
            regs.set(reg, value);
        }
        for (value, reg) in (1_u64..).zip(Register::ALL) {
            assert_eq!(regs.get(reg), value);
        }
    }

    #[test]
    fn word_registers_mask_to_24_bits_and_f_to_48() {
        let mut regs = RegisterFile::default();
        regs.set(Register::A, 0x1_2345_6789);
        regs.set(Register::F, u64::MAX);
        assert_eq!(regs.a(), Word::new(0x45_6789));
        assert_eq!(regs.f(), FLOAT_MASK);
    }

    #[test]
    fn condition_code_only_touches_cc_bits() {
        let mut regs = RegisterFile::default();
        regs.set(Register::SW, 0x00_0F01);
        for cc in [ConditionCode::Less, ConditionCode::Greater, ConditionCode::Equal] {
            regs.set_condition_code(cc);
            assert_eq!(regs.condition_code(), cc);
            assert_eq!(regs.sw().value() & !SW_CC_MASK, 0x00_0F01 & !SW_CC_MASK);
        }
    }

    #[test]
    fn compare_orders_operands() {
        assert_eq!(ConditionCode::compare(1, 2), ConditionCode::Less);
        assert_eq!(ConditionCode::compare(2, 2), ConditionCode::Equal);
        assert_eq!(ConditionCode::compare(-1, -2), ConditionCode::Greater);
    }
}
