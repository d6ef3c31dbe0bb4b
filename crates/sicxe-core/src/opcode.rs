//! SIC/XE opcode table: mnemonics, machine codes, and instruction formats.

use std::fmt;

/// Instruction formats of the SIC/XE architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionFormat {
    /// One byte, opcode only.
    One,
    /// Two bytes, opcode plus two register nibbles.
    Two,
    /// Three bytes (format 3), or four with the `e` flag (format 4).
    ThreeFour,
}

/// Every opcode of the SIC/XE instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Add,
    Addf,
    Addr,
    And,
    Clear,
    Comp,
    Compf,
    Compr,
    Div,
    Divf,
    Divr,
    Fix,
    Float,
    Hio,
    J,
    Jeq,
    Jgt,
    Jlt,
    Jsub,
    Lda,
    Ldb,
    Ldch,
    Ldf,
    Ldl,
    Lds,
    Ldt,
    Ldx,
    Lps,
    Mul,
    Mulf,
    Mulr,
    Norm,
    Or,
    Rd,
    Rmo,
    Rsub,
    Shiftl,
    Shiftr,
    Sio,
    Ssk,
    Sta,
    Stb,
    Stch,
    Stf,
    Sti,
    Stl,
    Sts,
    Stsw,
    Stt,
    Stx,
    Sub,
    Subf,
    Subr,
    Svc,
    Td,
    Tio,
    Tix,
    Tixr,
    Wd,
}

/// Single source-of-truth opcode table: `(opcode, mnemonic, code byte, format)`.
///
/// Format 3/4 codes have their low two bits clear; the decoder masks the `n`
/// and `i` flags off before lookup.
pub const OPCODE_TABLE: &[(Opcode, &str, u8, InstructionFormat)] = &[
    (Opcode::Add, "ADD", 0x18, InstructionFormat::ThreeFour),
    (Opcode::Addf, "ADDF", 0x58, InstructionFormat::ThreeFour),
    (Opcode::Addr, "ADDR", 0x90, InstructionFormat::Two),
    (Opcode::And, "AND", 0x40, InstructionFormat::ThreeFour),
    (Opcode::Clear, "CLEAR", 0xB4, InstructionFormat::Two),
    (Opcode::Comp, "COMP", 0x28, InstructionFormat::ThreeFour),
    (Opcode::Compf, "COMPF", 0x88, InstructionFormat::ThreeFour),
    (Opcode::Compr, "COMPR", 0xA0, InstructionFormat::Two),
    (Opcode::Div, "DIV", 0x24, InstructionFormat::ThreeFour),
    (Opcode::Divf, "DIVF", 0x64, InstructionFormat::ThreeFour),
    (Opcode::Divr, "DIVR", 0x9C, InstructionFormat::Two),
    (Opcode::Fix, "FIX", 0xC4, InstructionFormat::One),
    (Opcode::Float, "FLOAT", 0xC0, InstructionFormat::One),
    (Opcode::Hio, "HIO", 0xF4, InstructionFormat::One),
    (Opcode::J, "J", 0x3C, InstructionFormat::ThreeFour),
    (Opcode::Jeq, "JEQ", 0x30, InstructionFormat::ThreeFour),
    (Opcode::Jgt, "JGT", 0x34, InstructionFormat::ThreeFour),
    (Opcode::Jlt, "JLT", 0x38, InstructionFormat::ThreeFour),
    (Opcode::Jsub, "JSUB", 0x48, InstructionFormat::ThreeFour),
    (Opcode::Lda, "LDA", 0x00, InstructionFormat::ThreeFour),
    (Opcode::Ldb, "LDB", 0x68, InstructionFormat::ThreeFour),
    (Opcode::Ldch, "LDCH", 0x50, InstructionFormat::ThreeFour),
    (Opcode::Ldf, "LDF", 0x70, InstructionFormat::ThreeFour),
    (Opcode::Ldl, "LDL", 0x08, InstructionFormat::ThreeFour),
    (Opcode::Lds, "LDS", 0x6C, InstructionFormat::ThreeFour),
    (Opcode::Ldt, "LDT", 0x74, InstructionFormat::ThreeFour),
    (Opcode::Ldx, "LDX", 0x04, InstructionFormat::ThreeFour),
    (Opcode::Lps, "LPS", 0xD0, InstructionFormat::ThreeFour),
    (Opcode::Mul, "MUL", 0x20, InstructionFormat::ThreeFour),
    (Opcode::Mulf, "MULF", 0x60, InstructionFormat::ThreeFour),
    (Opcode::Mulr, "MULR", 0x98, InstructionFormat::Two),
    (Opcode::Norm, "NORM", 0xC8, InstructionFormat::One),
    (Opcode::Or, "OR", 0x44, InstructionFormat::ThreeFour),
    (Opcode::Rd, "RD", 0xD8, InstructionFormat::ThreeFour),
    (Opcode::Rmo, "RMO", 0xAC, InstructionFormat::Two),
    (Opcode::Rsub, "RSUB", 0x4C, InstructionFormat::ThreeFour),
    (Opcode::Shiftl, "SHIFTL", 0xA4, InstructionFormat::Two),
    (Opcode::Shiftr, "SHIFTR", 0xA8, InstructionFormat::Two),
    (Opcode::Sio, "SIO", 0xF0, InstructionFormat::One),
    (Opcode::Ssk, "SSK", 0xEC, InstructionFormat::ThreeFour),
    (Opcode::Sta, "STA", 0x0C, InstructionFormat::ThreeFour),
    (Opcode::Stb, "STB", 0x78, InstructionFormat::ThreeFour),
    (Opcode::Stch, "STCH", 0x54, InstructionFormat::ThreeFour),
    (Opcode::Stf, "STF", 0x80, InstructionFormat::ThreeFour),
    (Opcode::Sti, "STI", 0xD4, InstructionFormat::ThreeFour),
    (Opcode::Stl, "STL", 0x14, InstructionFormat::ThreeFour),
    (Opcode::Sts, "STS", 0x7C, InstructionFormat::ThreeFour),
    (Opcode::Stsw, "STSW", 0xE8, InstructionFormat::ThreeFour),
    (Opcode::Stt, "STT", 0x84, InstructionFormat::ThreeFour),
    (Opcode::Stx, "STX", 0x10, InstructionFormat::ThreeFour),
    (Opcode::Sub, "SUB", 0x1C, InstructionFormat::ThreeFour),
    (Opcode::Subf, "SUBF", 0x5C, InstructionFormat::ThreeFour),
    (Opcode::Subr, "SUBR", 0x94, InstructionFormat::Two),
    (Opcode::Svc, "SVC", 0xB0, InstructionFormat::Two),
    (Opcode::Td, "TD", 0xE0, InstructionFormat::ThreeFour),
    (Opcode::Tio, "TIO", 0xF8, InstructionFormat::One),
    (Opcode::Tix, "TIX", 0x2C, InstructionFormat::ThreeFour),
    (Opcode::Tixr, "TIXR", 0xB8, InstructionFormat::Two),
    (Opcode::Wd, "WD", 0xDC, InstructionFormat::ThreeFour),
];

impl Opcode {
    const fn entry(self) -> (Self, &'static str, u8, InstructionFormat) {
        // Variants are declared in table order.
        OPCODE_TABLE[self as usize]
    }

    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        self.entry().1
    }

    /// Opcode byte with the low two bits clear.
    #[must_use]
    pub const fn code(self) -> u8 {
        self.entry().2
    }

    /// Instruction format.
    #[must_use]
    pub const fn format(self) -> InstructionFormat {
        self.entry().3
    }

    /// Looks up a mnemonic, ignoring ASCII case.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find(|(_, name, ..)| name.eq_ignore_ascii_case(mnemonic))
            .map(|(op, ..)| *op)
    }

    /// Classifies the first byte of an instruction.
    ///
    /// Format 1 and 2 opcodes must match the byte exactly; format 3/4 opcodes
    /// match once the `n`/`i` bits are masked off.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        let (op, _, code, format) = OPCODE_TABLE
            .iter()
            .copied()
            .find(|(_, _, code, _)| *code == byte & 0xFC)?;
        match format {
            InstructionFormat::ThreeFour => Some(op),
            InstructionFormat::One | InstructionFormat::Two => (code == byte).then_some(op),
        }
    }

    /// Returns `true` for instructions that redirect the program counter.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::J | Self::Jeq | Self::Jgt | Self::Jlt | Self::Jsub)
    }

    /// Returns `true` for instructions that write their operand to memory.
    #[must_use]
    pub const fn is_store(self) -> bool {
        matches!(
            self,
            Self::Sta
                | Self::Stb
                | Self::Stch
                | Self::Stf
                | Self::Stl
                | Self::Sts
                | Self::Stsw
                | Self::Stt
                | Self::Stx
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
