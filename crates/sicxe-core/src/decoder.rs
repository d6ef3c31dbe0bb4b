//! Instruction decoder for the SIC/XE instruction formats.
//!
//! ```text
//! format 1  | opcode:8 |
//! format 2  | opcode:8 | r1:4 | r2:4 |
//! format 3  | opcode:6 | n | i | x | b | p | e=0 | disp:12 |
//! format 4  | opcode:6 | n | i | x | b | p | e=1 | address:20 |
//! SIC       | opcode:8 (n=i=0) | x | address:15 |
//! ```
//!
//! Decoding is pure: it classifies bytes and validates flag combinations.
//! Register numbers in format 2 are checked at execution time because their
//! meaning depends on the opcode (`SHIFTL` count, `SVC` number).

use crate::fault::EngineFault;
use crate::memory::Memory;
use crate::opcode::{InstructionFormat, Opcode};

/// Maximum instruction length in bytes.
pub const MAX_INSTRUCTION_BYTES: usize = 4;

const FLAG_X: u8 = 0x80;
const FLAG_B: u8 = 0x40;
const FLAG_P: u8 = 0x20;
const FLAG_E: u8 = 0x10;

/// How the operand value is obtained from the target address (`n`/`i` bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AddressingMode {
    /// `n=1 i=1`: operand is the memory contents at the target address.
    Simple,
    /// `n=0 i=1`: operand is the target address itself.
    Immediate,
    /// `n=1 i=0`: the target address holds the address of the operand.
    Indirect,
    /// `n=0 i=0`: legacy SIC instruction with a 15-bit address.
    Sic,
}

impl AddressingMode {
    /// Decodes the `n`/`i` bits from the low two bits of the first byte.
    #[must_use]
    pub const fn from_ni(bits: u8) -> Self {
        match bits & 0x03 {
            0b11 => Self::Simple,
            0b01 => Self::Immediate,
            0b10 => Self::Indirect,
            _ => Self::Sic,
        }
    }

    /// The `n`/`i` bits for this mode.
    #[must_use]
    pub const fn ni(self) -> u8 {
        match self {
            Self::Simple => 0b11,
            Self::Immediate => 0b01,
            Self::Indirect => 0b10,
            Self::Sic => 0b00,
        }
    }
}

/// Base of the target-address computation (`b`/`p` bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Relative {
    /// The field is the address.
    Direct,
    /// Signed 12-bit displacement from the next instruction.
    Pc,
    /// Unsigned 12-bit displacement from `B`.
    Base,
}

/// Memory operand of a format 3/4 or SIC instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryOperand {
    /// Operand resolution mode.
    pub mode: AddressingMode,
    /// `x` flag: add the `X` register.
    pub indexed: bool,
    /// Displacement base.
    pub relative: Relative,
    /// `e` flag: format 4 with a 20-bit address.
    pub extended: bool,
    /// Raw displacement or address field.
    pub field: u32,
}

/// Operand fields of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operands {
    /// Format 1.
    None,
    /// Format 2 raw register nibbles.
    Registers {
        /// High nibble.
        r1: u8,
        /// Low nibble.
        r2: u8,
    },
    /// Format 3, format 4, or SIC.
    Memory(MemoryOperand),
}

/// A validated instruction ready for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedInstruction {
    /// Operation.
    pub opcode: Opcode,
    /// Operand fields.
    pub operands: Operands,
}

impl DecodedInstruction {
    /// Encoded length in bytes.
    #[must_use]
    pub const fn length(&self) -> u8 {
        match self.operands {
            Operands::None => 1,
            Operands::Registers { .. } => 2,
            Operands::Memory(MemoryOperand { extended: true, .. }) => 4,
            Operands::Memory(_) => 3,
        }
    }

    /// Re-encodes the instruction into its object bytes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Vec<u8> {
        let code = self.opcode.code();
        match self.operands {
            Operands::None => vec![code],
            Operands::Registers { r1, r2 } => vec![code, (r1 << 4) | (r2 & 0x0F)],
            Operands::Memory(operand) => {
                let first = code | operand.mode.ni();
                let x = if operand.indexed { FLAG_X } else { 0 };
                if operand.mode == AddressingMode::Sic {
                    let field = operand.field & 0x7FFF;
                    return vec![first, x | (field >> 8) as u8, field as u8];
                }

                let mut flags = x;
                match operand.relative {
                    Relative::Direct => {}
                    Relative::Pc => flags |= FLAG_P,
                    Relative::Base => flags |= FLAG_B,
                }
                if operand.extended {
                    let field = operand.field & 0xF_FFFF;
                    vec![
                        first,
                        flags | FLAG_E | (field >> 16) as u8,
                        (field >> 8) as u8,
                        field as u8,
                    ]
                } else {
                    let field = operand.field & 0xFFF;
                    vec![first, flags | (field >> 8) as u8, field as u8]
                }
            }
        }
    }
}

/// Decodes the instruction starting at `bytes[0]`.
///
/// Bytes past the instruction length are ignored.
///
/// # Errors
///
/// Returns [`EngineFault::IllegalOpcode`] for unassigned opcode bytes and
/// [`EngineFault::IllegalAddressing`] for invalid flag combinations.
pub fn decode(bytes: [u8; MAX_INSTRUCTION_BYTES]) -> Result<DecodedInstruction, EngineFault> {
    let [b0, b1, b2, b3] = bytes;
    let opcode = Opcode::from_byte(b0).ok_or(EngineFault::IllegalOpcode { opcode: b0 })?;

    let operands = match opcode.format() {
        InstructionFormat::One => Operands::None,
        InstructionFormat::Two => Operands::Registers {
            r1: b1 >> 4,
            r2: b1 & 0x0F,
        },
        InstructionFormat::ThreeFour => Operands::Memory(decode_memory_operand(b0, b1, b2, b3)?),
    };

    Ok(DecodedInstruction { opcode, operands })
}

fn decode_memory_operand(b0: u8, b1: u8, b2: u8, b3: u8) -> Result<MemoryOperand, EngineFault> {
    let mode = AddressingMode::from_ni(b0);
    let indexed = b1 & FLAG_X != 0;

    if mode == AddressingMode::Sic {
        return Ok(MemoryOperand {
            mode,
            indexed,
            relative: Relative::Direct,
            extended: false,
            field: (u32::from(b1 & 0x7F) << 8) | u32::from(b2),
        });
    }

    let relative = match (b1 & FLAG_B != 0, b1 & FLAG_P != 0) {
        (false, false) => Relative::Direct,
        (false, true) => Relative::Pc,
        (true, false) => Relative::Base,
        (true, true) => return Err(EngineFault::IllegalAddressing),
    };
    let extended = b1 & FLAG_E != 0;
    if extended && relative != Relative::Direct {
        return Err(EngineFault::IllegalAddressing);
    }
    if indexed && mode != AddressingMode::Simple {
        return Err(EngineFault::IllegalAddressing);
    }

    let high = u32::from(b1 & 0x0F);
    let field = if extended {
        (high << 16) | (u32::from(b2) << 8) | u32::from(b3)
    } else {
        (high << 8) | u32::from(b2)
    };

    Ok(MemoryOperand {
        mode,
        indexed,
        relative,
        extended,
        field,
    })
}

/// Fetches and decodes the instruction at byte address `pc`.
///
/// # Errors
///
/// Returns [`EngineFault::AddressOutOfRange`] when the instruction does not
/// fit in memory, or any error from [`decode`].
#[allow(clippy::cast_possible_truncation)]
pub fn fetch(memory: &Memory, pc: u32) -> Result<DecodedInstruction, EngineFault> {
    let start = pc as usize;
    let available = memory.byte_capacity().saturating_sub(start);
    if available == 0 {
        return Err(EngineFault::AddressOutOfRange { address: pc });
    }

    let mut window = [0u8; MAX_INSTRUCTION_BYTES];
    let take = available.min(MAX_INSTRUCTION_BYTES);
    let bytes = memory
        .read_bytes(start, take)
        .map_err(|_| EngineFault::AddressOutOfRange { address: pc })?;
    window[..take].copy_from_slice(&bytes);

    let decoded = decode(window)?;
    if usize::from(decoded.length()) > available {
        return Err(EngineFault::AddressOutOfRange {
            address: pc + available as u32,
        });
    }
    Ok(decoded)
}

/// Sign-extends a 12-bit PC-relative displacement.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn sign_extend_12(field: u32) -> i32 {
    let field = (field & 0xFFF) as i32;
    if field & 0x800 != 0 {
        field - 0x1000
    } else {
        field
    }
}
