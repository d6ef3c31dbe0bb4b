//! Instruction disassembly.
//!
//! Operands are rendered the way they would be written in source, except that
//! symbols are unknown: addresses print as hex, immediates as decimal.
//! PC-relative operands are resolved to their target address; base-relative
//! operands print their displacement as `disp(B)`.

use std::fmt;

use crate::decoder::{fetch, AddressingMode, DecodedInstruction, MemoryOperand, Operands, Relative};
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::state::Register;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Disassembly {
    /// Byte address of the first instruction byte.
    pub address: u32,
    /// Length in bytes.
    pub length: u8,
    /// Mnemonic, prefixed with `+` for format 4.
    pub mnemonic: String,
    /// Operand text, empty when the instruction takes none.
    pub operand: String,
    /// The bytes do not form a valid instruction.
    pub is_illegal: bool,
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operand.is_empty() {
            f.write_str(&self.mnemonic)
        } else {
            write!(f, "{:<7} {}", self.mnemonic, self.operand)
        }
    }
}

/// Renders an already decoded instruction located at `address`.
#[must_use]
pub fn disassemble_instruction(address: u32, instr: &DecodedInstruction) -> Disassembly {
    let length = instr.length();
    let (mnemonic, operand) = match instr.operands {
        Operands::None => (instr.opcode.mnemonic().to_string(), String::new()),
        Operands::Registers { r1, r2 } => (
            instr.opcode.mnemonic().to_string(),
            format_registers(instr.opcode, r1, r2),
        ),
        Operands::Memory(operand) => {
            let prefix = if operand.extended { "+" } else { "" };
            let text = if instr.opcode == Opcode::Rsub {
                String::new()
            } else {
                format_memory(&operand, address + u32::from(length))
            };
            (format!("{prefix}{}", instr.opcode.mnemonic()), text)
        }
    };

    Disassembly {
        address,
        length,
        mnemonic,
        operand,
        is_illegal: false,
    }
}

/// Disassembles the instruction at byte address `address`.
///
/// Bytes that do not decode are rendered as a single `BYTE X'..'` row.
/// Returns `None` when `address` is outside memory.
#[must_use]
pub fn disassemble(memory: &Memory, address: u32) -> Option<Disassembly> {
    match fetch(memory, address) {
        Ok(instr) => Some(disassemble_instruction(address, &instr)),
        Err(_) => {
            let byte = memory.read_byte(address as usize).ok()?;
            Some(Disassembly {
                address,
                length: 1,
                mnemonic: "BYTE".to_string(),
                operand: format!("X'{byte:02X}'"),
                is_illegal: true,
            })
        }
    }
}

/// Disassembles consecutive instructions in `start..end`.
#[must_use]
pub fn disassemble_range(memory: &Memory, start: u32, end: u32) -> Vec<Disassembly> {
    let mut rows = Vec::new();
    let mut address = start;
    while address < end {
        let Some(row) = disassemble(memory, address) else {
            break;
        };
        address += u32::from(row.length);
        rows.push(row);
    }
    rows
}

fn register_name(number: u8) -> String {
    Register::from_number(number).map_or_else(|| format!("?{number}"), |r| r.name().to_string())
}

fn format_registers(opcode: Opcode, r1: u8, r2: u8) -> String {
    match opcode {
        Opcode::Clear | Opcode::Tixr => register_name(r1),
        Opcode::Svc => r1.to_string(),
        Opcode::Shiftl | Opcode::Shiftr => format!("{},{}", register_name(r1), u32::from(r2) + 1),
        _ => format!("{},{}", register_name(r1), register_name(r2)),
    }
}

fn format_memory(operand: &MemoryOperand, next_pc: u32) -> String {
    let prefix = match operand.mode {
        AddressingMode::Immediate => "#",
        AddressingMode::Indirect => "@",
        AddressingMode::Simple | AddressingMode::Sic => "",
    };
    let body = match operand.relative {
        Relative::Direct if operand.mode == AddressingMode::Immediate => operand.field.to_string(),
        Relative::Direct => format!("{:04X}", operand.field),
        Relative::Pc => format!(
            "{:04X}",
            next_pc.wrapping_add_signed(crate::decoder::sign_extend_12(operand.field)) & 0xFF_FFFF
        ),
        Relative::Base => format!("{:03X}(B)", operand.field),
    };
    let index = if operand.indexed { ",X" } else { "" };
    format!("{prefix}{body}{index}")
}

#[cfg(test)]
mod tests {
    use super::{disassemble, disassemble_range};
    use crate::memory::Memory;

    fn memory_with(bytes: &[u8]) -> Memory {
        let mut memory = Memory::new(10).unwrap();
        memory.write_bytes(0, bytes).unwrap();
        memory
    }

    #[test]
    fn renders_each_format() {
        let memory = memory_with(&[
            0x03, 0x00, 0x1E, // LDA 001E
            0x01, 0x00, 0x03, // LDA #3
            0x0F, 0xA0, 0x03, // STA pc+3,X
            0x4B, 0x10, 0x10, 0x36, // +JSUB 1036
            0xA4, 0x43, // SHIFTL S,4
            0xC4, // FIX
            0x6A, 0x40, 0x10, // LDB @010(B)
        ]);
        let text: Vec<String> = disassemble_range(&memory, 0, 19)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            text,
            [
                "LDA     001E",
                "LDA     #3",
                "STA     000C,X",
                "+JSUB   1036",
                "SHIFTL  S,4",
                "FIX",
                "LDB     @010(B)",
            ]
        );
    }

    #[test]
    fn illegal_bytes_render_as_data() {
        let memory = memory_with(&[0xFF]);
        let row = disassemble(&memory, 0).unwrap();
        assert!(row.is_illegal);
        assert_eq!(row.to_string(), "BYTE    X'FF'");
        assert_eq!(row.length, 1);
    }

    #[test]
    fn outside_memory_yields_nothing() {
        let memory = memory_with(&[]);
        assert!(disassemble(&memory, 30).is_none());
    }
}
