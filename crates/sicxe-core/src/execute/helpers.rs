//! Target-address and operand resolution.

use crate::decoder::{sign_extend_12, AddressingMode, MemoryOperand, Relative};
use crate::fault::EngineFault;
use crate::memory::Memory;
use crate::state::RegisterFile;
use crate::word::{Word, WORD_MASK};

/// Computes the target address of a memory operand.
///
/// `next_pc` is the address of the following instruction, the base of
/// PC-relative displacements. The result wraps at 24 bits.
#[must_use]
pub fn target_address(operand: &MemoryOperand, next_pc: u32, regs: &RegisterFile) -> u32 {
    let base = match operand.relative {
        Relative::Direct => operand.field,
        Relative::Pc => next_pc.wrapping_add_signed(sign_extend_12(operand.field)),
        Relative::Base => regs.b().value().wrapping_add(operand.field),
    };
    let address = if operand.indexed {
        base.wrapping_add(regs.x().value())
    } else {
        base
    };
    address & WORD_MASK
}

/// Checks that `len` bytes starting at `address` lie inside memory.
pub(super) fn check_span(memory: &Memory, address: u32, len: usize) -> Result<(), EngineFault> {
    let end = (address as usize).checked_add(len);
    match end {
        Some(end) if end <= memory.byte_capacity() => Ok(()),
        _ => Err(EngineFault::AddressOutOfRange { address }),
    }
}

/// Reads `len` bytes as a big-endian integer.
pub(super) fn read_be(memory: &Memory, address: u32, len: usize) -> Result<u64, EngineFault> {
    let bytes = memory
        .read_bytes(address as usize, len)
        .map_err(|_| EngineFault::AddressOutOfRange { address })?;
    Ok(bytes.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Splits the low `len` bytes of `value` into big-endian order.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn to_be(value: u64, len: usize) -> Vec<u8> {
    (0..len).rev().map(|i| (value >> (8 * i)) as u8).collect()
}

/// Address of the operand in memory, following one level of indirection.
///
/// Immediate operands have no memory address.
pub(super) fn operand_address(
    operand: &MemoryOperand,
    target: u32,
    memory: &Memory,
) -> Result<u32, EngineFault> {
    match operand.mode {
        AddressingMode::Simple | AddressingMode::Sic => Ok(target),
        AddressingMode::Indirect => {
            let pointer = memory
                .read_word_at(target as usize)
                .map_err(|_| EngineFault::AddressOutOfRange { address: target })?;
            Ok(pointer.value())
        }
        AddressingMode::Immediate => Err(EngineFault::IllegalAddressing),
    }
}

/// Operand value `len` bytes wide; immediate operands yield the target address.
pub(super) fn load_operand(
    operand: &MemoryOperand,
    target: u32,
    memory: &Memory,
    len: usize,
) -> Result<u64, EngineFault> {
    if operand.mode == AddressingMode::Immediate {
        return Ok(u64::from(target));
    }
    let address = operand_address(operand, target, memory)?;
    read_be(memory, address, len)
}

/// Word-sized operand.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn load_word(
    operand: &MemoryOperand,
    target: u32,
    memory: &Memory,
) -> Result<Word, EngineFault> {
    load_operand(operand, target, memory, 3).map(|v| Word::new(v as u32))
}
