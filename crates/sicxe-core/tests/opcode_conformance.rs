//! Opcode table and decoder conformance against the published SIC/XE codes.

use log as _;
use proptest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;

use proptest::prelude::*;
use rstest::rstest;
use sicxe_core::{
    decode, AddressingMode, DecodedInstruction, EngineFault, InstructionFormat, MemoryOperand,
    Opcode, Operands, Relative, OPCODE_TABLE,
};

#[rstest]
#[case("ADD", 0x18, InstructionFormat::ThreeFour)]
#[case("ADDR", 0x90, InstructionFormat::Two)]
#[case("CLEAR", 0xB4, InstructionFormat::Two)]
#[case("COMP", 0x28, InstructionFormat::ThreeFour)]
#[case("DIVF", 0x64, InstructionFormat::ThreeFour)]
#[case("FIX", 0xC4, InstructionFormat::One)]
#[case("HIO", 0xF4, InstructionFormat::One)]
#[case("J", 0x3C, InstructionFormat::ThreeFour)]
#[case("JSUB", 0x48, InstructionFormat::ThreeFour)]
#[case("LDA", 0x00, InstructionFormat::ThreeFour)]
#[case("LDCH", 0x50, InstructionFormat::ThreeFour)]
#[case("LPS", 0xD0, InstructionFormat::ThreeFour)]
#[case("RMO", 0xAC, InstructionFormat::Two)]
#[case("RSUB", 0x4C, InstructionFormat::ThreeFour)]
#[case("SHIFTR", 0xA8, InstructionFormat::Two)]
#[case("STA", 0x0C, InstructionFormat::ThreeFour)]
#[case("STSW", 0xE8, InstructionFormat::ThreeFour)]
#[case("SVC", 0xB0, InstructionFormat::Two)]
#[case("TIXR", 0xB8, InstructionFormat::Two)]
#[case("WD", 0xDC, InstructionFormat::ThreeFour)]
fn mnemonic_codes_match_reference(
    #[case] mnemonic: &str,
    #[case] code: u8,
    #[case] format: InstructionFormat,
) {
    let opcode = Opcode::from_mnemonic(mnemonic).unwrap();
    assert_eq!(opcode.code(), code);
    assert_eq!(opcode.format(), format);
    assert_eq!(opcode.mnemonic(), mnemonic);
    assert_eq!(Opcode::from_mnemonic(&mnemonic.to_lowercase()), Some(opcode));
}

#[test]
fn table_codes_are_unique() {
    let mut codes: Vec<u8> = OPCODE_TABLE.iter().map(|(_, _, code, _)| *code).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), OPCODE_TABLE.len());
}

#[rstest]
#[case([0x03, 0x00, 0x1E, 0], AddressingMode::Simple, Relative::Direct, 3)]
#[case([0x01, 0x20, 0x05, 0], AddressingMode::Immediate, Relative::Pc, 3)]
#[case([0x02, 0x40, 0x10, 0], AddressingMode::Indirect, Relative::Base, 3)]
#[case([0x03, 0x10, 0x00, 0x5A], AddressingMode::Simple, Relative::Direct, 4)]
#[case([0x00, 0x7F, 0xFF, 0], AddressingMode::Sic, Relative::Direct, 3)]
fn addressing_flags_decode(
    #[case] bytes: [u8; 4],
    #[case] mode: AddressingMode,
    #[case] relative: Relative,
    #[case] length: u8,
) {
    let instr = decode(bytes).unwrap();
    assert_eq!(instr.opcode, Opcode::Lda);
    assert_eq!(instr.length(), length);
    let Operands::Memory(operand) = instr.operands else {
        panic!("expected memory operand, got {:?}", instr.operands);
    };
    assert_eq!(operand.mode, mode);
    assert_eq!(operand.relative, relative);
}

#[rstest]
#[case::base_and_pc([0x03, 0x60, 0x00, 0])]
#[case::extended_pc([0x03, 0x30, 0x00, 0])]
#[case::extended_base([0x03, 0x50, 0x00, 0])]
#[case::indexed_immediate([0x01, 0x80, 0x00, 0])]
fn invalid_flag_combinations_fault(#[case] bytes: [u8; 4]) {
    assert_eq!(decode(bytes), Err(EngineFault::IllegalAddressing));
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in any::<[u8; 4]>()) {
        let _ = decode(bytes);
    }

    #[test]
    fn simple_format3_reencodes(disp in 0u32..0x1000, indexed in any::<bool>()) {
        let instr = DecodedInstruction {
            opcode: Opcode::Lda,
            operands: Operands::Memory(MemoryOperand {
                mode: AddressingMode::Simple,
                indexed,
                relative: Relative::Direct,
                extended: false,
                field: disp,
            }),
        };
        let bytes = instr.encode();
        prop_assert_eq!(bytes.len(), 3);
        prop_assert_eq!(decode([bytes[0], bytes[1], bytes[2], 0]), Ok(instr));
    }
}
