//! Mnemonic resolution derived from the core opcode table.

use sicxe_core::{InstructionFormat, Opcode};

/// Assembler directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// `START addr` - program name and load address.
    Start,
    /// `END [label]` - end of source and entry point.
    End,
    /// `BYTE C'..'|X'..'` - literal bytes.
    Byte,
    /// `WORD n` - one 24-bit word.
    Word,
    /// `RESB n` - reserve bytes.
    Resb,
    /// `RESW n` - reserve words.
    Resw,
    /// `BASE sym` - enable base-relative addressing.
    Base,
    /// `NOBASE` - disable base-relative addressing.
    NoBase,
    /// `EQU value` - define a symbol without emitting code.
    Equ,
}

const DIRECTIVES: &[(&str, DirectiveKind)] = &[
    ("START", DirectiveKind::Start),
    ("END", DirectiveKind::End),
    ("BYTE", DirectiveKind::Byte),
    ("WORD", DirectiveKind::Word),
    ("RESB", DirectiveKind::Resb),
    ("RESW", DirectiveKind::Resw),
    ("BASE", DirectiveKind::Base),
    ("NOBASE", DirectiveKind::NoBase),
    ("EQU", DirectiveKind::Equ),
];

/// Lookup result for a mnemonic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    /// A machine instruction; `extended` is set for a `+` prefix.
    Instruction {
        /// Resolved operation.
        opcode: Opcode,
        /// Format 4 was requested.
        extended: bool,
    },
    /// An assembler directive.
    Directive(DirectiveKind),
}

/// Resolves a mnemonic field, case-insensitively.
///
/// Returns `None` for unknown names and for a `+` prefix on anything other
/// than a format 3/4 instruction.
#[must_use]
pub fn resolve_mnemonic(text: &str) -> Option<Mnemonic> {
    if let Some(rest) = text.strip_prefix('+') {
        let opcode = Opcode::from_mnemonic(rest)?;
        return (opcode.format() == InstructionFormat::ThreeFour).then_some(Mnemonic::Instruction {
            opcode,
            extended: true,
        });
    }

    if let Some(opcode) = Opcode::from_mnemonic(text) {
        return Some(Mnemonic::Instruction {
            opcode,
            extended: false,
        });
    }

    DIRECTIVES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
        .map(|(_, kind)| Mnemonic::Directive(*kind))
}
