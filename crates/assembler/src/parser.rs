//! Assembly source line parser for labels, instructions, and directives.
//!
//! A line is `[label] mnemonic [operand] [comment]`. A line that starts with
//! whitespace has no label; a line whose first non-blank character is `.` is a
//! comment. Operands are a single whitespace-free field, except that quoted
//! `C'..'` literals may contain spaces.

use sicxe_core::{AddressingMode, InstructionFormat, Opcode, Register};

use crate::mnemonic::{resolve_mnemonic, DirectiveKind, Mnemonic};

/// Highest address a `START` directive may name.
const MAX_START_ADDRESS: u32 = sicxe_core::object::MAX_OBJECT_ADDRESS;

/// A numeric value, symbol reference, or the current location counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Decimal constant.
    Number(i64),
    /// Label reference, resolved against the symbol table.
    Symbol(String),
    /// `*`, the location counter of the current line.
    Here,
}

/// A format 3/4 operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRef {
    /// Simple, immediate (`#`), or indirect (`@`).
    pub mode: AddressingMode,
    /// Target value.
    pub value: Value,
    /// `,X` suffix.
    pub indexed: bool,
}

/// Parsed operand forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand (format 1, `RSUB`).
    None,
    /// Format 2 register nibbles, already shaped for the opcode.
    Registers {
        /// High nibble.
        r1: u8,
        /// Low nibble.
        r2: u8,
    },
    /// Format 3/4 memory operand.
    Memory(MemoryRef),
}

/// A parsed machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// Resolved operation.
    pub opcode: Opcode,
    /// Format 4 (`+`) was requested.
    pub extended: bool,
    /// Operand.
    pub operand: Operand,
}

impl ParsedInstruction {
    /// Encoded length in bytes.
    #[must_use]
    pub const fn size(&self) -> u32 {
        match self.opcode.format() {
            InstructionFormat::One => 1,
            InstructionFormat::Two => 2,
            InstructionFormat::ThreeFour if self.extended => 4,
            InstructionFormat::ThreeFour => 3,
        }
    }
}

/// A parsed assembler directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `START addr` (hexadecimal).
    Start(u32),
    /// `END [entry]`.
    End(Option<Value>),
    /// `BYTE` literal bytes.
    Byte(Vec<u8>),
    /// `WORD n`.
    Word(i64),
    /// `RESB n`.
    Resb(u32),
    /// `RESW n`.
    Resw(u32),
    /// `BASE value`.
    Base(Value),
    /// `NOBASE`.
    NoBase,
    /// `EQU value`.
    Equ(Value),
}

impl Directive {
    /// Bytes emitted or reserved by the directive.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn size(&self) -> u32 {
        match self {
            Self::Byte(bytes) => bytes.len() as u32,
            Self::Word(_) => 3,
            Self::Resb(count) => *count,
            Self::Resw(count) => count.saturating_mul(3),
            Self::Start(_) | Self::End(_) | Self::Base(_) | Self::NoBase | Self::Equ(_) => 0,
        }
    }
}

/// The statement part of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Empty or comment-only line.
    Blank,
    /// Machine instruction.
    Instruction(ParsedInstruction),
    /// Assembler directive.
    Directive(Directive),
}

/// A single parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Label defined by this line.
    pub label: Option<String>,
    /// Statement.
    pub statement: Statement,
}

impl ParsedLine {
    /// Bytes this line occupies in the program image.
    #[must_use]
    pub fn size(&self) -> u32 {
        match &self.statement {
            Statement::Blank => 0,
            Statement::Instruction(instr) => instr.size(),
            Statement::Directive(directive) => directive.size(),
        }
    }
}

/// Parse error with source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-indexed line number.
    pub line: usize,
    /// Kind of parse error.
    pub kind: ParseErrorKind,
}

/// Classification of parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unknown mnemonic or directive.
    UnknownMnemonic(String),
    /// Label is not an identifier.
    InvalidLabel(String),
    /// Operand does not fit the instruction.
    InvalidOperand(String),
    /// Register name not recognized.
    InvalidRegister(String),
    /// Directive operand out of range or malformed.
    InvalidDirectiveValue(String),
    /// A label was written without a mnemonic.
    MissingMnemonic,
    /// `EQU` without a label.
    MissingLabel,
    /// Required operand missing.
    MissingOperand,
    /// Quoted literal missing its closing quote.
    UnterminatedLiteral,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMnemonic(m) => write!(f, "unknown mnemonic: {m}"),
            Self::InvalidLabel(l) => write!(f, "invalid label: {l}"),
            Self::InvalidOperand(o) => write!(f, "invalid operand: {o}"),
            Self::InvalidRegister(r) => write!(f, "invalid register: {r}"),
            Self::InvalidDirectiveValue(v) => write!(f, "invalid directive value: {v}"),
            Self::MissingMnemonic => write!(f, "label without mnemonic"),
            Self::MissingLabel => write!(f, "EQU requires a label"),
            Self::MissingOperand => write!(f, "missing operand"),
            Self::UnterminatedLiteral => write!(f, "unterminated literal"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing a single line.
pub type ParseResult = Result<ParsedLine, ParseError>;

/// Parses one source line.
///
/// # Errors
///
/// Returns a `ParseError` for unknown mnemonics, malformed operands, or
/// directive values out of range.
pub fn parse_line(text: &str, line: usize) -> ParseResult {
    let err = |kind| ParseError { line, kind };

    let trimmed = text.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        return Ok(ParsedLine {
            label: None,
            statement: Statement::Blank,
        });
    }

    let has_label = !text.starts_with(char::is_whitespace);
    let (first, rest) = next_field(trimmed).map_err(err)?;
    let (label, mnemonic, rest) = if has_label {
        let (mnemonic, rest) = next_field(rest).map_err(err)?;
        (Some(first), mnemonic, rest)
    } else {
        (None, first, rest)
    };

    if let Some(label) = label {
        if !is_identifier(label) {
            return Err(err(ParseErrorKind::InvalidLabel(label.to_string())));
        }
    }
    if mnemonic.is_empty() {
        return Err(err(ParseErrorKind::MissingMnemonic));
    }

    let resolved = resolve_mnemonic(mnemonic)
        .ok_or_else(|| err(ParseErrorKind::UnknownMnemonic(mnemonic.to_string())))?;

    let statement = match resolved {
        Mnemonic::Instruction { opcode, extended } => {
            let operand = if takes_operand(opcode) {
                let (field, _) = next_field(rest).map_err(err)?;
                parse_instruction_operand(opcode, field).map_err(err)?
            } else {
                Operand::None
            };
            Statement::Instruction(ParsedInstruction {
                opcode,
                extended,
                operand,
            })
        }
        Mnemonic::Directive(kind) => {
            let field = if kind == DirectiveKind::NoBase {
                ""
            } else {
                next_field(rest).map_err(err)?.0
            };
            if kind == DirectiveKind::Equ && label.is_none() {
                return Err(err(ParseErrorKind::MissingLabel));
            }
            Statement::Directive(parse_directive(kind, field).map_err(err)?)
        }
    };

    Ok(ParsedLine {
        label: label.map(str::to_string),
        statement,
    })
}

/// Splits off the next field. Quotes group characters, including spaces.
fn next_field(text: &str) -> Result<(&str, &str), ParseErrorKind> {
    let text = text.trim_start();
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            in_quote = !in_quote;
        } else if c.is_whitespace() && !in_quote {
            return Ok((&text[..i], &text[i..]));
        }
    }
    if in_quote {
        return Err(ParseErrorKind::UnterminatedLiteral);
    }
    Ok((text, ""))
}

const fn takes_operand(opcode: Opcode) -> bool {
    !matches!(opcode.format(), InstructionFormat::One) && !matches!(opcode, Opcode::Rsub)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_instruction_operand(opcode: Opcode, field: &str) -> Result<Operand, ParseErrorKind> {
    if field.is_empty() {
        return Err(ParseErrorKind::MissingOperand);
    }
    match opcode.format() {
        InstructionFormat::Two => parse_register_operand(opcode, field),
        _ => parse_memory_operand(field).map(Operand::Memory),
    }
}

fn register_number(text: &str) -> Result<u8, ParseErrorKind> {
    text.parse::<Register>()
        .map(Register::number)
        .map_err(|_| ParseErrorKind::InvalidRegister(text.to_string()))
}

fn small_number(text: &str, min: u8, max: u8) -> Result<u8, ParseErrorKind> {
    text.parse::<u8>()
        .ok()
        .filter(|n| (min..=max).contains(n))
        .ok_or_else(|| ParseErrorKind::InvalidOperand(text.to_string()))
}

fn parse_register_operand(opcode: Opcode, field: &str) -> Result<Operand, ParseErrorKind> {
    let (first, second) = match field.split_once(',') {
        Some((a, b)) => (a.trim(), Some(b.trim())),
        None => (field, None),
    };

    let (r1, r2) = match (opcode, second) {
        (Opcode::Clear | Opcode::Tixr, None) => (register_number(first)?, 0),
        (Opcode::Svc, None) => (small_number(first, 0, 15)?, 0),
        (Opcode::Shiftl | Opcode::Shiftr, Some(count)) => {
            (register_number(first)?, small_number(count, 1, 16)? - 1)
        }
        (
            Opcode::Addr
            | Opcode::Compr
            | Opcode::Divr
            | Opcode::Mulr
            | Opcode::Rmo
            | Opcode::Subr,
            Some(second),
        ) => (register_number(first)?, register_number(second)?),
        _ => return Err(ParseErrorKind::InvalidOperand(field.to_string())),
    };
    Ok(Operand::Registers { r1, r2 })
}

fn parse_memory_operand(field: &str) -> Result<MemoryRef, ParseErrorKind> {
    let (mode, body) = if let Some(rest) = field.strip_prefix('#') {
        (AddressingMode::Immediate, rest)
    } else if let Some(rest) = field.strip_prefix('@') {
        (AddressingMode::Indirect, rest)
    } else {
        (AddressingMode::Simple, field)
    };

    let (body, indexed) = match body.rsplit_once(',') {
        Some((target, index)) if index.eq_ignore_ascii_case("X") => (target, true),
        Some(_) => return Err(ParseErrorKind::InvalidOperand(field.to_string())),
        None => (body, false),
    };
    if indexed && mode != AddressingMode::Simple {
        return Err(ParseErrorKind::InvalidOperand(field.to_string()));
    }

    let value = parse_value(body).ok_or_else(|| ParseErrorKind::InvalidOperand(field.to_string()))?;
    Ok(MemoryRef {
        mode,
        value,
        indexed,
    })
}

fn parse_value(text: &str) -> Option<Value> {
    if text == "*" {
        return Some(Value::Here);
    }
    if is_identifier(text) {
        return Some(Value::Symbol(text.to_string()));
    }
    text.parse::<i64>().ok().map(Value::Number)
}

fn parse_directive(kind: DirectiveKind, field: &str) -> Result<Directive, ParseErrorKind> {
    let invalid = || ParseErrorKind::InvalidDirectiveValue(field.to_string());

    match kind {
        DirectiveKind::Start => {
            if field.is_empty() {
                return Ok(Directive::Start(0));
            }
            u32::from_str_radix(field, 16)
                .ok()
                .filter(|address| *address <= MAX_START_ADDRESS)
                .map(Directive::Start)
                .ok_or_else(invalid)
        }
        DirectiveKind::End => {
            if field.is_empty() {
                return Ok(Directive::End(None));
            }
            parse_value(field)
                .map(|value| Directive::End(Some(value)))
                .ok_or_else(invalid)
        }
        DirectiveKind::Byte => parse_byte_literal(required(field)?)
            .map(Directive::Byte)
            .ok_or_else(invalid),
        DirectiveKind::Word => required(field)?
            .parse::<i64>()
            .ok()
            .filter(|n| (-(1 << 23)..(1 << 24)).contains(n))
            .map(Directive::Word)
            .ok_or_else(invalid),
        DirectiveKind::Resb | DirectiveKind::Resw => {
            let count = required(field)?.parse::<u32>().map_err(|_| invalid())?;
            Ok(if kind == DirectiveKind::Resb {
                Directive::Resb(count)
            } else {
                Directive::Resw(count)
            })
        }
        DirectiveKind::Base => parse_value(required(field)?)
            .map(Directive::Base)
            .ok_or_else(invalid),
        DirectiveKind::NoBase => Ok(Directive::NoBase),
        DirectiveKind::Equ => parse_value(required(field)?)
            .map(Directive::Equ)
            .ok_or_else(invalid),
    }
}

fn required(field: &str) -> Result<&str, ParseErrorKind> {
    if field.is_empty() {
        Err(ParseErrorKind::MissingOperand)
    } else {
        Ok(field)
    }
}

fn parse_byte_literal(field: &str) -> Option<Vec<u8>> {
    let quoted = |prefix: char| {
        let rest = field
            .strip_prefix(prefix)
            .or_else(|| field.strip_prefix(prefix.to_ascii_lowercase()))?;
        rest.strip_prefix('\'')?.strip_suffix('\'')
    };

    if let Some(text) = quoted('C') {
        return (!text.is_empty() && text.is_ascii()).then(|| text.as_bytes().to_vec());
    }
    if let Some(hex) = quoted('X') {
        let digits = hex.bytes().all(|b| b.is_ascii_hexdigit());
        if hex.is_empty() || hex.len() % 2 != 0 || !digits {
            return None;
        }
        return hex
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                let pair = std::str::from_utf8(pair).ok()?;
                u8::from_str_radix(pair, 16).ok()
            })
            .collect();
    }
    field.parse::<u8>().ok().map(|b| vec![b])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(text: &str) -> Statement {
        parse_line(text, 1).unwrap().statement
    }

    fn error(text: &str) -> ParseErrorKind {
        parse_line(text, 7).unwrap_err().kind
    }

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(statement(""), Statement::Blank);
        assert_eq!(statement("   "), Statement::Blank);
        assert_eq!(statement(". full line comment"), Statement::Blank);
        assert_eq!(statement("    . indented comment"), Statement::Blank);
    }

    #[test]
    fn label_mnemonic_operand_comment() {
        let line = parse_line("LOOP    LDA     BUFFER,X   load next", 3).unwrap();
        assert_eq!(line.label.as_deref(), Some("LOOP"));
        assert_eq!(
            line.statement,
            Statement::Instruction(ParsedInstruction {
                opcode: Opcode::Lda,
                extended: false,
                operand: Operand::Memory(MemoryRef {
                    mode: AddressingMode::Simple,
                    value: Value::Symbol("BUFFER".into()),
                    indexed: true,
                }),
            })
        );
    }

    #[test]
    fn addressing_prefixes_and_extension() {
        let Statement::Instruction(instr) = statement("   +lda  #4096") else {
            panic!("expected instruction");
        };
        assert!(instr.extended);
        assert_eq!(instr.size(), 4);
        assert_eq!(
            instr.operand,
            Operand::Memory(MemoryRef {
                mode: AddressingMode::Immediate,
                value: Value::Number(4096),
                indexed: false,
            })
        );

        let Statement::Instruction(instr) = statement("   J  @RETADR") else {
            panic!("expected instruction");
        };
        assert!(matches!(
            instr.operand,
            Operand::Memory(MemoryRef {
                mode: AddressingMode::Indirect,
                ..
            })
        ));

        let Statement::Instruction(instr) = statement("HERE J *") else {
            panic!("expected instruction");
        };
        assert!(matches!(
            instr.operand,
            Operand::Memory(MemoryRef {
                value: Value::Here,
                ..
            })
        ));
    }

    #[test]
    fn format2_operand_shapes() {
        let regs = |text: &str| match statement(text) {
            Statement::Instruction(ParsedInstruction {
                operand: Operand::Registers { r1, r2 },
                ..
            }) => (r1, r2),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(regs("  COMPR A,S"), (0, 4));
        assert_eq!(regs("  clear x"), (1, 0));
        assert_eq!(regs("  TIXR T"), (5, 0));
        assert_eq!(regs("  SHIFTL T,16"), (5, 15));
        assert_eq!(regs("  SVC 9"), (9, 0));
        assert_eq!(regs("  RMO A,PC"), (0, 8));
    }

    #[test]
    fn operandless_instructions_ignore_trailing_text() {
        let Statement::Instruction(instr) = statement("  RSUB  return to caller") else {
            panic!("expected instruction");
        };
        assert_eq!(instr.operand, Operand::None);
        assert_eq!(statement("  FIX"), statement("  FIX  convert"));
    }

    #[test]
    fn directives() {
        assert_eq!(statement("COPY START 1000"), Statement::Directive(Directive::Start(0x1000)));
        assert_eq!(
            statement("EOF BYTE C'E O'"),
            Statement::Directive(Directive::Byte(b"E O".to_vec()))
        );
        assert_eq!(
            statement("IN BYTE x'f1'"),
            Statement::Directive(Directive::Byte(vec![0xF1]))
        );
        assert_eq!(statement("N WORD -1"), Statement::Directive(Directive::Word(-1)));
        assert_eq!(statement("BUF RESW 10"), Statement::Directive(Directive::Resw(10)));
        assert_eq!(
            statement("  END FIRST"),
            Statement::Directive(Directive::End(Some(Value::Symbol("FIRST".into()))))
        );
        assert_eq!(statement("  NOBASE"), Statement::Directive(Directive::NoBase));
        assert_eq!(
            statement("MAX EQU 4096"),
            Statement::Directive(Directive::Equ(Value::Number(4096)))
        );
    }

    #[test]
    fn directive_sizes() {
        assert_eq!(Directive::Byte(vec![1, 2]).size(), 2);
        assert_eq!(Directive::Word(5).size(), 3);
        assert_eq!(Directive::Resb(7).size(), 7);
        assert_eq!(Directive::Resw(4).size(), 12);
        assert_eq!(Directive::Equ(Value::Here).size(), 0);
    }

    #[test]
    fn errors_carry_line_and_kind() {
        let err = parse_line("  MOVE A", 7).unwrap_err();
        assert_eq!(err.line, 7);
        assert_eq!(err.kind, ParseErrorKind::UnknownMnemonic("MOVE".into()));

        assert_eq!(error("  ADDR A,Q"), ParseErrorKind::InvalidRegister("Q".into()));
        assert_eq!(error("  LDA"), ParseErrorKind::MissingOperand);
        assert_eq!(error("  LDA #5,X"), ParseErrorKind::InvalidOperand("#5,X".into()));
        assert_eq!(error("  SHIFTL A,17"), ParseErrorKind::InvalidOperand("17".into()));
        assert_eq!(error("  EQU 5"), ParseErrorKind::MissingLabel);
        assert_eq!(error("A BYTE C'AB"), ParseErrorKind::UnterminatedLiteral);
        assert_eq!(
            error("B BYTE X'F'"),
            ParseErrorKind::InvalidDirectiveValue("X'F'".into())
        );
        assert_eq!(
            error("B BYTE X'+F'"),
            ParseErrorKind::InvalidDirectiveValue("X'+F'".into())
        );
        assert_eq!(
            error("C WORD 16777216"),
            ParseErrorKind::InvalidDirectiveValue("16777216".into())
        );
        assert_eq!(error("1ST LDA 0"), ParseErrorKind::InvalidLabel("1ST".into()));
        assert_eq!(error("ALONE"), ParseErrorKind::MissingMnemonic);
    }

    #[test]
    fn non_ascii_literals_are_rejected() {
        let err = parse_line("A BYTE X'a\u{e9}1'", 1).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(
            err.kind,
            ParseErrorKind::InvalidDirectiveValue("X'a\u{e9}1'".into())
        );
        assert!(matches!(
            error("B BYTE C'\u{e9}t\u{e9}'"),
            ParseErrorKind::InvalidDirectiveValue(_)
        ));
    }
}
