//! Instruction and directive encoding (Pass 2).
//!
//! Instructions are built as core [`DecodedInstruction`] values and encoded by
//! the core, so the assembler and the decoder share one bit layout.

use sicxe_core::{
    AddressingMode, DecodedInstruction, MemoryOperand, Opcode, Operands, Relative, SymbolTable,
    WORD_MASK,
};

use crate::parser::{Directive, MemoryRef, Operand, ParsedInstruction, Statement, Value};
use crate::symbols::AddressedLine;

/// Largest unsigned displacement of a format 3 instruction.
const MAX_DIRECT: i64 = 0xFFF;
/// Signed PC-relative displacement range of a format 3 instruction.
const PC_RANGE: std::ops::RangeInclusive<i64> = -2048..=2047;
/// Largest address of a format 4 instruction.
const MAX_EXTENDED: i64 = 0xF_FFFF;

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    /// Kind of error.
    pub kind: EncodeErrorKind,
    /// Source line where the error occurred.
    pub line: usize,
}

/// Classification of encoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// Symbol referenced but never defined.
    UndefinedSymbol(String),
    /// Target not reachable by any format 3 displacement.
    DisplacementOutOfRange(i64),
    /// Format 4 address outside 20 bits.
    AddressOutOfRange(i64),
    /// `END` names an address outside the assembled program.
    EntryOutsideProgram(i64),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndefinedSymbol(name) => write!(f, "undefined symbol: {name}"),
            Self::DisplacementOutOfRange(target) => write!(
                f,
                "displacement out of range: target {target} is not reachable PC- or base-relative"
            ),
            Self::AddressOutOfRange(target) => {
                write!(f, "address out of range for format 4: {target}")
            }
            Self::EntryOutsideProgram(target) => {
                write!(f, "entry point {target:#X} lies outside the program")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Pass-2 state threaded through the lines of one assembly.
#[derive(Debug, Clone)]
pub struct EncodeContext<'a> {
    symbols: &'a SymbolTable,
    base: Option<i64>,
}

impl<'a> EncodeContext<'a> {
    /// Creates a context with base-relative addressing disabled.
    #[must_use]
    pub const fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            base: None,
        }
    }

    /// Value assumed for `B` by base-relative operands.
    #[must_use]
    pub const fn base(&self) -> Option<i64> {
        self.base
    }

    /// Resolves `value` as seen from a line at `locctr`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeErrorKind::UndefinedSymbol`] for an unknown label.
    pub fn resolve(&self, value: &Value, locctr: u32) -> Result<i64, EncodeErrorKind> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Here => Ok(i64::from(locctr)),
            Value::Symbol(name) => self
                .symbols
                .get(name)
                .map(i64::from)
                .ok_or_else(|| EncodeErrorKind::UndefinedSymbol(name.clone())),
        }
    }
}

/// Encodes one addressed line, updating `BASE` state in `ctx`.
///
/// Reserved space (`RESB`/`RESW`) encodes as zero bytes; directives that emit
/// nothing return an empty vector.
///
/// # Errors
///
/// Returns `EncodeError` for undefined symbols and unreachable targets.
pub fn encode_line(
    line: &AddressedLine,
    ctx: &mut EncodeContext<'_>,
) -> Result<Vec<u8>, EncodeError> {
    let err = |kind| EncodeError {
        kind,
        line: line.source_line,
    };

    match &line.parsed.statement {
        Statement::Blank => Ok(Vec::new()),
        Statement::Instruction(instr) => encode_instruction(instr, ctx, line.address).map_err(err),
        Statement::Directive(directive) => match directive {
            Directive::Byte(bytes) => Ok(bytes.clone()),
            Directive::Word(value) => Ok(encode_word(*value).to_vec()),
            Directive::Resb(_) | Directive::Resw(_) => Ok(vec![0; line.size as usize]),
            Directive::Base(value) => {
                ctx.base = Some(ctx.resolve(value, line.address).map_err(err)?);
                Ok(Vec::new())
            }
            Directive::NoBase => {
                ctx.base = None;
                Ok(Vec::new())
            }
            Directive::Start(_) | Directive::End(_) | Directive::Equ(_) => Ok(Vec::new()),
        },
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_word(value: i64) -> [u8; 3] {
    let word = (value as u32) & WORD_MASK;
    [(word >> 16) as u8, (word >> 8) as u8, word as u8]
}

/// Encodes a single instruction located at `locctr`.
///
/// # Errors
///
/// Returns [`EncodeErrorKind`] for undefined symbols and unreachable targets.
pub fn encode_instruction(
    instr: &ParsedInstruction,
    ctx: &EncodeContext<'_>,
    locctr: u32,
) -> Result<Vec<u8>, EncodeErrorKind> {
    let operands = match &instr.operand {
        Operand::Registers { r1, r2 } => Operands::Registers { r1: *r1, r2: *r2 },
        Operand::None if instr.opcode == Opcode::Rsub => Operands::Memory(MemoryOperand {
            mode: AddressingMode::Simple,
            indexed: false,
            relative: Relative::Direct,
            extended: instr.extended,
            field: 0,
        }),
        Operand::None => Operands::None,
        Operand::Memory(mem) => Operands::Memory(memory_operand(
            mem,
            instr.extended,
            ctx,
            locctr + instr.size(),
            locctr,
        )?),
    };

    Ok(DecodedInstruction {
        opcode: instr.opcode,
        operands,
    }
    .encode())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn memory_operand(
    mem: &MemoryRef,
    extended: bool,
    ctx: &EncodeContext<'_>,
    next_pc: u32,
    locctr: u32,
) -> Result<MemoryOperand, EncodeErrorKind> {
    let target = ctx.resolve(&mem.value, locctr)?;
    let operand = |relative, field: i64| MemoryOperand {
        mode: mem.mode,
        indexed: mem.indexed,
        relative,
        extended,
        field: field as u32,
    };

    if extended {
        if !(0..=MAX_EXTENDED).contains(&target) {
            return Err(EncodeErrorKind::AddressOutOfRange(target));
        }
        return Ok(operand(Relative::Direct, target));
    }

    let is_constant = matches!(mem.value, Value::Number(_));
    if is_constant && (0..=MAX_DIRECT).contains(&target) {
        return Ok(operand(Relative::Direct, target));
    }

    let pc_disp = target - i64::from(next_pc);
    if PC_RANGE.contains(&pc_disp) {
        return Ok(operand(Relative::Pc, pc_disp & 0xFFF));
    }

    if let Some(base) = ctx.base {
        let base_disp = target - base;
        if (0..=MAX_DIRECT).contains(&base_disp) {
            return Ok(operand(Relative::Base, base_disp));
        }
    }

    Err(EncodeErrorKind::DisplacementOutOfRange(target))
}
