//! Symbol table and pass-1 address assignment.
//!
//! Pass 1 walks parsed lines, assigns each one its location counter value, and
//! records label definitions. Lines after `END` are not assembled.

use std::collections::BTreeMap;

use sicxe_core::object::MAX_OBJECT_ADDRESS;
use sicxe_core::SymbolTable;

use crate::parser::{Directive, ParsedLine, Statement, Value};

/// Error during symbol table construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolError {
    /// Kind of error.
    pub kind: SymbolErrorKind,
    /// Source line where the error occurred.
    pub line: usize,
}

/// Classification of symbol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolErrorKind {
    /// Label defined twice.
    DuplicateSymbol {
        /// The label name.
        name: String,
        /// Line of the first definition.
        first_definition: usize,
    },
    /// Location counter beyond the 20-bit object address space.
    AddressOverflow {
        /// The address that would result.
        address: u64,
    },
    /// `EQU` named a symbol that is not defined yet.
    UndefinedSymbol(String),
    /// `EQU` produced a negative or oversized address.
    InvalidEquValue(i64),
    /// `START` after code or data.
    MisplacedStart,
}

impl std::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for SymbolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSymbol {
                name,
                first_definition,
            } => write!(
                f,
                "duplicate symbol '{name}' (first defined at line {first_definition})"
            ),
            Self::AddressOverflow { address } => write!(
                f,
                "address overflow: 0x{address:X} exceeds 0x{MAX_OBJECT_ADDRESS:05X}"
            ),
            Self::UndefinedSymbol(name) => write!(f, "undefined symbol: {name}"),
            Self::InvalidEquValue(value) => write!(f, "EQU value out of range: {value}"),
            Self::MisplacedStart => write!(f, "START must precede all code and data"),
        }
    }
}

impl std::error::Error for SymbolError {}

/// A line with its assigned address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedLine {
    /// Location counter at the start of this line.
    pub address: u32,
    /// Bytes emitted or reserved by this line.
    pub size: u32,
    /// The parsed line content.
    pub parsed: ParsedLine,
    /// Original source line number.
    pub source_line: usize,
}

/// Result of pass-1 address assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Assembled lines with their addresses, in source order.
    pub lines: Vec<AddressedLine>,
    /// Label definitions.
    pub symbols: SymbolTable,
    /// Source line of each label definition.
    pub defined_at: BTreeMap<String, usize>,
    /// Load address from `START`.
    pub start_address: u32,
    /// One past the last emitted or reserved byte.
    pub end_address: u32,
    /// Label on the `START` line, if any.
    pub program_name: Option<String>,
    /// Operand of `END`, if any.
    pub entry: Option<Value>,
}

impl Assignment {
    fn define(&mut self, name: &str, address: u32, line: usize) -> Result<(), SymbolError> {
        self.symbols
            .define(name, address)
            .map_err(|duplicate| SymbolError {
                kind: SymbolErrorKind::DuplicateSymbol {
                    first_definition: self
                        .defined_at
                        .get(&duplicate.name)
                        .copied()
                        .unwrap_or_default(),
                    name: duplicate.name,
                },
                line,
            })?;
        self.defined_at.insert(name.to_string(), line);
        Ok(())
    }
}

/// Performs pass-1 address assignment on `(source_line, parsed)` pairs.
///
/// # Errors
///
/// Returns a `SymbolError` if a label is defined twice, the location counter
/// leaves the object address space, `START` follows code, or an `EQU` cannot
/// be evaluated.
pub fn assign_addresses(lines: &[(usize, ParsedLine)]) -> Result<Assignment, SymbolError> {
    let mut assignment = Assignment {
        lines: Vec::with_capacity(lines.len()),
        symbols: SymbolTable::new(),
        defined_at: BTreeMap::new(),
        start_address: 0,
        end_address: 0,
        program_name: None,
        entry: None,
    };
    let mut locctr: u32 = 0;
    let mut started = false;

    for (source_line, parsed) in lines {
        let line = *source_line;
        let err = |kind| SymbolError { kind, line };

        match &parsed.statement {
            Statement::Directive(Directive::Start(address)) => {
                if started {
                    return Err(err(SymbolErrorKind::MisplacedStart));
                }
                locctr = *address;
                assignment.start_address = *address;
                assignment.program_name.clone_from(&parsed.label);
            }
            Statement::Directive(Directive::Equ(value)) => {
                let address = evaluate_equ(value, locctr, &assignment.symbols).map_err(err)?;
                if let Some(label) = &parsed.label {
                    assignment.define(label, address, line)?;
                }
                assignment.lines.push(AddressedLine {
                    address: locctr,
                    size: 0,
                    parsed: parsed.clone(),
                    source_line: line,
                });
                continue;
            }
            _ => {}
        }

        if !matches!(
            parsed.statement,
            Statement::Blank | Statement::Directive(Directive::Start(_))
        ) {
            started = true;
        }
        if let Some(label) = &parsed.label {
            assignment.define(label, locctr, line)?;
        }

        let size = parsed.size();
        let next = locctr
            .checked_add(size)
            .filter(|next| *next <= MAX_OBJECT_ADDRESS + 1)
            .ok_or_else(|| {
                err(SymbolErrorKind::AddressOverflow {
                    address: u64::from(locctr) + u64::from(size),
                })
            })?;

        assignment.lines.push(AddressedLine {
            address: locctr,
            size,
            parsed: parsed.clone(),
            source_line: line,
        });
        locctr = next;

        if let Statement::Directive(Directive::End(entry)) = &parsed.statement {
            assignment.entry.clone_from(entry);
            break;
        }
    }

    assignment.end_address = locctr;
    Ok(assignment)
}

fn evaluate_equ(
    value: &Value,
    locctr: u32,
    symbols: &SymbolTable,
) -> Result<u32, SymbolErrorKind> {
    match value {
        Value::Here => Ok(locctr),
        Value::Symbol(name) => symbols
            .get(name)
            .ok_or_else(|| SymbolErrorKind::UndefinedSymbol(name.clone())),
        Value::Number(n) => u32::try_from(*n)
            .ok()
            .filter(|a| *a <= MAX_OBJECT_ADDRESS)
            .ok_or(SymbolErrorKind::InvalidEquValue(*n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn parse(source: &str) -> Vec<(usize, ParsedLine)> {
        source
            .lines()
            .enumerate()
            .map(|(i, text)| (i + 1, parse_line(text, i + 1).unwrap()))
            .collect()
    }

    #[test]
    fn start_sets_location_counter() {
        let lines = parse("COPY START 1000\nFIRST LDA ZERO\nZERO WORD 0\n END FIRST\n");
        let assignment = assign_addresses(&lines).unwrap();
        assert_eq!(assignment.start_address, 0x1000);
        assert_eq!(assignment.program_name.as_deref(), Some("COPY"));
        assert_eq!(assignment.symbols.get("FIRST"), Some(0x1000));
        assert_eq!(assignment.symbols.get("ZERO"), Some(0x1003));
        assert_eq!(assignment.end_address, 0x1006);
        assert_eq!(assignment.entry, Some(Value::Symbol("FIRST".into())));
    }

    #[test]
    fn forward_label_equals_sum_of_lengths() {
        let lines = parse(
            "\
 CLEAR X
 +LDT #4096
 FIX
 LDA DATA,X
BUF RESB 5
TAB RESW 2
STR BYTE C'AB'
DATA WORD 7
",
        );
        let assignment = assign_addresses(&lines).unwrap();
        assert_eq!(assignment.symbols.get("BUF"), Some(2 + 4 + 1 + 3));
        assert_eq!(assignment.symbols.get("TAB"), Some(10 + 5));
        assert_eq!(assignment.symbols.get("STR"), Some(15 + 6));
        assert_eq!(assignment.symbols.get("DATA"), Some(21 + 2));
        assert_eq!(assignment.end_address, 26);
    }

    #[test]
    fn duplicate_label_reports_both_lines() {
        let lines = parse("A WORD 1\nB WORD 2\nA WORD 3\n");
        let err = assign_addresses(&lines).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(
            err.kind,
            SymbolErrorKind::DuplicateSymbol {
                name: "A".into(),
                first_definition: 1
            }
        );
    }

    #[test]
    fn equ_defines_without_advancing() {
        let lines = parse("BUF RESB 3\nMAX EQU 4096\nHERE EQU *\nALIAS EQU BUF\nEND1 WORD 0\n");
        let assignment = assign_addresses(&lines).unwrap();
        assert_eq!(assignment.symbols.get("MAX"), Some(4096));
        assert_eq!(assignment.symbols.get("HERE"), Some(3));
        assert_eq!(assignment.symbols.get("ALIAS"), Some(0));
        assert_eq!(assignment.symbols.get("END1"), Some(3));
    }

    #[test]
    fn equ_forward_reference_is_rejected() {
        let lines = parse("A EQU LATER\nLATER WORD 0\n");
        let err = assign_addresses(&lines).unwrap_err();
        assert_eq!(err.kind, SymbolErrorKind::UndefinedSymbol("LATER".into()));
    }

    #[test]
    fn overflow_and_misplaced_start() {
        let lines = parse("P START FFFFF\n LDA 0\n");
        assert!(matches!(
            assign_addresses(&lines).unwrap_err().kind,
            SymbolErrorKind::AddressOverflow { .. }
        ));

        let lines = parse(" LDA 0\nP START 100\n");
        assert_eq!(
            assign_addresses(&lines).unwrap_err().kind,
            SymbolErrorKind::MisplacedStart
        );
    }

    #[test]
    fn lines_after_end_are_ignored() {
        let lines = parse(" WORD 1\n END\n WORD 2\n");
        let assignment = assign_addresses(&lines).unwrap();
        assert_eq!(assignment.end_address, 3);
        assert_eq!(assignment.lines.len(), 2);
    }

    #[test]
    fn symbol_table_is_sorted_and_tracks_lines() {
        let lines = parse("B WORD 1\nA WORD 2\n");
        let assignment = assign_addresses(&lines).unwrap();
        let names: Vec<_> = assignment.symbols.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(assignment.defined_at["A"], 2);
        assert_eq!(assignment.defined_at["B"], 1);
    }

    #[test]
    fn duplicate_equ_label_reports_first_line() {
        let lines = parse("MAX EQU 10\n WORD 0\nMAX EQU 20\n");
        let err = assign_addresses(&lines).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(
            err.kind,
            SymbolErrorKind::DuplicateSymbol {
                name: "MAX".into(),
                first_definition: 1
            }
        );
        assert_eq!(
            err.to_string(),
            "duplicate symbol 'MAX' (first defined at line 1)"
        );
    }
}
