//! Two-pass SIC/XE assembler library.

// Only the `sicxe` binary installs a logger.
use simple_logger as _;

/// Top-level two-pass assembler pipeline.
pub mod assembler;
/// Instruction and directive encoding.
pub mod encoder;
/// Structured parse/assembly error types.
pub mod errors;
/// Mnemonic and directive resolution against the opcode table.
pub mod mnemonic;
/// Assembly parser for instructions, labels, and directives.
pub mod parser;
/// Symbol table and pass-1 address assignment.
pub mod symbols;
