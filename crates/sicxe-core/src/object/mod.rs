//! Assembled object programs.

/// Line-oriented `H`/`D`/`T`/`E` object-program text format.
pub mod format;

pub use format::{ObjectFormatError, TEXT_RECORD_MAX_BYTES};

use std::fmt;

use crate::symbols::SymbolTable;

/// Highest byte address representable in an object program (20-bit space).
pub const MAX_OBJECT_ADDRESS: u32 = 0xF_FFFF;

/// Immutable output of one successful assembly.
///
/// The program length is always derived from the byte sequence. Re-assembly
/// produces a new value; nothing mutates an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ObjectFile {
    start_address: u32,
    entry_point: u32,
    object_code: Vec<u8>,
    symbol_table: SymbolTable,
    file_name: String,
}

impl ObjectFile {
    /// Builds an object file whose entry point is its start address.
    ///
    /// Characters of `file_name` that are not printable ASCII become `_`, so
    /// every name survives the object-program header record.
    #[must_use]
    pub fn new(
        start_address: u32,
        object_code: Vec<u8>,
        symbol_table: SymbolTable,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            start_address,
            entry_point: start_address,
            object_code,
            symbol_table,
            file_name: header_name(file_name.into()),
        }
    }

    /// Returns a copy with a different first executable address.
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: u32) -> Self {
        self.entry_point = entry_point;
        self
    }

    /// Byte address the program is loaded at.
    #[must_use]
    pub const fn start_address(&self) -> u32 {
        self.start_address
    }

    /// Byte address execution begins at.
    #[must_use]
    pub const fn entry_point(&self) -> u32 {
        self.entry_point
    }

    /// Encoded program bytes.
    #[must_use]
    pub fn object_code(&self) -> &[u8] {
        &self.object_code
    }

    /// Symbols resolved while assembling.
    #[must_use]
    pub const fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    /// Display name, also written as the program name in the header record.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Program length in bytes.
    #[must_use]
    pub fn program_length(&self) -> usize {
        self.object_code.len()
    }

    /// One past the last byte address occupied by the program.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn end_address(&self) -> u32 {
        self.start_address + self.object_code.len() as u32
    }
}

fn header_name(name: String) -> String {
    if name.chars().all(|c| c.is_ascii_graphic()) {
        return name;
    }
    name.chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '_' })
        .collect()
}

impl fmt::Display for ObjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Start address: {:04X}", self.start_address)?;
        writeln!(f, "Program length: {} bytes", self.program_length())?;
        write!(f, "Object code:")?;
        for byte in &self.object_code {
            write!(f, " {byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ObjectFile;
    use crate::symbols::SymbolTable;

    #[test]
    fn length_is_derived_from_bytes() {
        let object = ObjectFile::new(0x30, vec![1, 2, 3, 4], SymbolTable::new(), "PROG");
        assert_eq!(object.program_length(), 4);
        assert_eq!(object.end_address(), 0x34);
        assert_eq!(object.entry_point(), 0x30);
    }

    #[test]
    fn names_are_restricted_to_printable_ascii() {
        let object = ObjectFile::new(0, vec![1], SymbolTable::new(), "açúcar");
        assert_eq!(object.file_name(), "a__car");
        let object = ObjectFile::new(0, vec![1], SymbolTable::new(), "my prog ");
        assert_eq!(object.file_name(), "my_prog_");
        let object = ObjectFile::new(0, vec![1], SymbolTable::new(), "COPY");
        assert_eq!(object.file_name(), "COPY");
    }

    #[test]
    fn display_renders_hex_dump() {
        let object = ObjectFile::new(0x1000, vec![0x00, 0x1A, 0xFF], SymbolTable::new(), "P");
        assert_eq!(
            object.to_string(),
            "Start address: 1000\nProgram length: 3 bytes\nObject code: 00 1A FF"
        );
    }
}
