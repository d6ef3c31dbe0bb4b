//! Object-program text format.
//!
//! ```text
//! HCOPY  001000000009      header: name, start, length
//! DLOOP  001003            one per symbol, sorted by label
//! T0010000903000C1B000F0C000C   text: address, byte count, bytes
//! E001000                  end: first executable address
//! ```
//!
//! All numbers are upper-case hex. Text records carry at most 30 bytes and
//! chunks consisting only of zero bytes are omitted; the reader restores them
//! from the header length.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{ObjectFile, MAX_OBJECT_ADDRESS};
use crate::symbols::SymbolTable;

/// Maximum number of object bytes per text record.
pub const TEXT_RECORD_MAX_BYTES: usize = 0x1E;

const NAME_WIDTH: usize = 6;
const ADDRESS_WIDTH: usize = 6;

/// Failure to read or write an object program.
#[derive(Debug, Error)]
pub enum ObjectFormatError {
    /// A record could not be parsed or is inconsistent with the header.
    #[error("line {line}: {message}")]
    ParseFailure {
        /// 1-indexed line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// The program has no `H` record.
    #[error("object program has no header record")]
    MissingHeader,
    /// The program has no `E` record.
    #[error("object program has no end record")]
    MissingEnd,
    /// The object file could not be read or written.
    #[error("object file I/O failure on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

fn parse_failure(line: usize, message: impl Into<String>) -> ObjectFormatError {
    ObjectFormatError::ParseFailure {
        line,
        message: message.into(),
    }
}

fn parse_hex(line: usize, field: &str, what: &str) -> Result<u32, ObjectFormatError> {
    u32::from_str_radix(field, 16)
        .map_err(|_| parse_failure(line, format!("invalid {what} {field:?}")))
}

impl ObjectFile {
    /// Renders the object program text.
    #[must_use]
    pub fn to_object_program(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "H{:<NAME_WIDTH$}{:06X}{:06X}",
            self.file_name(),
            self.start_address(),
            self.program_length()
        );

        for (name, address) in self.symbol_table().iter() {
            let _ = writeln!(out, "D{name:<NAME_WIDTH$}{address:06X}");
        }

        let mut address = self.start_address() as usize;
        for chunk in self.object_code().chunks(TEXT_RECORD_MAX_BYTES) {
            if chunk.iter().any(|b| *b != 0) {
                let _ = write!(out, "T{address:06X}{:02X}", chunk.len());
                for byte in chunk {
                    let _ = write!(out, "{byte:02X}");
                }
                out.push('\n');
            }
            address += chunk.len();
        }

        let _ = writeln!(out, "E{:06X}", self.entry_point());
        out
    }

    /// Parses object program text.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectFormatError::ParseFailure`] for the first malformed or
    /// inconsistent record, and [`ObjectFormatError::MissingHeader`] /
    /// [`ObjectFormatError::MissingEnd`] when a required record is absent.
    pub fn from_object_program(text: &str) -> Result<Self, ObjectFormatError> {
        let mut header: Option<(String, u32, Vec<u8>)> = None;
        let mut symbols = SymbolTable::new();
        let mut entry: Option<u32> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end();
            if line.is_empty() {
                continue;
            }
            if !line.is_ascii() {
                return Err(parse_failure(line_no, "record contains non-ASCII text"));
            }
            if entry.is_some() {
                return Err(parse_failure(line_no, "record after end record"));
            }

            let (kind, body) = line.split_at(1);
            if kind == "H" {
                if header.is_some() {
                    return Err(parse_failure(line_no, "duplicate header record"));
                }
                header = Some(parse_header(line_no, body)?);
                continue;
            }
            let Some((_, start, code)) = header.as_mut() else {
                return Err(ObjectFormatError::MissingHeader);
            };

            match kind {
                "D" => {
                    let (name, address) = parse_define(line_no, body)?;
                    symbols
                        .define(name, address)
                        .map_err(|e| parse_failure(line_no, e.to_string()))?;
                }
                "T" => parse_text(line_no, body, *start, code)?,
                "E" => {
                    if body.len() != ADDRESS_WIDTH {
                        return Err(parse_failure(line_no, "malformed end record"));
                    }
                    entry = Some(parse_hex(line_no, body, "entry point")?);
                }
                other => {
                    return Err(parse_failure(line_no, format!("unknown record type {other:?}")));
                }
            }
        }

        let (name, start, code) = header.ok_or(ObjectFormatError::MissingHeader)?;
        let entry = entry.ok_or(ObjectFormatError::MissingEnd)?;
        Ok(Self::new(start, code, symbols, name).with_entry_point(entry))
    }

    /// Writes the object program to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectFormatError::Io`] when the file cannot be written.
    pub fn write_to_path(&self, path: &Path) -> Result<(), ObjectFormatError> {
        fs::write(path, self.to_object_program()).map_err(|source| ObjectFormatError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads an object program from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectFormatError::Io`] when the file cannot be read, or any
    /// error from [`ObjectFile::from_object_program`].
    pub fn read_from_path(path: &Path) -> Result<Self, ObjectFormatError> {
        let text = fs::read_to_string(path).map_err(|source| ObjectFormatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_object_program(&text)
    }
}

fn parse_header(line: usize, body: &str) -> Result<(String, u32, Vec<u8>), ObjectFormatError> {
    if body.len() < 2 * ADDRESS_WIDTH {
        return Err(parse_failure(line, "header record is too short"));
    }
    let (name, numbers) = body.split_at(body.len() - 2 * ADDRESS_WIDTH);
    let (start, length) = numbers.split_at(ADDRESS_WIDTH);
    let start = parse_hex(line, start, "start address")?;
    let length = parse_hex(line, length, "program length")?;
    if start + length > MAX_OBJECT_ADDRESS + 1 {
        return Err(parse_failure(line, "program exceeds the address space"));
    }
    Ok((name.trim_end().to_string(), start, vec![0; length as usize]))
}

fn parse_define(line: usize, body: &str) -> Result<(&str, u32), ObjectFormatError> {
    if body.len() <= ADDRESS_WIDTH {
        return Err(parse_failure(line, "define record is too short"));
    }
    let (name, address) = body.split_at(body.len() - ADDRESS_WIDTH);
    let name = name.trim_end();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(parse_failure(line, format!("invalid symbol name {name:?}")));
    }
    Ok((name, parse_hex(line, address, "symbol address")?))
}

fn parse_text(
    line: usize,
    body: &str,
    start: u32,
    code: &mut [u8],
) -> Result<(), ObjectFormatError> {
    if body.len() < ADDRESS_WIDTH + 2 {
        return Err(parse_failure(line, "text record is too short"));
    }
    let address = parse_hex(line, &body[..ADDRESS_WIDTH], "text address")?;
    let count = parse_hex(
        line,
        &body[ADDRESS_WIDTH..ADDRESS_WIDTH + 2],
        "text length",
    )? as usize;
    let data = &body[ADDRESS_WIDTH + 2..];
    if data.len() != count * 2 {
        return Err(parse_failure(
            line,
            format!("text record declares {count} bytes but carries {}", data.len() / 2),
        ));
    }

    let offset = address
        .checked_sub(start)
        .map(|o| o as usize)
        .filter(|o| o + count <= code.len())
        .ok_or_else(|| {
            parse_failure(
                line,
                format!("text record at {address:06X} lies outside the program"),
            )
        })?;

    for (i, slot) in code[offset..offset + count].iter_mut().enumerate() {
        let pair = &data[i * 2..i * 2 + 2];
        *slot = u8::from_str_radix(pair, 16)
            .map_err(|_| parse_failure(line, format!("invalid byte {pair:?}")))?;
    }
    Ok(())
}
