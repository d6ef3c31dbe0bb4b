//! Top-level assembler pipeline.
//!
//! 1. **Parse**: every line through [`parse_line`]
//! 2. **Pass 1**: address assignment and symbol table construction
//! 3. **Pass 2**: encoding to object bytes
//!
//! Assembly stops at the first diagnostic, so identical source always yields
//! the same error.

use std::fmt::Write as _;
use std::path::Path;

use sicxe_core::ObjectFile;

use crate::encoder::{encode_line, EncodeContext, EncodeError, EncodeErrorKind};
use crate::errors::{AssembleError, AssembleErrorKind};
use crate::parser::{parse_line, Directive, ParsedLine, Statement};
use crate::symbols::{assign_addresses, Assignment};

/// Result of assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    /// The loadable program.
    pub object: ObjectFile,
    /// Address-to-source listing.
    pub listing: Vec<ListingEntry>,
}

/// An entry in the address-to-source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Location counter of the line.
    pub address: u32,
    /// Bytes emitted by the line; empty for reservations and directives.
    pub bytes: Vec<u8>,
    /// Source line text.
    pub source: String,
    /// 1-indexed source line number.
    pub line: usize,
}

impl ListingEntry {
    /// Formats as `ADDRESS  BYTES  SOURCE`.
    #[must_use]
    pub fn format(&self) -> String {
        let mut hex = String::with_capacity(self.bytes.len() * 2);
        for byte in &self.bytes {
            let _ = write!(hex, "{byte:02X}");
        }
        format!("{:05X}  {hex:<8}  {}", self.address, self.source.trim_end())
    }
}

/// Formats a listing for display.
#[must_use]
pub fn format_listing(listing: &[ListingEntry]) -> String {
    listing
        .iter()
        .map(ListingEntry::format)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assembles a source file.
///
/// The program is named by the `START` label, or the file stem when absent.
///
/// # Errors
///
/// Returns `AssembleError` if the file cannot be read or any phase fails.
#[allow(clippy::result_large_err)]
pub fn assemble(path: &Path) -> Result<AssembleResult, AssembleError> {
    let display = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| AssembleError {
        kind: AssembleErrorKind::Io(format!("{display}: {e}")),
        location: None,
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    assemble_source(&source, &stem).map_err(|mut e| {
        if let Some(loc) = e.location.as_mut() {
            loc.file.clone_from(&display);
        }
        e
    })
}

/// Assembles source text. `name` labels diagnostics and names the program
/// when there is no `START` label.
///
/// # Errors
///
/// Returns the first `AssembleError` in source order.
#[allow(clippy::result_large_err)]
pub fn assemble_source(source: &str, name: &str) -> Result<AssembleResult, AssembleError> {
    let located = |mut e: AssembleError| {
        if let Some(loc) = e.location.as_mut() {
            name.clone_into(&mut loc.file);
        }
        e
    };

    let parsed = source
        .lines()
        .enumerate()
        .map(|(i, text)| parse_line(text, i + 1).map(|p| (i + 1, p)))
        .collect::<Result<Vec<(usize, ParsedLine)>, _>>()
        .map_err(|e| located(e.into()))?;

    let assignment = assign_addresses(&parsed).map_err(|e| located(e.into()))?;
    let (code, listing) = encode_pass2(&assignment, source).map_err(|e| located(e.into()))?;
    let entry = resolve_entry(&assignment).map_err(|e| located(e.into()))?;

    let program_name = assignment
        .program_name
        .clone()
        .unwrap_or_else(|| name.to_string());
    let object = ObjectFile::new(
        assignment.start_address,
        code,
        assignment.symbols.clone(),
        program_name,
    )
    .with_entry_point(entry);

    log::debug!(
        "assembled {}: {} bytes at {:#06X}, {} symbols",
        object.file_name(),
        object.program_length(),
        object.start_address(),
        assignment.symbols.len()
    );
    Ok(AssembleResult { object, listing })
}

fn encode_pass2(
    assignment: &Assignment,
    source: &str,
) -> Result<(Vec<u8>, Vec<ListingEntry>), EncodeError> {
    let texts: Vec<&str> = source.lines().collect();
    let mut ctx = EncodeContext::new(&assignment.symbols);
    let mut code = Vec::with_capacity((assignment.end_address - assignment.start_address) as usize);
    let mut listing = Vec::new();

    for line in &assignment.lines {
        let bytes = encode_line(line, &mut ctx)?;
        code.extend_from_slice(&bytes);

        if line.parsed.statement == Statement::Blank {
            continue;
        }
        let reserved = matches!(
            line.parsed.statement,
            Statement::Directive(Directive::Resb(_) | Directive::Resw(_))
        );
        listing.push(ListingEntry {
            address: line.address,
            bytes: if reserved { Vec::new() } else { bytes },
            source: texts
                .get(line.source_line - 1)
                .map(|s| (*s).to_string())
                .unwrap_or_default(),
            line: line.source_line,
        });
    }

    Ok((code, listing))
}

fn resolve_entry(assignment: &Assignment) -> Result<u32, EncodeError> {
    let Some(value) = &assignment.entry else {
        return Ok(assignment.start_address);
    };
    let end_line = assignment
        .lines
        .last()
        .map_or(0, |line| line.source_line);
    let err = |kind| EncodeError {
        kind,
        line: end_line,
    };

    let ctx = EncodeContext::new(&assignment.symbols);
    let target = ctx.resolve(value, assignment.end_address).map_err(err)?;
    let (start, end) = (
        i64::from(assignment.start_address),
        i64::from(assignment.end_address),
    );
    let inside = if start == end {
        target == start
    } else {
        (start..end).contains(&target)
    };
    if !inside {
        return Err(err(EncodeErrorKind::EntryOutsideProgram(target)));
    }
    u32::try_from(target).map_err(|_| err(EncodeErrorKind::EntryOutsideProgram(target)))
}
