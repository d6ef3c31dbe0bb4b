//! Text snapshots of memory state.
//!
//! Each line is `"<decimal address>: <decimal value>"`, one per word in
//! ascending address order. Loading is best-effort: every bad line is
//! reported and the remaining lines are still applied.

use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use super::Memory;
use crate::word::Word;

/// Fatal snapshot failure.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file could not be read or written.
    #[error("snapshot I/O failure on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A stream-level I/O failure without an associated path.
    #[error("snapshot I/O failure: {0}")]
    Stream(#[from] io::Error),
}

/// A single rejected snapshot line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotIssue {
    /// The line named an address outside memory.
    #[error("line {line}: address {address} is out of bounds")]
    OutOfBounds {
        /// 1-indexed line number.
        line: usize,
        /// Address as written in the snapshot.
        address: i64,
    },
    /// The line did not match `"<address>: <value>"`.
    #[error("line {line}: cannot parse {text:?}")]
    ParseFailure {
        /// 1-indexed line number.
        line: usize,
        /// Offending line content.
        text: String,
    },
}

/// Result of a best-effort snapshot load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotReport {
    /// Number of lines stored into memory.
    pub applied: usize,
    /// Lines that were skipped, in file order.
    pub issues: Vec<SnapshotIssue>,
}

impl SnapshotReport {
    /// Returns `true` when every line was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Memory {
    /// Writes every word as `"<address>: <value>"` lines.
    ///
    /// # Errors
    ///
    /// Propagates any error from `out`.
    pub fn snapshot_write_to(&self, out: &mut impl Write) -> io::Result<()> {
        for (address, word) in self.words().iter().enumerate() {
            writeln!(out, "{address}: {}", word.value())?;
        }
        out.flush()
    }

    /// Applies snapshot lines from `input`.
    ///
    /// Addresses not mentioned keep their current value.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Stream`] only when `input` itself fails;
    /// malformed, non-UTF-8, or out-of-range lines are collected in the
    /// report instead.
    pub fn snapshot_read_from(
        &mut self,
        input: impl BufRead,
    ) -> Result<SnapshotReport, SnapshotError> {
        let mut report = SnapshotReport::default();

        for (index, raw) in input.split(b'\n').enumerate() {
            let raw = raw?;
            let number = index + 1;
            let Ok(line) = std::str::from_utf8(&raw) else {
                let text = String::from_utf8_lossy(&raw).trim().to_string();
                log::warn!("snapshot line {number} is not UTF-8: {text:?}");
                report.issues.push(SnapshotIssue::ParseFailure {
                    line: number,
                    text,
                });
                continue;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some((address, value)) = parse_line(trimmed) else {
                log::warn!("snapshot line {number} is malformed: {trimmed:?}");
                report.issues.push(SnapshotIssue::ParseFailure {
                    line: number,
                    text: trimmed.to_string(),
                });
                continue;
            };

            let stored = usize::try_from(address)
                .ok()
                .and_then(|a| self.set(a, Word::from_signed(value)).ok());
            if stored.is_some() {
                report.applied += 1;
            } else {
                log::warn!("snapshot line {number} addresses {address}, outside memory");
                report.issues.push(SnapshotIssue::OutOfBounds {
                    line: number,
                    address,
                });
            }
        }

        Ok(report)
    }

    /// Saves the snapshot to `path`.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// persisted over `path`, so readers never see a partially written
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] when the file cannot be created, written,
    /// or moved into place.
    pub fn snapshot_save(&self, path: &Path) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(dir).map_err(io_err)?;
        let mut writer = BufWriter::new(temp.as_file_mut());
        self.snapshot_write_to(&mut writer).map_err(io_err)?;
        drop(writer);
        temp.persist(path).map_err(|e| io_err(e.error))?;
        log::debug!(
            "saved {} words of memory to {}",
            self.capacity(),
            path.display()
        );
        Ok(())
    }

    /// Loads a snapshot from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] when the file cannot be opened or read.
    pub fn snapshot_load(&mut self, path: &Path) -> Result<SnapshotReport, SnapshotError> {
        let file = fs::File::open(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let report = self
            .snapshot_read_from(BufReader::new(file))
            .map_err(|e| match e {
                SnapshotError::Stream(source) => SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })?;
        log::debug!(
            "loaded {} snapshot lines from {} ({} skipped)",
            report.applied,
            path.display(),
            report.issues.len()
        );
        Ok(report)
    }
}

fn parse_line(line: &str) -> Option<(i64, i64)> {
    let (address, value) = line.split_once(':')?;
    let address = address.trim().parse().ok()?;
    let value = value.trim().parse().ok()?;
    Some((address, value))
}
