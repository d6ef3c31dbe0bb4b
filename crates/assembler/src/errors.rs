//! Structured error reporting for assembler phases.
//!
//! All errors format to stderr in the standard style:
//! ```text
//! copy.asm:10: error: undefined symbol: BUFFER
//! ```

use std::fmt;

use crate::encoder::{EncodeError, EncodeErrorKind};
use crate::parser::{ParseError, ParseErrorKind};
use crate::symbols::{SymbolError, SymbolErrorKind};

/// A source location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    /// Source name, usually the file path.
    pub file: String,
    /// 1-indexed line number.
    pub line: usize,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The first diagnostic of a failed assembly, with its line context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    /// The kind of error.
    pub kind: AssembleErrorKind,
    /// Source location if available.
    pub location: Option<SourceLoc>,
}

impl AssembleError {
    /// Creates an error without location.
    #[must_use]
    pub const fn new(kind: AssembleErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Attaches `file` and `line`.
    #[must_use]
    pub fn at(mut self, file: &str, line: usize) -> Self {
        self.location = Some(SourceLoc {
            file: file.to_string(),
            line,
        });
        self
    }

    /// Formats the error for stderr output.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.location.as_ref().map_or_else(
            || format!("error: {}", self.kind),
            |loc| format!("{loc}: error: {}", self.kind),
        )
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AssembleError {}

/// Classification of assembler errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleErrorKind {
    /// Source line could not be parsed.
    Parse(ParseErrorKind),
    /// Pass-1 symbol error.
    Symbol(SymbolErrorKind),
    /// Pass-2 encoding error.
    Encode(EncodeErrorKind),
    /// Source file could not be read.
    Io(String),
}

impl fmt::Display for AssembleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Symbol(e) => write!(f, "{e}"),
            Self::Encode(e) => write!(f, "{e}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl From<ParseError> for AssembleError {
    fn from(e: ParseError) -> Self {
        Self {
            kind: AssembleErrorKind::Parse(e.kind),
            location: Some(SourceLoc {
                file: String::new(),
                line: e.line,
            }),
        }
    }
}

impl From<SymbolError> for AssembleError {
    fn from(e: SymbolError) -> Self {
        Self {
            kind: AssembleErrorKind::Symbol(e.kind),
            location: Some(SourceLoc {
                file: String::new(),
                line: e.line,
            }),
        }
    }
}

impl From<EncodeError> for AssembleError {
    fn from(e: EncodeError) -> Self {
        Self {
            kind: AssembleErrorKind::Encode(e.kind),
            location: Some(SourceLoc {
                file: String::new(),
                line: e.line,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_format_includes_location() {
        let err = AssembleError::new(AssembleErrorKind::Encode(EncodeErrorKind::UndefinedSymbol(
            "BUFFER".into(),
        )))
        .at("copy.asm", 10);
        assert_eq!(
            err.format_for_stderr(),
            "copy.asm:10: error: undefined symbol: BUFFER"
        );
        assert_eq!(err.to_string(), "copy.asm:10: undefined symbol: BUFFER");
    }

    #[test]
    fn stderr_format_without_location() {
        let err = AssembleError::new(AssembleErrorKind::Io("not found".into()));
        assert_eq!(err.format_for_stderr(), "error: I/O error: not found");
    }

    #[test]
    fn phase_errors_keep_their_line() {
        let err: AssembleError = SymbolError {
            kind: SymbolErrorKind::MisplacedStart,
            line: 4,
        }
        .into();
        assert_eq!(err.location.map(|loc| loc.line), Some(4));
        assert_eq!(err.kind, AssembleErrorKind::Symbol(SymbolErrorKind::MisplacedStart));

        let err: AssembleError = ParseError {
            line: 2,
            kind: ParseErrorKind::MissingOperand,
        }
        .into();
        assert_eq!(err.kind, AssembleErrorKind::Parse(ParseErrorKind::MissingOperand));
        assert_eq!(err.location.map(|loc| loc.line), Some(2));
    }
}
