//! Parse error type shared by the scanner, parser and driver.

use miette::Diagnostic;
use thiserror::Error;

/// What went wrong, which decides whether recovery may swallow the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Ordinary syntax error; recoverable when recovery is enabled.
    Syntax,
    /// `tabscript X.Y` header missing or version mismatch. Never recoverable.
    Header,
    /// Space used at an indent position. Never recoverable.
    Indentation,
    /// Plugin load or execution failure. Never recoverable.
    Plugin,
}

/// A parse failure with its source position.
///
/// `line` and `column` are 1-based; `offset` is a 0-based byte offset.
/// When error recovery skips input to resynchronize, the skipped slice is
/// recorded in `recover_skip`.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[label("here")]
    pub span: miette::SourceSpan,
    pub recover_skip: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ErrorKind,
        offset: usize,
        line: usize,
        column: usize,
        message: String,
    ) -> Self {
        Self {
            kind,
            offset,
            line,
            column,
            message,
            span: (offset, 0).into(),
            recover_skip: None,
        }
    }

    /// True for errors that `recover_errors` may swallow.
    pub fn recoverable(&self) -> bool {
        self.kind == ErrorKind::Syntax
    }
}
