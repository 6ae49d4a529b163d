//! TabScript input scanner and parse state.
//!
//! Lexer-less scanning: the parser reads named sticky patterns directly at
//! the input cursor while the indent engine synthesizes INDENT/DEDENT
//! markers at newline boundaries. Output is accumulated in an append-only
//! token buffer that snapshots can truncate, which is what makes
//! backtracking cheap.

mod error;
mod output;
mod pattern;
mod scanner;
mod state;

pub use error::{ErrorKind, ParseError};
pub use output::{OutToken, OutputStream};
pub use pattern::{
    is_word_char, Pattern, EXPRESSION_PREFIX, IDENTIFIER, INTEGER, NUMBER, OPERATOR, REGEXP,
    STRING, WHITESPACE, WITHIN_BACKTICK_STRING,
};
pub use state::{IndentMark, Snapshot, State};
