//! Renders the output token stream to final source text plus a source map.
//!
//! A single left-to-right pass tracks the output cursor against the target
//! position carried by marks. Line differences become newlines, column
//! differences at line start become indentation, and everything else is
//! decided by the separator rules below. The pass is deterministic: the
//! same token stream and mode always produce byte-identical results.

use serde::Serialize;
use tabscript_scanner::{is_word_char, OutToken, State};

/// Whitespace handling for rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitespaceMode {
    /// Follow source lines/columns: tab indentation, space padding up to
    /// the source column where possible.
    #[default]
    Preserve,
    /// Canonical spacing: two-space indentation, single spaces between
    /// tokens subject to the no-space classes.
    Pretty,
}

/// Parallel arrays of `(input byte offset, output byte offset)` basis
/// points. A decoder may interpolate linearly between consecutive pairs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceMap {
    #[serde(rename = "in")]
    pub input: Vec<u32>,
    #[serde(rename = "out")]
    pub output: Vec<u32>,
}

impl SourceMap {
    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// Characters that never take a space after them in pretty mode.
const NO_SPACE_AFTER: &str = "[(.!{;";
/// Characters that never take a space before them in pretty mode.
const NO_SPACE_BEFORE: &str = "[](,;):.}?";

/// Pretty-mode separator decision for two adjacent output characters.
/// Exposed for direct testing; this one function is the source of all
/// visual differences between outputs.
pub fn pretty_separator(prev: char, next: char) -> bool {
    if is_word_char(prev) && is_word_char(next) {
        return true;
    }
    if NO_SPACE_AFTER.contains(prev) {
        return false;
    }
    if NO_SPACE_BEFORE.contains(next) {
        // Assignment/annotation/arrow heads keep a space before an
        // opening bracket: `= (x)`, `: [1]`, `=> (…)`.
        return matches!(prev, ':' | '=' | '>') && matches!(next, '(' | '[');
    }
    true
}

/// Renders `state`'s output stream. `state` is read, never mutated.
pub fn render(state: &State, mode: WhitespaceMode) -> (String, SourceMap) {
    let mut code = String::new();
    let mut map = SourceMap::default();
    let (mut out_line, mut out_col) = (1usize, 1usize);
    let (mut target_line, mut target_col) = (1usize, 1usize);
    let mut pending_map_in: Option<usize> = None;

    for token in state.output().tokens() {
        match token {
            OutToken::Mark { offset, map: records } => {
                let (line, col) = state.resolve(*offset);
                target_line = line;
                target_col = col;
                if *records {
                    pending_map_in = Some(*offset);
                }
            }
            OutToken::Text(text) => {
                while target_line > out_line {
                    code.push('\n');
                    out_line += 1;
                    out_col = 1;
                }
                let next = match text.chars().next() {
                    Some(c) => c,
                    None => continue,
                };
                if out_col == 1 && target_col > 1 {
                    let indent = match mode {
                        WhitespaceMode::Preserve => "\t".repeat(target_col - 1),
                        WhitespaceMode::Pretty => "  ".repeat(target_col - 1),
                    };
                    out_col += indent.len();
                    code.push_str(&indent);
                } else if let Some(prev) = code.chars().last() {
                    if prev != '\n' {
                        if is_word_char(prev) && is_word_char(next) {
                            code.push(' ');
                            out_col += 1;
                        } else {
                            match mode {
                                WhitespaceMode::Preserve => {
                                    while out_col < target_col {
                                        code.push(' ');
                                        out_col += 1;
                                    }
                                }
                                WhitespaceMode::Pretty => {
                                    if pretty_separator(prev, next) {
                                        code.push(' ');
                                        out_col += 1;
                                    }
                                }
                            }
                        }
                    }
                }
                if let Some(input_offset) = pending_map_in.take() {
                    map.input.push(input_offset as u32);
                    map.output.push(code.len() as u32);
                }
                code.push_str(text);
                match text.rfind('\n') {
                    Some(last) => {
                        out_line += text.bytes().filter(|b| *b == b'\n').count();
                        out_col = text.len() - last;
                    }
                    None => out_col += text.len(),
                }
            }
        }
    }
    code.push('\n');
    (code, map)
}
