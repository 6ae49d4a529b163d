//! Mutable parse state and its snapshot machinery.
//!
//! One `State` exists per transpilation. The parser mutates it while
//! reading input and appending output; the renderer then reads it without
//! mutating. Snapshots are plain values capturing every field needed to
//! roll the state back to the point of capture.

use std::collections::{BTreeSet, VecDeque};

use crate::error::{ErrorKind, ParseError};
use crate::output::{OutToken, OutputStream};

/// Synthetic block-structure marker produced by the indent engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentMark {
    Indent,
    Dedent,
}

/// Periodic line/column cache: one entry per `STRIDE` bytes of input, so
/// resolving an offset is a table lookup plus a short linear scan.
#[derive(Debug)]
pub(crate) struct LineIndex {
    stride: usize,
    cache: Vec<(usize, usize)>,
}

const STRIDE: usize = 100;

impl LineIndex {
    pub(crate) fn new(input: &str) -> Self {
        let mut cache = Vec::with_capacity(input.len() / STRIDE + 1);
        let (mut line, mut col) = (1usize, 1usize);
        cache.push((line, col));
        for (i, b) in input.bytes().enumerate() {
            if b == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            if (i + 1) % STRIDE == 0 {
                cache.push((line, col));
            }
        }
        Self { stride: STRIDE, cache }
    }

    /// 1-based line/column of a byte offset.
    pub(crate) fn resolve(&self, input: &str, offset: usize) -> (usize, usize) {
        let offset = offset.min(input.len());
        let slot = offset / self.stride;
        let (mut line, mut col) = self.cache[slot.min(self.cache.len() - 1)];
        for b in input[slot * self.stride..offset].bytes() {
            if b == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}

/// Scanner-only fields, saved and restored as a unit.
#[derive(Debug, Clone)]
pub(crate) struct ScanSave {
    pub(crate) in_pos: usize,
    pub(crate) indent_level: usize,
    pub(crate) indents_pending: VecDeque<IndentMark>,
    pub(crate) in_last_newline_pos: Option<usize>,
    pub(crate) last_token_end: usize,
}

/// Aggregated parse state: input cursor, indent engine, output buffer,
/// pending output target, expected-set and accumulated errors.
#[derive(Debug)]
pub struct State {
    input: String,
    pub in_pos: usize,
    pub(crate) indent_level: usize,
    pub(crate) indents_pending: VecDeque<IndentMark>,
    pub(crate) in_last_newline_pos: Option<usize>,
    /// End offset of the last consumed token, before whitespace skip.
    /// `in_pos == last_token_end` means no space preceded the cursor.
    pub last_token_end: usize,
    out: OutputStream,
    out_target: Option<usize>,
    expected: BTreeSet<String>,
    pub errors: Vec<ParseError>,
    line_index: LineIndex,
}

impl State {
    pub fn new(input: &str) -> Self {
        Self {
            line_index: LineIndex::new(input),
            input: input.to_string(),
            in_pos: 0,
            indent_level: 0,
            indents_pending: VecDeque::new(),
            in_last_newline_pos: None,
            last_token_end: 0,
            out: OutputStream::new(),
            out_target: None,
            expected: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// 1-based line/column of a byte offset.
    pub fn resolve(&self, offset: usize) -> (usize, usize) {
        self.line_index.resolve(&self.input, offset)
    }

    pub fn indent_level(&self) -> usize {
        self.indent_level
    }

    pub fn indents_pending(&self) -> usize {
        self.indents_pending.len()
    }

    /// All input consumed and the indent queue drained back to level 0.
    pub fn at_eof(&self) -> bool {
        self.in_pos >= self.input.len() && self.indents_pending.is_empty()
    }

    // --- Output ---

    /// Appends output text. A pending output target becomes a map mark
    /// immediately before the text and is consumed by it.
    pub fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(target) = self.out_target.take() {
            self.out.push_map_mark(target);
        }
        tracing::trace!(text, "emit");
        self.out.push_text(text);
    }

    /// Repositions the render cursor without recording a map pair.
    pub fn emit_no_map_mark(&mut self, offset: usize) {
        self.out.push_no_map_mark(offset);
    }

    /// Force-records a position mark that will contribute a map pair.
    pub fn emit_map_mark(&mut self, offset: usize) {
        self.out.push_map_mark(offset);
    }

    pub fn out_target(&self) -> Option<usize> {
        self.out_target
    }

    pub(crate) fn set_out_target(&mut self, offset: usize) {
        if self.out_target.is_none() {
            self.out_target = Some(offset);
        }
    }

    /// Drops a stale target so the next statement maps to its own start.
    pub fn clear_out_target(&mut self) {
        self.out_target = None;
    }

    pub fn output(&self) -> &OutputStream {
        &self.out
    }

    // --- Expected-set ---

    pub(crate) fn expect_add(&mut self, name: impl Into<String>) {
        self.expected.insert(name.into());
    }

    pub(crate) fn expect_clear(&mut self) {
        self.expected.clear();
    }

    pub(crate) fn expected_set(&self) -> BTreeSet<String> {
        self.expected.clone()
    }

    pub(crate) fn expected_replace(&mut self, set: BTreeSet<String>) {
        self.expected = set;
    }

    pub fn expected(&self) -> impl Iterator<Item = &str> {
        self.expected.iter().map(String::as_str)
    }

    pub fn expected_is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    /// Builds the standard "Could not parse" error for the current position,
    /// listing the expected-set in sorted order plus an input window.
    pub fn failure(&self, rule: &str) -> ParseError {
        let window: String = self.input[self.in_pos..]
            .chars()
            .take(24)
            .map(|c| if c == '\n' { '\u{23ce}' } else { c })
            .collect();
        let expecting = self
            .expected
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let (line, column) = self.resolve(self.in_pos);
        ParseError::new(
            ErrorKind::Syntax,
            self.in_pos,
            line,
            column,
            format!(
                "Could not parse {rule}\n  Input is: {window}\n  Expecting one of: {expecting}"
            ),
        )
    }

    /// Error constructor for scanner-level failures.
    pub fn error_at(&self, kind: ErrorKind, offset: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = self.resolve(offset);
        ParseError::new(kind, offset, line, column, message.into())
    }

    // --- Snapshot ---

    pub(crate) fn scan_save(&self) -> ScanSave {
        ScanSave {
            in_pos: self.in_pos,
            indent_level: self.indent_level,
            indents_pending: self.indents_pending.clone(),
            in_last_newline_pos: self.in_last_newline_pos,
            last_token_end: self.last_token_end,
        }
    }

    pub(crate) fn scan_restore(&mut self, save: ScanSave) {
        self.in_pos = save.in_pos;
        self.indent_level = save.indent_level;
        self.indents_pending = save.indents_pending;
        self.in_last_newline_pos = save.in_last_newline_pos;
        self.last_token_end = save.last_token_end;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            scan: self.scan_save(),
            out_target: self.out_target,
            out_len: self.out.len(),
            expected: self.expected.clone(),
        }
    }
}

/// Captured state, valid until forward progress passes it. Passed to
/// `revert`/`revert_output` at most once.
#[derive(Debug, Clone)]
pub struct Snapshot {
    scan: ScanSave,
    out_target: Option<usize>,
    out_len: usize,
    expected: BTreeSet<String>,
}

impl Snapshot {
    /// Restores every captured field, truncating the output buffer.
    pub fn revert(&self, state: &mut State) {
        tracing::trace!(in_pos = self.scan.in_pos, out_len = self.out_len, "revert");
        state.scan_restore(self.scan.clone());
        state.out_target = self.out_target;
        state.out.truncate(self.out_len);
        state.expected = self.expected.clone();
    }

    /// Restores only the output-related fields, returning the truncated
    /// tokens so a caller can inspect speculative output.
    pub fn revert_output(&self, state: &mut State) -> Vec<OutToken> {
        state.out_target = self.out_target;
        state.out.truncate(self.out_len)
    }

    /// True if any `Text` was appended since the snapshot.
    pub fn has_output(&self, state: &State) -> bool {
        state.out.has_text_since(self.out_len)
    }

    /// Concatenated `Text` appended since the snapshot.
    pub fn output_since(&self, state: &State) -> String {
        state.out.text_since(self.out_len)
    }

    pub fn out_len(&self) -> usize {
        self.out_len
    }

    pub fn in_pos(&self) -> usize {
        self.scan.in_pos
    }
}
