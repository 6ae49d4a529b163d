//! Input scanning and INDENT/DEDENT synthesis.
//!
//! All operations are methods on [`State`]. `read*` never throws: a failed
//! read leaves the scanner unchanged and records the failing pattern in the
//! expected-set. Only `read_newline` can produce a hard error (space used
//! at an indent position).

use crate::error::{ErrorKind, ParseError};
use crate::pattern::{is_word_char, Pattern, WHITESPACE};
use crate::state::{IndentMark, State};

impl State {
    /// Consumes horizontal whitespace and a trailing `#` comment, if any.
    fn skip_whitespace(&mut self) {
        if let Some(m) = WHITESPACE.find_at(self.input(), self.in_pos) {
            self.in_pos += m.len();
        }
    }

    fn token_matched(&mut self, start: usize, len: usize) {
        self.in_pos = start + len;
        if len > 0 {
            self.last_token_end = self.in_pos;
            self.set_out_target(start);
            self.expect_clear();
        }
    }

    fn read_inner(&mut self, patterns: &[&Pattern], skip_ws: bool) -> Option<String> {
        if !self.indents_pending.is_empty() {
            for p in patterns {
                self.expect_add(p.name());
            }
            return None;
        }
        for p in patterns {
            if let Some(m) = p.find_at(self.input(), self.in_pos) {
                let text = m.to_string();
                tracing::trace!(pos = self.in_pos, token = %text, pattern = p.name(), "read");
                self.token_matched(self.in_pos, text.len());
                if skip_ws {
                    self.skip_whitespace();
                }
                return Some(text);
            }
            self.expect_add(p.name());
        }
        None
    }

    /// Attempts each pattern in order at the current position. On success
    /// the match and its trailing whitespace are consumed, the output
    /// target is set (if unset) and the expected-set is cleared.
    pub fn read(&mut self, patterns: &[&Pattern]) -> Option<String> {
        self.read_inner(patterns, true)
    }

    /// As `read`, but leaves trailing whitespace alone. Used inside
    /// backtick strings where whitespace is content.
    pub fn read_raw(&mut self, patterns: &[&Pattern]) -> Option<String> {
        self.read_inner(patterns, false)
    }

    fn read_lit_inner(&mut self, lit: &str, keyword: bool, skip_ws: bool) -> bool {
        let display = || format!("'{lit}'");
        if !self.indents_pending.is_empty() {
            self.expect_add(display());
            return false;
        }
        let rest = &self.input()[self.in_pos..];
        let matched = rest.starts_with(lit)
            && (!keyword || !rest[lit.len()..].chars().next().is_some_and(is_word_char));
        if !matched {
            self.expect_add(display());
            return false;
        }
        tracing::trace!(pos = self.in_pos, token = lit, "read");
        self.token_matched(self.in_pos, lit.len());
        if skip_ws {
            self.skip_whitespace();
        }
        true
    }

    /// Reads an exact literal (punctuation, delimiters).
    pub fn read_lit(&mut self, lit: &str) -> bool {
        self.read_lit_inner(lit, false, true)
    }

    /// As `read_lit`, without the trailing whitespace skip.
    pub fn read_lit_raw(&mut self, lit: &str) -> bool {
        self.read_lit_inner(lit, false, false)
    }

    /// Reads a keyword: the literal must not be followed by a word
    /// character, so `inward` never matches `in`.
    pub fn read_kw(&mut self, kw: &str) -> bool {
        self.read_lit_inner(kw, true, true)
    }

    fn peeking<T>(&mut self, hit: impl Fn(&T) -> bool, f: impl FnOnce(&mut Self) -> T) -> T {
        let save = self.scan_save();
        let target = self.out_target();
        let expected = self.expected_set();
        let result = f(self);
        self.scan_restore(save);
        if hit(&result) {
            // A successful read inside the peek set the target and cleared
            // the expected-set; a peek must do neither.
            if target.is_none() {
                self.clear_out_target();
            }
            self.expected_replace(expected);
        }
        result
    }

    /// As `read`, but restores the scanner on return. A failed peek still
    /// records the failing patterns.
    pub fn peek(&mut self, patterns: &[&Pattern]) -> Option<String> {
        self.peeking(Option::is_some, |s| s.read(patterns))
    }

    /// Peeks an exact literal.
    pub fn peek_lit(&mut self, lit: &str) -> bool {
        self.peeking(|hit| *hit, |s| s.read_lit(lit))
    }

    /// Peeks a keyword.
    pub fn peek_kw(&mut self, kw: &str) -> bool {
        self.peeking(|hit| *hit, |s| s.read_kw(kw))
    }

    /// Scans past a newline boundary, measuring the indent of the next
    /// content line and queueing INDENT/DEDENT markers for the difference.
    ///
    /// Idempotent: a repeat call at the same position succeeds without
    /// rescanning. A `;` before the boundary queues one extra INDENT after
    /// the natural markers. End of input counts as a newline back to
    /// indent level 0. Returns `Ok(false)` when the cursor is not at a
    /// newline boundary at all.
    pub fn read_newline(&mut self) -> Result<bool, ParseError> {
        if self.in_last_newline_pos == Some(self.in_pos) {
            return Ok(true);
        }
        let mut pos = self.in_pos;
        let mut forced = 0usize;
        let mut crossed = false;
        let mut level = self.indent_level;
        let mut at_eof = false;
        loop {
            if let Some(m) = WHITESPACE.find_at(self.input(), pos) {
                pos += m.len();
            }
            match self.input()[pos..].chars().next() {
                Some(';') => {
                    crossed = true;
                    forced += 1;
                    pos += 1;
                }
                Some('\n') => {
                    crossed = true;
                    pos += 1;
                    let mut tabs = 0usize;
                    let mut content = None;
                    for c in self.input()[pos..].chars() {
                        match c {
                            '\t' => {
                                tabs += 1;
                                pos += 1;
                            }
                            '\r' => pos += 1,
                            ' ' => {
                                return Err(self.error_at(
                                    ErrorKind::Indentation,
                                    pos,
                                    "Space indentation is not allowed, use tabs only",
                                ));
                            }
                            other => {
                                content = Some(other);
                                break;
                            }
                        }
                    }
                    match content {
                        // Blank or comment-only lines are skipped without
                        // affecting the measured level.
                        None | Some('\n') | Some('#') => {}
                        Some(_) => {
                            level = tabs;
                            break;
                        }
                    }
                }
                None => {
                    crossed = true;
                    at_eof = true;
                    level = 0;
                    forced = 0;
                    break;
                }
                Some(_) => {
                    if !crossed {
                        return Ok(false);
                    }
                    // Content on the same line after `;`: the natural
                    // level is unchanged.
                    level = self.indent_level;
                    break;
                }
            }
        }
        while level > self.indent_level {
            self.indents_pending.push_back(IndentMark::Indent);
            self.indent_level += 1;
        }
        while level < self.indent_level {
            self.indents_pending.push_back(IndentMark::Dedent);
            self.indent_level -= 1;
        }
        for _ in 0..forced {
            self.indents_pending.push_back(IndentMark::Indent);
            self.indent_level += 1;
        }
        tracing::trace!(
            pos,
            level,
            forced,
            pending = self.indents_pending.len(),
            at_eof,
            "newline"
        );
        self.in_pos = pos;
        self.in_last_newline_pos = Some(pos);
        Ok(true)
    }

    fn read_indent_mark(&mut self, want: IndentMark, name: &str) -> Result<bool, ParseError> {
        if self.indents_pending.is_empty() {
            let save = self.scan_save();
            if !self.read_newline()? {
                self.expect_add(name);
                return Ok(false);
            }
            if self.indents_pending.front() == Some(&want) {
                self.indents_pending.pop_front();
                return Ok(true);
            }
            self.scan_restore(save);
            self.expect_add(name);
            return Ok(false);
        }
        if self.indents_pending.front() == Some(&want) {
            self.indents_pending.pop_front();
            return Ok(true);
        }
        self.expect_add(name);
        Ok(false)
    }

    /// Consumes one pending INDENT, reading a newline first if needed.
    pub fn read_indent(&mut self) -> Result<bool, ParseError> {
        self.read_indent_mark(IndentMark::Indent, "an indented block")
    }

    /// Consumes one pending DEDENT, reading a newline first if needed.
    pub fn read_dedent(&mut self) -> Result<bool, ParseError> {
        self.read_indent_mark(IndentMark::Dedent, "end of block")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{IDENTIFIER, NUMBER};

    fn read1(state: &mut State, p: &Pattern) -> Option<String> {
        state.read(&[p])
    }

    #[test]
    fn test_read_consumes_trailing_whitespace() {
        let mut state = State::new("foo  bar");
        assert_eq!(read1(&mut state, &IDENTIFIER), Some("foo".into()));
        assert_eq!(state.in_pos, 5);
        assert_eq!(state.last_token_end, 3);
        assert_eq!(read1(&mut state, &IDENTIFIER), Some("bar".into()));
    }

    #[test]
    fn test_failed_read_leaves_state_and_records_expected() {
        let mut state = State::new("foo");
        assert_eq!(read1(&mut state, &NUMBER), None);
        assert_eq!(state.in_pos, 0);
        let expected: Vec<_> = state.expected().collect();
        assert_eq!(expected, vec!["a number"]);
        // A successful read clears the set.
        assert_eq!(read1(&mut state, &IDENTIFIER), Some("foo".into()));
        assert!(state.expected_is_empty());
    }

    #[test]
    fn test_read_sets_out_target_once() {
        let mut state = State::new("a b");
        state.read(&[&IDENTIFIER]);
        assert_eq!(state.out_target(), Some(0));
        state.read(&[&IDENTIFIER]);
        assert_eq!(state.out_target(), Some(0));
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut state = State::new("foo bar");
        assert_eq!(state.peek(&[&IDENTIFIER]), Some("foo".into()));
        assert_eq!(state.in_pos, 0);
        assert_eq!(state.out_target(), None);
    }

    #[test]
    fn test_keyword_boundary() {
        let mut state = State::new("inward");
        assert!(!state.read_kw("in"));
        assert_eq!(state.in_pos, 0);
        let mut state = State::new("in x");
        assert!(state.read_kw("in"));
        assert_eq!(state.in_pos, 3);
    }

    #[test]
    fn test_newline_indent_dedent() {
        let mut state = State::new("a\n\tb\nc");
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        assert_eq!(state.indent_level(), 1);
        assert_eq!(state.indents_pending(), 1);
        // Reads are blocked while markers are pending.
        assert_eq!(state.read(&[&IDENTIFIER]), None);
        assert!(state.read_indent().unwrap());
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        assert!(state.read_dedent().unwrap());
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        assert!(state.at_eof());
        assert_eq!(state.indent_level(), 0);
    }

    #[test]
    fn test_newline_is_idempotent() {
        let mut state = State::new("a\nb");
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        let pos = state.in_pos;
        assert!(state.read_newline().unwrap());
        assert_eq!(state.in_pos, pos);
    }

    #[test]
    fn test_newline_skips_blank_and_comment_lines() {
        let mut state = State::new("a\n\n\t# note\n\tb");
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        assert_eq!(state.indent_level(), 1);
        assert!(state.read_indent().unwrap());
        assert_eq!(state.read(&[&IDENTIFIER]), Some("b".into()));
    }

    #[test]
    fn test_space_indentation_is_fatal() {
        let mut state = State::new("a\n b");
        state.read(&[&IDENTIFIER]);
        let err = state.read_newline().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Indentation);
        assert!(err.message.contains("tabs only"));
    }

    #[test]
    fn test_semicolon_forces_indent() {
        let mut state = State::new("a; b\nc");
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        // Same line, so no natural markers; one forced INDENT.
        assert_eq!(state.indent_level(), 1);
        assert!(state.read_indent().unwrap());
        assert_eq!(state.read(&[&IDENTIFIER]), Some("b".into()));
        // The next real newline dedents back out of the forced block.
        assert!(state.read_newline().unwrap());
        assert!(state.read_dedent().unwrap());
        assert_eq!(state.read(&[&IDENTIFIER]), Some("c".into()));
    }

    #[test]
    fn test_semicolon_before_newline() {
        let mut state = State::new("a;\n\tb\nc");
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        // Natural INDENT for the tab plus the forced INDENT.
        assert_eq!(state.indent_level(), 2);
        assert!(state.read_indent().unwrap());
        assert!(state.read_indent().unwrap());
        assert_eq!(state.read(&[&IDENTIFIER]), Some("b".into()));
        assert!(state.read_newline().unwrap());
        assert!(state.read_dedent().unwrap());
        assert!(state.read_dedent().unwrap());
        assert_eq!(state.read(&[&IDENTIFIER]), Some("c".into()));
    }

    #[test]
    fn test_eof_returns_to_level_zero() {
        let mut state = State::new("a\n\tb");
        state.read(&[&IDENTIFIER]);
        state.read_newline().unwrap();
        state.read_indent().unwrap();
        state.read(&[&IDENTIFIER]);
        assert!(state.read_newline().unwrap());
        assert!(state.read_dedent().unwrap());
        assert!(state.at_eof());
        assert_eq!(state.indent_level(), 0);
    }

    #[test]
    fn test_read_indent_reverts_on_mismatch() {
        let mut state = State::new("a\nb");
        state.read(&[&IDENTIFIER]);
        let pos = state.in_pos;
        // Next line is at the same level: no INDENT to take.
        assert!(!state.read_indent().unwrap());
        assert_eq!(state.in_pos, pos);
        assert_eq!(state.indents_pending(), 0);
        // The newline is still readable afterwards.
        assert!(state.read_newline().unwrap());
        assert_eq!(state.read(&[&IDENTIFIER]), Some("b".into()));
    }
}
