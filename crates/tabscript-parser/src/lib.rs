//! TabScript parser core.
//!
//! A single-pass, backtracking recursive-descent parser that consumes input
//! through the scanner and writes output tokens as it goes. There is no
//! AST: alternation is expressed as sequential attempts guarded by
//! snapshots, and failed attempts truncate the output buffer back to the
//! snapshot length. Every grammar routine is also an assignable slot that
//! plugins can replace by name.

mod expr;
mod group;
mod item;
mod plugin;
mod stmt;
mod types;

#[cfg(test)]
mod parser_tests;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tabscript_scanner::{ErrorKind, ParseError, State};

pub use group::GroupSpec;
pub use plugin::{PluginEntry, PluginLoader, PluginModule};

/// Supported header version: major must match, minor must not exceed.
pub const SUPPORTED_MAJOR: u32 = 1;
pub const SUPPORTED_MINOR: u32 = 0;

/// Result of one grammar routine: `Ok(true)` advanced the state,
/// `Ok(false)` left it untouched, `Err` aborted mid-consumption.
pub type PResult = Result<bool, ParseError>;

/// Built-in implementation of a named rule.
pub type ParseFn = fn(&mut Parser) -> PResult;

/// Installed replacement for a named rule.
pub type ParseHook = Arc<dyn Fn(&mut Parser) -> PResult>;

/// URI rewriter applied to import paths.
pub type ImportTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Parser-level options. The whitespace mode lives with the renderer; the
/// driver owns both.
#[derive(Clone, Default)]
pub struct ParserOptions {
    /// JavaScript output: strip type-level tokens, emit `"use strict";`.
    pub js: bool,
    /// Collect syntax errors and resynchronize instead of aborting.
    pub recover: bool,
    /// Trace rule dispatch and token reads through `tracing`.
    pub debug: bool,
    pub transform_import: Option<ImportTransform>,
    pub load_plugin: Option<PluginLoader>,
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("js", &self.js)
            .field("recover", &self.recover)
            .field("debug", &self.debug)
            .field("transform_import", &self.transform_import.is_some())
            .field("load_plugin", &self.load_plugin.is_some())
            .finish()
    }
}

/// Whether a completed statement takes a trailing `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StmtClass {
    /// Expression-like: gets a `;` when it emitted anything.
    Simple,
    /// Block-shaped (`if`, `for`, `class`, …): no `;`.
    Declaration,
}

/// Context for class member parsing.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClassCtx {
    pub(crate) derived: bool,
    pub(crate) interface: bool,
}

/// The parser. Owns the [`State`] for the duration of one transpilation.
pub struct Parser {
    pub state: State,
    pub(crate) opts: ParserOptions,
    overrides: HashMap<String, ParseHook>,
    pub(crate) current_class: Option<ClassCtx>,
    /// Statement class reported by a wrapping rule (`export`).
    pub(crate) stmt_class_hint: Option<StmtClass>,
    /// Header feature flags, merged into every plugin's options.
    pub(crate) header_flags: serde_json::Map<String, Value>,
}

/// Named built-in rules, in dispatch-table form so an override can capture
/// and delegate to the implementation it replaces.
const RULES: &[(&str, ParseFn)] = &[
    ("main", Parser::parse_main_impl),
    ("header", Parser::parse_header_impl),
    ("statement", Parser::parse_statement_impl),
    ("return", Parser::parse_return_impl),
    ("throw", Parser::parse_throw_impl),
    ("type_decl", Parser::parse_type_decl_impl),
    ("export", Parser::parse_export_impl),
    ("import", Parser::parse_import_impl),
    ("do_while", Parser::parse_do_while_impl),
    ("if_while", Parser::parse_if_while_impl),
    ("for", Parser::parse_for_impl),
    ("try", Parser::parse_try_impl),
    ("function", Parser::parse_function_impl),
    ("class", Parser::parse_class_impl),
    ("method", Parser::parse_method_impl),
    ("switch", Parser::parse_switch_impl),
    ("enum", Parser::parse_enum_impl),
    ("declare", Parser::parse_declare_impl),
    ("var_decl", Parser::parse_var_decl_impl),
    ("expression_seq", Parser::parse_expression_seq_impl),
    ("expression", Parser::parse_expression_impl),
    ("block", Parser::parse_block_impl),
    ("type", Parser::parse_type_impl),
];

impl Parser {
    pub fn new(input: &str, opts: ParserOptions) -> Self {
        Self {
            state: State::new(input),
            opts,
            overrides: HashMap::new(),
            current_class: None,
            stmt_class_hint: None,
            header_flags: serde_json::Map::new(),
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.opts
    }

    /// The built-in implementation of a named rule, if the name is known.
    pub fn builtin(name: &str) -> Option<ParseFn> {
        RULES.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    /// Installs `hook` as the implementation of `name`, returning the
    /// previous implementation so the hook can delegate to it.
    pub fn override_rule(
        &mut self,
        name: &str,
        hook: ParseHook,
    ) -> Result<ParseHook, ParseError> {
        let previous = match self.overrides.remove(name) {
            Some(prev) => prev,
            None => {
                let builtin = Self::builtin(name).ok_or_else(|| {
                    self.state.error_at(
                        ErrorKind::Plugin,
                        self.state.in_pos,
                        format!("Unknown parse rule: {name}"),
                    )
                })?;
                Arc::new(builtin)
            }
        };
        self.overrides.insert(name.to_string(), hook);
        Ok(previous)
    }

    pub(crate) fn dispatch(&mut self, name: &str, builtin: ParseFn) -> PResult {
        if self.opts.debug {
            tracing::debug!(rule = name, pos = self.state.in_pos, "parse");
        }
        match self.overrides.get(name).cloned() {
            Some(hook) => hook.as_ref()(self),
            None => builtin(self),
        }
    }

    // --- must / failure ---

    /// Converts a failed condition into a ParseError listing the current
    /// expected-set.
    pub fn must(&mut self, ok: bool, rule: &str) -> Result<(), ParseError> {
        if ok {
            Ok(())
        } else {
            Err(self.state.failure(rule))
        }
    }

    /// Runs a rule and converts its clean failure into a ParseError.
    pub fn must_parse(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult,
        rule: &str,
    ) -> Result<(), ParseError> {
        match f(self)? {
            true => Ok(()),
            false => Err(self.state.failure(rule)),
        }
    }

    /// Parses type-level content: in JS mode the emitted output is
    /// discarded via snapshot/revert, in TS mode it stays.
    pub(crate) fn type_level(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult,
    ) -> PResult {
        let snap = self.state.snapshot();
        let ok = f(self)?;
        if ok && self.opts.js {
            snap.revert_output(&mut self.state);
        }
        Ok(ok)
    }

    /// Snapshot-guarded attempt: a clean failure reverts everything.
    pub(crate) fn attempt(&mut self, f: impl FnOnce(&mut Self) -> PResult) -> PResult {
        let snap = self.state.snapshot();
        let ok = f(self)?;
        if !ok {
            snap.revert(&mut self.state);
        }
        Ok(ok)
    }

    // --- Entry point ---

    /// Parses the whole input: header, then statements until end of file.
    pub fn parse_main(&mut self) -> Result<(), ParseError> {
        match self.dispatch("main", Self::parse_main_impl)? {
            true => Ok(()),
            false => Err(self.state.failure("main")),
        }
    }

    fn parse_main_impl(p: &mut Parser) -> PResult {
        if p.opts.js {
            p.state.emit("\"use strict\";");
        }
        p.must_parse(|p| p.dispatch("header", Self::parse_header_impl), "header")?;
        while !p.state.at_eof() {
            let before = p.state.in_pos;
            let pending = p.state.indents_pending();
            p.recover_errors(|p| {
                p.must_parse(Self::parse_statement, "statement")?;
                let nl = p.state.read_newline()?;
                p.must(nl, "newline")
            })?;
            if p.state.in_pos == before
                && p.state.indents_pending() == pending
                && !p.state.at_eof()
            {
                // Recovery made no progress; bail out rather than spin.
                let err = p.state.failure("statement");
                p.state.errors.push(err);
                break;
            }
        }
        Ok(true)
    }

    /// `tabscript X.Y [name=value…]` — must be the first line.
    fn parse_header_impl(p: &mut Parser) -> PResult {
        let header_err = |p: &Parser, msg: &str| {
            p.state
                .error_at(ErrorKind::Header, p.state.in_pos, msg.to_string())
        };
        if !p.state.read_kw("tabscript") {
            return Err(header_err(
                p,
                "Missing header: each file must start with `tabscript X.Y`",
            ));
        }
        let version = match p.state.read(&[&tabscript_scanner::NUMBER]) {
            Some(v) => v,
            None => return Err(header_err(p, "Missing version in tabscript header")),
        };
        let (major, minor) = parse_version(&version)
            .ok_or_else(|| header_err(p, "Malformed version in tabscript header"))?;
        if major != SUPPORTED_MAJOR || minor > SUPPORTED_MINOR {
            return Err(header_err(
                p,
                &format!(
                    "Unsupported tabscript version {major}.{minor} (supported: {SUPPORTED_MAJOR}.{SUPPORTED_MINOR})"
                ),
            ));
        }
        while let Some(name) = p.state.read(&[&tabscript_scanner::IDENTIFIER]) {
            if !p.state.read_lit("=") {
                return Err(header_err(p, "Malformed header flag, expected name=value"));
            }
            let value = if let Some(s) = p.state.read(&[&tabscript_scanner::STRING]) {
                Value::String(unquote(&s))
            } else if let Some(n) = p.state.read(&[&tabscript_scanner::NUMBER]) {
                n.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::String(n))
            } else if let Some(w) = p.state.read(&[&tabscript_scanner::IDENTIFIER]) {
                Value::String(w)
            } else {
                return Err(header_err(p, "Malformed header flag value"));
            };
            p.header_flags.insert(name, value);
        }
        let nl = p.state.read_newline()?;
        p.must(nl, "header")?;
        // The header produces no output; drop its position target.
        p.state.clear_out_target();
        Ok(true)
    }

    // --- Error recovery ---

    /// Wraps a parse attempt. Recoverable errors are pushed onto the error
    /// list and input is skipped to the next newline at the same indent
    /// depth, so the enclosing statement loop can continue.
    pub(crate) fn recover_errors(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), ParseError>,
    ) -> Result<(), ParseError> {
        match f(self) {
            Ok(()) => Ok(()),
            Err(mut err) if self.opts.recover && err.recoverable() => {
                let skip_start = self.state.in_pos;
                self.skip_to_recovery_point()?;
                err.recover_skip =
                    Some(self.state.input()[skip_start..self.state.in_pos].to_string());
                tracing::debug!(
                    offset = err.offset,
                    skipped = err.recover_skip.as_deref().unwrap_or(""),
                    "recovered"
                );
                self.state.errors.push(err);
                self.state.clear_out_target();
                if !self.state.output().is_empty()
                    && !self.state.output().ends_with(";")
                    && !self.state.output().ends_with("{")
                {
                    self.state.emit(";");
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Skips forward, tracking net indent depth, and stops at a newline
    /// once the depth has returned to its starting value. Stops *before*
    /// consuming a DEDENT that would leave the enclosing block.
    fn skip_to_recovery_point(&mut self) -> Result<(), ParseError> {
        let start_pos = self.state.in_pos;
        let mut net: isize = 0;
        loop {
            if self.state.indents_pending() > 0 {
                match self.state.read_indent()? {
                    true => {
                        net += 1;
                        continue;
                    }
                    false => {}
                }
                if net == 0 {
                    // A DEDENT out of the surrounding block: leave it for
                    // the enclosing group to consume.
                    break;
                }
                if self.state.read_dedent()? {
                    net -= 1;
                    if net == 0 && self.state.indents_pending() == 0 {
                        break;
                    }
                }
                continue;
            }
            if self.state.in_pos >= self.state.input().len() {
                break;
            }
            let before = self.state.in_pos;
            if self.state.read_newline()? {
                if self.state.in_pos > before {
                    if net == 0 && self.state.indents_pending() == 0 {
                        break;
                    }
                    continue;
                }
                // Idempotent hit on the boundary we started at: force one
                // character of progress so the loop cannot spin.
                if self.state.in_pos > start_pos {
                    break;
                }
            }
            let step = self.state.input()[self.state.in_pos..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            self.state.in_pos += step;
        }
        Ok(())
    }

    // --- Shared small helpers ---

    /// Emits `}`-style closing text pinned to the current input position.
    pub(crate) fn emit_close(&mut self, text: &str) {
        self.state.clear_out_target();
        if !text.is_empty() {
            self.state.emit_no_map_mark(self.state.in_pos);
            self.state.emit(text);
        }
    }

    /// Peeks whether the cursor sits on a newline boundary.
    pub(crate) fn peek_newline(&mut self) -> Result<bool, ParseError> {
        let snap = self.state.snapshot();
        let nl = self.state.read_newline()?;
        snap.revert(&mut self.state);
        Ok(nl)
    }
}

fn parse_version(text: &str) -> Option<(u32, u32)> {
    let (major, minor) = text.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Strips quotes and resolves simple escapes in a scanned string literal.
pub(crate) fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
