//! Expression parsing.
//!
//! Prefix loop, primary alternation, postfix loop, then the trailing `?`
//! which is either a ternary head or the `!=null` nullish-test shorthand.
//! Precedence is flat left-to-right: the emitted target language re-parses
//! with its own precedence, and the source uses the same operator
//! spellings, so nothing is lost.

use tabscript_scanner::{
    ErrorKind, ParseError, EXPRESSION_PREFIX, IDENTIFIER, NUMBER, OPERATOR, REGEXP, STRING,
    WITHIN_BACKTICK_STRING,
};

use crate::{GroupSpec, PResult, Parser};

/// Operator substitutions applied in both output modes. Unknown
/// percent-named operators are rejected.
fn map_operator(op: &str) -> Option<&str> {
    Some(match op {
        "or" => "||",
        "and" => "&&",
        "==" => "===",
        "!=" => "!==",
        "=~" => "==",
        "!~" => "!=",
        "%mod" => "%",
        "%bit_or" => "|",
        "%bit_and" => "&",
        "%bit_xor" => "^",
        "%shift_left" => "<<",
        "%shift_right" => ">>",
        "%unsigned_shift_right" => ">>>",
        other if other.starts_with('%') => return None,
        other => other,
    })
}

impl Parser {
    pub fn parse_expression(&mut self) -> PResult {
        self.dispatch("expression", Self::parse_expression_impl)
    }

    pub(crate) fn parse_expression_impl(p: &mut Parser) -> PResult {
        let snap = p.state.snapshot();
        let mut prefixed = false;
        loop {
            if p.state.read_kw("%bit_not") {
                p.state.emit("~");
                prefixed = true;
                continue;
            }
            match p.state.read(&[&EXPRESSION_PREFIX]) {
                Some(op) => {
                    p.state.emit(&op);
                    prefixed = true;
                }
                None => break,
            }
        }
        if !p.parse_primary()? {
            if prefixed {
                snap.revert(&mut p.state);
            }
            return Ok(false);
        }
        p.parse_postfix()?;
        p.parse_ternary_tail()?;
        Ok(true)
    }

    fn parse_primary(&mut self) -> PResult {
        if self.dispatch("class", Self::parse_class_impl)? {
            return Ok(true);
        }
        if self.parse_function_with(false)? {
            return Ok(true);
        }
        if let Some(name) = self.state.read(&[&IDENTIFIER]) {
            self.state.emit(&name);
            return Ok(true);
        }
        if self.parse_array_literal()? {
            return Ok(true);
        }
        if Self::parse_object_literal(self)? {
            return Ok(true);
        }
        if let Some(s) = self.state.read(&[&STRING]) {
            self.state.emit(&s);
            return Ok(true);
        }
        if self.parse_backtick()? {
            return Ok(true);
        }
        if let Some(n) = self.state.read(&[&NUMBER]) {
            self.state.emit(&n);
            return Ok(true);
        }
        if self.parse_paren_seq()? {
            return Ok(true);
        }
        if let Some(r) = self.state.read(&[&REGEXP]) {
            self.state.emit(&r);
            return Ok(true);
        }
        Ok(false)
    }

    fn parse_postfix(&mut self) -> Result<(), ParseError> {
        loop {
            // Call parens bind only without a preceding space; `f (x)`
            // is `f` followed by a parenthesized expression elsewhere.
            if self.state.in_pos == self.state.last_token_end && self.state.peek_lit("(") {
                self.parse_call_args()?;
                continue;
            }
            if self.state.read_lit("..") {
                self.parse_dotdot_args()?;
                continue;
            }
            if self.state.peek_lit("`") {
                // Tagged template.
                self.must_parse(|p| p.parse_backtick(), "string")?;
                continue;
            }
            if self.state.read_lit("[") {
                self.state.emit("[");
                self.must_parse(Self::parse_expression, "expression")?;
                let closed = self.state.read_lit("]");
                self.must(closed, "index")?;
                self.state.emit("]");
                continue;
            }
            if self.state.read_lit("++") {
                self.state.emit("++");
                continue;
            }
            if self.state.read_lit("--") {
                self.state.emit("--");
                continue;
            }
            if self.state.read_kw("as") {
                self.type_level(|p| {
                    p.state.emit("as");
                    p.must_parse(Self::parse_type, "type")?;
                    Ok(true)
                })?;
                continue;
            }
            if self.state.read_lit("?.") {
                self.state.emit("?.");
                if self.state.read_lit("[") {
                    self.state.emit("[");
                    self.must_parse(Self::parse_expression, "expression")?;
                    let closed = self.state.read_lit("]");
                    self.must(closed, "index")?;
                    self.state.emit("]");
                } else {
                    match self.state.read(&[&IDENTIFIER]) {
                        Some(name) => self.state.emit(&name),
                        None => return Err(self.state.failure("member access")),
                    }
                }
                continue;
            }
            if self.state.read_lit(".") {
                self.state.emit(".");
                match self.state.read(&[&IDENTIFIER]) {
                    Some(name) => self.state.emit(&name),
                    None => return Err(self.state.failure("member access")),
                }
                continue;
            }
            if self.state.peek_lit("<") && self.try_template_args()? {
                continue;
            }
            if let Some(op) = self.state.read(&[&OPERATOR]) {
                let mapped = map_operator(&op).ok_or_else(|| {
                    self.state.error_at(
                        ErrorKind::Syntax,
                        self.state.in_pos,
                        format!("Unknown operator {op}"),
                    )
                })?;
                self.state.emit(mapped);
                self.must_parse(Self::parse_expression, "expression")?;
                continue;
            }
            if self.state.read_lit("!") {
                // Non-null assertion, type-level.
                self.type_level(|p| {
                    p.state.emit("!");
                    Ok(true)
                })?;
                continue;
            }
            break;
        }
        Ok(())
    }

    /// Trailing `?`: ternary when an expression follows, otherwise the
    /// nullish test shorthand `!=null`.
    fn parse_ternary_tail(&mut self) -> Result<(), ParseError> {
        if !self.state.read_lit("?") {
            return Ok(());
        }
        let snap = self.state.snapshot();
        self.state.emit("?");
        if self.parse_expression()? {
            let colon = self.state.read_lit(":");
            self.must(colon, "ternary")?;
            self.state.emit(":");
            self.must_parse(Self::parse_expression, "expression")?;
        } else {
            snap.revert_output(&mut self.state);
            self.state.emit("!=null");
        }
        Ok(())
    }

    // --- Literals ---

    fn parse_array_literal(&mut self) -> PResult {
        let spec = GroupSpec {
            open: Some("["),
            close: Some("]"),
            next: Some(","),
            js_open: "[",
            js_close: "]",
            js_next: ",",
            ..Default::default()
        };
        self.parse_group(&spec, |p| p.parse_spread_or_expression())
    }

    pub(crate) fn parse_object_literal(p: &mut Parser) -> PResult {
        let spec = GroupSpec {
            open: Some("{"),
            close: Some("}"),
            next: Some(","),
            js_open: "{",
            js_close: "}",
            js_next: ",",
            ..Default::default()
        };
        p.parse_group(&spec, |p| p.parse_object_member())
    }

    fn parse_object_member(&mut self) -> PResult {
        if self.state.read_lit("...") {
            self.state.emit("...");
            self.must_parse(Self::parse_expression, "expression")?;
            return Ok(true);
        }
        if let Some(key) = self.state.read(&[&IDENTIFIER]) {
            self.state.emit(&key);
        } else if let Some(key) = self.state.read(&[&NUMBER]) {
            self.state.emit(&key);
        } else if let Some(key) = self.state.read(&[&STRING]) {
            self.state.emit(&key);
        } else if self.state.peek_lit("`") {
            // Backtick keys are emitted as computed keys.
            self.state.emit("[");
            self.must_parse(|p| p.parse_backtick(), "string")?;
            self.state.emit("]");
        } else if self.state.read_lit("[") {
            self.state.emit("[");
            self.must_parse(Self::parse_expression, "expression")?;
            let closed = self.state.read_lit("]");
            self.must(closed, "key")?;
            self.state.emit("]");
        } else {
            return Ok(false);
        }
        if self.state.read_lit(":") {
            self.state.emit(":");
            self.must_parse(Self::parse_expression, "expression")?;
        } else if self.state.read_lit("|") {
            // Method shorthand.
            self.parse_params_emit(None)?;
            if self.state.peek_lit(":") {
                self.type_level(|p| {
                    p.state.read_lit(":");
                    p.state.emit(":");
                    p.must_parse(Self::parse_type, "type")?;
                    Ok(true)
                })?;
            }
            if !self.parse_block()? {
                self.state.emit("{return");
                self.must_parse(Self::parse_expression, "expression")?;
                self.state.emit("}");
            }
        }
        // Bare key: shorthand property.
        Ok(true)
    }

    fn parse_paren_seq(&mut self) -> PResult {
        let spec = GroupSpec {
            open: Some("("),
            close: Some(")"),
            next: Some(","),
            js_open: "(",
            js_close: ")",
            js_next: ",",
            end_next: false,
            ..Default::default()
        };
        self.parse_group(&spec, |p| p.parse_expression())
    }

    fn parse_call_args(&mut self) -> Result<(), ParseError> {
        let spec = GroupSpec {
            open: Some("("),
            close: Some(")"),
            next: Some(","),
            js_open: "(",
            js_close: ")",
            js_next: ",",
            end_next: false,
            ..Default::default()
        };
        let parsed = self.parse_group(&spec, |p| p.parse_spread_or_expression())?;
        self.must(parsed, "arguments")
    }

    /// `..` call syntax: an indented argument group, or whitespace
    /// separated arguments on the same line, all emitted comma separated.
    fn parse_dotdot_args(&mut self) -> Result<(), ParseError> {
        let spec = GroupSpec {
            js_open: "(",
            js_close: ")",
            js_next: ",",
            allow_implicit: true,
            end_next: false,
            ..Default::default()
        };
        if self.parse_group(&spec, |p| p.parse_spread_or_expression())? {
            return Ok(());
        }
        self.state.emit("(");
        if self.parse_spread_or_expression()? {
            loop {
                let snap = self.state.snapshot();
                self.state.emit(",");
                if !self.parse_spread_or_expression()? {
                    snap.revert(&mut self.state);
                    break;
                }
            }
        }
        self.state.emit(")");
        Ok(())
    }

    pub(crate) fn parse_spread_or_expression(&mut self) -> PResult {
        if self.state.read_lit("...") {
            self.state.emit("...");
            self.must_parse(Self::parse_expression, "expression")?;
            return Ok(true);
        }
        self.parse_expression()
    }

    // --- Backtick strings ---

    /// Backtick string with `${…}` interpolation; re-entrant, so nested
    /// backtick strings inside interpolations work.
    ///
    /// The pieces are parsed and emitted normally, then collapsed into one
    /// output token via snapshot/revertOutput: the renderer applies
    /// separator rules between tokens, and those must never touch string
    /// content.
    pub(crate) fn parse_backtick(&mut self) -> PResult {
        let snap = self.state.snapshot();
        if !self.parse_backtick_pieces()? {
            return Ok(false);
        }
        let tokens = snap.revert_output(&mut self.state);
        if self.state.out_target().is_none() {
            // Keep the template anchored at its opening backtick.
            if let Some(tabscript_scanner::OutToken::Mark { offset, .. }) = tokens.first() {
                self.state.emit_map_mark(*offset);
            }
        }
        let mut combined = String::new();
        for token in &tokens {
            if let tabscript_scanner::OutToken::Text(text) = token {
                // Word fusion can still happen inside an interpolation
                // (`${typeof x}`); guard it here since the renderer no
                // longer sees the seams.
                let fuses = combined
                    .chars()
                    .last()
                    .zip(text.chars().next())
                    .is_some_and(|(a, b)| {
                        tabscript_scanner::is_word_char(a) && tabscript_scanner::is_word_char(b)
                    });
                if fuses {
                    combined.push(' ');
                }
                combined.push_str(text);
            }
        }
        self.state.emit(&combined);
        Ok(true)
    }

    fn parse_backtick_pieces(&mut self) -> PResult {
        if !self.state.read_lit_raw("`") {
            return Ok(false);
        }
        self.state.emit("`");
        loop {
            if let Some(text) = self.state.read_raw(&[&WITHIN_BACKTICK_STRING]) {
                if !text.is_empty() {
                    self.state.emit(&text);
                }
            }
            if self.state.read_lit("${") {
                self.state.emit("${");
                self.must_parse(Self::parse_expression, "expression")?;
                let closed = self.state.read_lit_raw("}");
                self.must(closed, "string")?;
                self.state.emit("}");
            } else if self.state.read_lit("`") {
                self.state.emit("`");
                return Ok(true);
            } else if self.state.read_lit_raw("$") {
                self.state.emit("$");
            } else {
                return Err(self.state.failure("string"));
            }
        }
    }

    // --- Template arguments ---

    /// Speculative `<T, U>` after a primary. Commits only when the next
    /// observable token is `.`, `(` or a newline; otherwise the `<` is
    /// left to be read as less-than. `a<b>+c` therefore parses as
    /// comparisons, by design.
    fn try_template_args(&mut self) -> PResult {
        let snap = self.state.snapshot();
        if !self.state.read_lit("<") {
            return Ok(false);
        }
        self.state.emit("<");
        if !self.template_type_args()? {
            snap.revert(&mut self.state);
            return Ok(false);
        }
        let commit =
            self.state.peek_lit(".") || self.state.peek_lit("(") || self.peek_newline()?;
        if !commit {
            snap.revert(&mut self.state);
            return Ok(false);
        }
        if self.opts.js {
            snap.revert_output(&mut self.state);
        }
        Ok(true)
    }
}
