//! Statement parsing.
//!
//! Statements are dispatched by leading keyword/shape, first match wins.
//! After a non-declaration statement that produced output, a `;` is
//! appended; a statement that produced nothing (type-level in JS mode)
//! clears the stale output target instead, so the next statement maps to
//! its own start.

use serde_json::Value;
use tabscript_scanner::{ErrorKind, ParseError, IDENTIFIER, STRING};

use crate::{unquote, PResult, Parser, StmtClass};

impl Parser {
    pub fn parse_statement(&mut self) -> PResult {
        self.dispatch("statement", Self::parse_statement_impl)
    }

    pub(crate) fn parse_statement_impl(p: &mut Parser) -> PResult {
        let snap = p.state.snapshot();
        let Some(class) = p.parse_statement_kind()? else {
            return Ok(false);
        };
        if snap.has_output(&p.state) {
            if class == StmtClass::Simple {
                p.state.emit(";");
            }
        } else {
            p.state.clear_out_target();
        }
        Ok(true)
    }

    /// Keyword/shape dispatch, in fixed order. Returns the statement class
    /// so the caller can decide about the trailing `;`.
    pub(crate) fn parse_statement_kind(&mut self) -> Result<Option<StmtClass>, ParseError> {
        use StmtClass::{Declaration, Simple};
        if self.dispatch("return", Self::parse_return_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("throw", Self::parse_throw_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("type_decl", Self::parse_type_decl_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("export", Self::parse_export_impl)? {
            let class = self.stmt_class_hint.take().unwrap_or(Simple);
            return Ok(Some(class));
        }
        if self.dispatch("import", Self::parse_import_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("do_while", Self::parse_do_while_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("if_while", Self::parse_if_while_impl)? {
            return Ok(Some(Declaration));
        }
        if self.dispatch("for", Self::parse_for_impl)? {
            return Ok(Some(Declaration));
        }
        if self.dispatch("try", Self::parse_try_impl)? {
            return Ok(Some(Declaration));
        }
        if self.dispatch("function", Self::parse_function_impl)? {
            return Ok(Some(Declaration));
        }
        if self.dispatch("class", Self::parse_class_impl)? {
            return Ok(Some(Declaration));
        }
        if self.dispatch("switch", Self::parse_switch_impl)? {
            return Ok(Some(Declaration));
        }
        if self.dispatch("enum", Self::parse_enum_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("declare", Self::parse_declare_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("var_decl", Self::parse_var_decl_impl)? {
            return Ok(Some(Simple));
        }
        if self.dispatch("expression_seq", Self::parse_expression_seq_impl)? {
            return Ok(Some(Simple));
        }
        Ok(None)
    }

    // --- Simple statements ---

    pub(crate) fn parse_return_impl(p: &mut Parser) -> PResult {
        let kw = if p.state.read_kw("return") {
            "return"
        } else if p.state.read_kw("yield") {
            "yield"
        } else {
            return Ok(false);
        };
        p.state.emit(kw);
        let _ = p.parse_expression()?;
        Ok(true)
    }

    pub(crate) fn parse_throw_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("throw") {
            return Ok(false);
        }
        p.state.emit("throw");
        p.must_parse(Self::parse_expression, "expression")?;
        Ok(true)
    }

    /// `type Name<T> = T or null` — purely type-level.
    pub(crate) fn parse_type_decl_impl(p: &mut Parser) -> PResult {
        let snap = p.state.snapshot();
        if !p.state.read_kw("type") {
            return Ok(false);
        }
        let Some(name) = p.state.read(&[&IDENTIFIER]) else {
            snap.revert(&mut p.state);
            return Ok(false);
        };
        if !p.state.peek_lit("<") && !p.state.peek_lit("=") {
            snap.revert(&mut p.state);
            return Ok(false);
        }
        p.type_level(|p| {
            p.state.emit("type");
            p.state.emit(&name);
            if p.state.peek_lit("<") {
                p.parse_template_params()?;
            }
            let eq = p.state.read_lit("=");
            p.must(eq, "type declaration")?;
            p.state.emit("=");
            p.must_parse(Self::parse_type, "type")?;
            Ok(true)
        })
    }

    pub(crate) fn parse_export_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("export") {
            return Ok(false);
        }
        let pre = p.state.snapshot();
        p.state.emit("export");
        if p.state.read_kw("default") {
            p.state.emit("default");
        }
        let mark = p.state.output().len();
        let inner = p.parse_statement_kind()?;
        p.must(inner.is_some(), "export")?;
        if !p.state.output().has_text_since(mark) {
            // Type-level export in JS mode: drop the `export` itself too.
            pre.revert_output(&mut p.state);
        }
        p.stmt_class_hint = inner;
        Ok(true)
    }

    pub(crate) fn parse_import_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("import") {
            return Ok(false);
        }
        if p.state.peek_kw("plugin") {
            return p.parse_plugin_import();
        }
        p.state.emit("import");
        if let Some(path) = p.state.read(&[&STRING]) {
            p.emit_import_path(&path);
            return Ok(true);
        }
        if p.state.read_lit("*") {
            p.state.emit("*");
            let as_ = p.state.read_kw("as");
            p.must(as_, "import")?;
            p.state.emit("as");
            p.read_emit_ident("import")?;
        } else if p.state.peek_lit("{") {
            p.parse_import_braces()?;
        } else {
            p.read_emit_ident("import")?;
            if p.state.read_lit(",") {
                p.state.emit(",");
                if p.state.read_lit("*") {
                    p.state.emit("*");
                    let as_ = p.state.read_kw("as");
                    p.must(as_, "import")?;
                    p.state.emit("as");
                    p.read_emit_ident("import")?;
                } else {
                    p.parse_import_braces()?;
                }
            }
        }
        let from = p.state.read_kw("from");
        p.must(from, "import")?;
        p.state.emit("from");
        match p.state.read(&[&STRING]) {
            Some(path) => p.emit_import_path(&path),
            None => return Err(p.state.failure("import")),
        }
        Ok(true)
    }

    fn parse_import_braces(&mut self) -> Result<(), ParseError> {
        let spec = crate::GroupSpec {
            open: Some("{"),
            close: Some("}"),
            next: Some(","),
            js_open: "{",
            js_close: "}",
            js_next: ",",
            ..Default::default()
        };
        let parsed = self.parse_group(&spec, |p| {
            let Some(name) = p.state.read(&[&IDENTIFIER]) else {
                return Ok(false);
            };
            p.state.emit(&name);
            if p.state.read_kw("as") {
                p.state.emit("as");
                p.read_emit_ident("import")?;
            }
            Ok(true)
        })?;
        self.must(parsed, "import")
    }

    fn read_emit_ident(&mut self, rule: &str) -> Result<(), ParseError> {
        match self.state.read(&[&IDENTIFIER]) {
            Some(name) => {
                self.state.emit(&name);
                Ok(())
            }
            None => Err(self.state.failure(rule)),
        }
    }

    fn emit_import_path(&mut self, literal: &str) {
        match self.opts.transform_import.clone() {
            Some(transform) => {
                let quote = literal.chars().next().unwrap_or('"');
                let rewritten = transform(&unquote(literal));
                self.state.emit(&format!("{quote}{rewritten}{quote}"));
            }
            None => self.state.emit(literal),
        }
    }

    /// `import plugin "path" {options}` — consumed entirely, no runtime
    /// output; invokes the configured loader.
    fn parse_plugin_import(&mut self) -> PResult {
        let offset = self.state.in_pos;
        self.state.read_kw("plugin");
        let Some(path_lit) = self.state.read(&[&STRING]) else {
            return Err(self.state.failure("plugin import"));
        };
        let path = unquote(&path_lit);
        let mut options = serde_json::Map::new();
        if self.state.peek_lit("{") {
            let osnap = self.state.snapshot();
            self.must_parse(Self::parse_object_literal, "plugin options")?;
            let rendered = osnap.output_since(&self.state);
            osnap.revert_output(&mut self.state);
            match tabscript_plugin::parse_literal(&rendered) {
                Ok(Value::Object(map)) => options = map,
                Ok(other) => {
                    options.insert("value".to_string(), other);
                }
                Err(e) => {
                    return Err(self.plugin_error(offset, e));
                }
            }
        }
        for (key, value) in self.header_flags.clone() {
            options.entry(key).or_insert(value);
        }
        let loader = match self.opts.load_plugin.clone() {
            Some(loader) => loader,
            None => {
                return Err(
                    self.plugin_error(offset, tabscript_plugin::PluginError::NoLoader { path })
                )
            }
        };
        let module = loader(&path).map_err(|e| self.plugin_error(offset, e))?;
        let entry = module.default.clone();
        entry.as_ref()(self, &Value::Object(options)).map_err(|e| self.plugin_error(offset, e))?;
        self.state.clear_out_target();
        Ok(true)
    }

    fn plugin_error(&self, offset: usize, err: tabscript_plugin::PluginError) -> ParseError {
        self.state
            .error_at(ErrorKind::Plugin, offset, err.to_string())
    }

    // --- Control flow ---

    pub(crate) fn parse_do_while_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("do") {
            return Ok(false);
        }
        p.state.emit("do");
        p.parse_body()?;
        if !p.state.read_kw("while") {
            let nl = p.state.read_newline()?;
            let has_while = nl && p.state.read_kw("while");
            p.must(has_while, "do-while")?;
        }
        p.state.emit("while (");
        p.must_parse(Self::parse_expression, "expression")?;
        p.state.emit(")");
        Ok(true)
    }

    pub(crate) fn parse_if_while_impl(p: &mut Parser) -> PResult {
        let head = if p.state.read_kw("if") {
            "if ("
        } else if p.state.read_kw("while") {
            "while ("
        } else {
            return Ok(false);
        };
        p.state.emit(head);
        p.must_parse(Self::parse_expression, "expression")?;
        p.state.emit(")");
        p.parse_body()?;
        if head == "if (" && p.read_kw_allowing_newline("else")? {
            p.state.emit("else");
            p.parse_body()?;
        }
        Ok(true)
    }

    pub(crate) fn parse_for_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("for") {
            return Ok(false);
        }
        // for-of / for-in with an optional inline declaration.
        let idiomatic = p.attempt(|p| {
            p.state.emit("for (");
            if !p.parse_var_decl_with(false, false)? {
                let Some(name) = p.state.read(&[&IDENTIFIER]) else {
                    return Ok(false);
                };
                p.state.emit(&name);
            }
            let kw = if p.state.read_kw("of") {
                "of"
            } else if p.state.read_kw("in") {
                "in"
            } else {
                return Ok(false);
            };
            p.state.emit(kw);
            p.must_parse(Self::parse_expression, "expression")?;
            p.state.emit(")");
            Ok(true)
        })?;
        if !idiomatic {
            // C-style with explicit `;` separators, all parts optional.
            p.state.emit("for (");
            if !p.parse_var_decl_with(true, true)? {
                let _ = p.parse_expression_seq()?;
            }
            let semi = p.state.read_lit(";");
            p.must(semi, "for")?;
            p.state.emit(";");
            let _ = p.parse_expression()?;
            let semi = p.state.read_lit(";");
            p.must(semi, "for")?;
            p.state.emit(";");
            let _ = p.parse_expression_seq()?;
            p.state.emit(")");
        }
        p.parse_body()?;
        Ok(true)
    }

    pub(crate) fn parse_try_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("try") {
            return Ok(false);
        }
        p.state.emit("try");
        p.parse_braced_body()?;
        let mut handled = false;
        if p.read_kw_allowing_newline("catch")? {
            handled = true;
            p.state.emit("catch");
            if let Some(name) = p.state.read(&[&IDENTIFIER]) {
                p.state.emit("(");
                p.state.emit(&name);
                if p.state.peek_lit(":") {
                    p.type_level(|p| {
                        p.state.read_lit(":");
                        p.state.emit(":");
                        p.must_parse(Self::parse_type, "type")?;
                        Ok(true)
                    })?;
                }
                p.state.emit(")");
            }
            p.parse_braced_body()?;
        }
        if p.read_kw_allowing_newline("finally")? {
            handled = true;
            p.state.emit("finally");
            p.parse_braced_body()?;
        }
        if !handled {
            p.state.emit("catch{}");
        }
        Ok(true)
    }

    pub(crate) fn parse_switch_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("switch") {
            return Ok(false);
        }
        p.state.emit("switch (");
        p.must_parse(Self::parse_expression, "expression")?;
        p.state.emit(")");
        let spec = crate::GroupSpec {
            js_open: "{",
            js_close: "}",
            allow_implicit: true,
            ..Default::default()
        };
        let body = p.parse_group(&spec, |p| p.parse_case())?;
        p.must(body, "switch")?;
        Ok(true)
    }

    fn parse_case(&mut self) -> PResult {
        if self.state.read_lit("*") {
            let _ = self.state.read_lit(":");
            self.state.emit("default:");
            self.state.emit("{");
        } else {
            let snap = self.state.snapshot();
            // Pin `case` to the case line; the expression mark would
            // otherwise pull only the expression down there.
            self.state.emit_no_map_mark(self.state.in_pos);
            self.state.emit("case");
            if !self.parse_expression()? {
                snap.revert(&mut self.state);
                return Ok(false);
            }
            let _ = self.state.read_lit(":");
            self.state.emit(":");
            self.state.emit("{");
        }
        if self.state.read_indent()? {
            loop {
                if self.state.read_dedent()? {
                    break;
                }
                self.recover_errors(|p| {
                    let nl = p.state.read_newline()?;
                    p.must(nl, "newline")?;
                    p.must_parse(Self::parse_statement, "statement")
                })?;
            }
        } else {
            self.must_parse(Self::parse_statement, "statement")?;
        }
        self.state.emit("break;}");
        Ok(true)
    }

    pub(crate) fn parse_enum_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("enum") {
            return Ok(false);
        }
        let Some(name) = p.state.read(&[&IDENTIFIER]) else {
            return Err(p.state.failure("enum"));
        };
        if p.opts.js {
            p.state.emit("const");
            p.state.emit(&name);
            p.state.emit("=");
            p.state.emit("{");
        } else {
            p.state.emit("enum");
            p.state.emit(&name);
            p.state.emit("{");
        }
        let opened = p.state.read_indent()?;
        p.must(opened, "enum")?;
        let mut counter: i64 = 0;
        let mut first = true;
        loop {
            if p.state.read_dedent()? {
                break;
            }
            let nl = p.state.read_newline()?;
            p.must(nl, "newline")?;
            let Some(member) = p.state.read(&[&IDENTIFIER]) else {
                return Err(p.state.failure("enum member"));
            };
            if !first {
                p.state.emit(",");
            }
            first = false;
            p.state.emit(&member);
            if p.opts.js {
                p.state.emit(":");
                if p.state.read_lit("=") {
                    p.must_parse(Self::parse_expression, "expression")?;
                } else {
                    p.state.emit(&counter.to_string());
                    counter += 1;
                }
            } else if p.state.read_lit("=") {
                p.state.emit("=");
                p.must_parse(Self::parse_expression, "expression")?;
            }
        }
        p.emit_close("}");
        Ok(true)
    }

    /// `declare …` ambient declarations are consumed and fully stripped.
    pub(crate) fn parse_declare_impl(p: &mut Parser) -> PResult {
        if !p.state.read_kw("declare") {
            return Ok(false);
        }
        let snap = p.state.snapshot();
        let inner = p.parse_statement_kind()?;
        p.must(inner.is_some(), "declare")?;
        snap.revert_output(&mut p.state);
        p.stmt_class_hint = None;
        Ok(true)
    }

    // --- Declarations / fallback ---

    pub(crate) fn parse_var_decl_impl(p: &mut Parser) -> PResult {
        p.parse_var_decl_with(true, true)
    }

    /// `name :` declares a `const`, `name ::` a `let`; optional type
    /// annotation (TS only) and, when `allow_init`, an initializer.
    pub(crate) fn parse_var_decl_with(&mut self, allow_init: bool, allow_type: bool) -> PResult {
        let snap = self.state.snapshot();
        let Some(name) = self.state.read(&[&IDENTIFIER]) else {
            return Ok(false);
        };
        if !self.state.read_lit(":") {
            snap.revert(&mut self.state);
            return Ok(false);
        }
        let is_let = self.state.read_lit(":");
        self.state.emit(if is_let { "let" } else { "const" });
        self.state.emit(&name);
        if allow_type && !self.state.peek_lit("=") {
            let tsnap = self.state.snapshot();
            self.state.emit(":");
            match self.parse_type()? {
                true => {
                    if self.opts.js {
                        tsnap.revert_output(&mut self.state);
                    }
                }
                false => {
                    tsnap.revert_output(&mut self.state);
                }
            }
        }
        if allow_init && self.state.read_lit("=") {
            self.state.emit("=");
            self.must_parse(Self::parse_expression, "expression")?;
        }
        Ok(true)
    }

    pub fn parse_expression_seq(&mut self) -> PResult {
        self.dispatch("expression_seq", Self::parse_expression_seq_impl)
    }

    pub(crate) fn parse_expression_seq_impl(p: &mut Parser) -> PResult {
        if !p.parse_expression()? {
            return Ok(false);
        }
        while p.state.read_lit(",") {
            p.state.emit(",");
            p.must_parse(Self::parse_expression, "expression")?;
        }
        Ok(true)
    }

    // --- Bodies & blocks ---

    pub fn parse_block(&mut self) -> PResult {
        self.dispatch("block", Self::parse_block_impl)
    }

    pub(crate) fn parse_block_impl(p: &mut Parser) -> PResult {
        p.parse_block_inner(None)
    }

    /// INDENT-delimited statement list emitted as `{…}`. For constructor
    /// bodies, parameter-property assignments are injected at the start,
    /// or after a leading `super(…)` call in derived classes.
    pub(crate) fn parse_block_inner(&mut self, inject: Option<(&[String], bool)>) -> PResult {
        if !self.state.read_indent()? {
            return Ok(false);
        }
        self.state.emit("{");
        let mut injected = false;
        if let Some((assigns, derived)) = inject {
            if !derived {
                for assign in assigns {
                    self.state.emit(assign);
                }
                injected = true;
            }
        }
        loop {
            if self.state.read_dedent()? {
                break;
            }
            let stmt_mark = self.state.output().len();
            self.recover_errors(|p| {
                let nl = p.state.read_newline()?;
                p.must(nl, "newline")?;
                p.must_parse(Self::parse_statement, "statement")
            })?;
            if let Some((assigns, true)) = inject {
                if !injected && self.state.output().text_since(stmt_mark).starts_with("super") {
                    for assign in assigns {
                        self.state.emit(assign);
                    }
                    injected = true;
                }
            }
        }
        if let Some((assigns, true)) = inject {
            if !injected {
                for assign in assigns {
                    self.state.emit(assign);
                }
            }
        }
        self.emit_close("}");
        Ok(true)
    }

    /// Block body, or a bare single statement on the same line.
    pub(crate) fn parse_body(&mut self) -> Result<(), ParseError> {
        if self.parse_block()? {
            return Ok(());
        }
        self.must_parse(Self::parse_statement, "statement")
    }

    /// Body that must render inside braces even for a single statement
    /// (`try`/`catch`/`finally`).
    pub(crate) fn parse_braced_body(&mut self) -> Result<(), ParseError> {
        if self.parse_block()? {
            return Ok(());
        }
        self.state.emit("{");
        self.must_parse(Self::parse_statement, "statement")?;
        self.state.emit("}");
        Ok(())
    }

    /// Reads a keyword on this line, or after the line break (for `else`,
    /// `catch`, `while` continuations).
    pub(crate) fn read_kw_allowing_newline(&mut self, kw: &str) -> Result<bool, ParseError> {
        if self.state.read_kw(kw) {
            return Ok(true);
        }
        let snap = self.state.snapshot();
        if self.state.read_newline()? && self.state.read_kw(kw) {
            return Ok(true);
        }
        snap.revert(&mut self.state);
        Ok(false)
    }
}
