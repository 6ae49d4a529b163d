//! Functions, classes, interfaces and class members.
//!
//! `|params|` is the one parameter syntax; it is emitted as `(params)`.
//! Arrow functions are bare `|params| body`, classic functions carry the
//! `function` keyword. Class members share one routine that covers the
//! modifier cascade, accessors, fields, methods, static initializer
//! blocks and constructor parameter properties.

use tabscript_scanner::{IDENTIFIER, NUMBER, STRING};

use crate::{ClassCtx, GroupSpec, PResult, Parser};

impl Parser {
    pub(crate) fn parse_function_impl(p: &mut Parser) -> PResult {
        p.parse_function_with(true)
    }

    /// Functions in declaration or expression position. Only declarations
    /// may be bodiless overload signatures.
    pub(crate) fn parse_function_with(&mut self, declaration: bool) -> PResult {
        let snap = self.state.snapshot();
        let is_async = self.state.read_kw("async");
        if is_async {
            self.state.emit("async");
        }
        if self.state.read_kw("function") {
            self.state.emit("function");
            if self.state.read_lit("*") {
                self.state.emit("*");
            }
            if let Some(name) = self.state.read(&[&IDENTIFIER]) {
                self.state.emit(&name);
            }
            if self.state.peek_lit("<") {
                self.type_level(|p| p.parse_template_params())?;
            }
            let params = self.state.read_lit("|");
            self.must(params, "function")?;
            self.parse_params_emit(None)?;
            self.parse_return_type_opt()?;
            if self.parse_block()? {
                return Ok(true);
            }
            let body = self.state.snapshot();
            self.state.emit("{return");
            if self.parse_expression()? {
                self.state.emit("}");
                return Ok(true);
            }
            body.revert_output(&mut self.state);
            // Bodiless: an overload signature, stripped entirely.
            if declaration {
                snap.revert_output(&mut self.state);
                return Ok(true);
            }
            return Err(self.state.failure("function body"));
        }
        if !self.state.read_lit("|") {
            snap.revert(&mut self.state);
            return Ok(false);
        }
        self.parse_params_emit(None)?;
        if self.state.peek_lit(":") {
            self.type_level(|p| {
                p.state.read_lit(":");
                p.state.emit(":");
                p.must_parse(Self::parse_type, "type")?;
                Ok(true)
            })?;
        }
        self.state.emit("=>");
        if self.state.peek_lit("{") {
            // An object-literal body must be parenthesized.
            self.state.emit("(");
            self.must_parse(Self::parse_object_literal, "object")?;
            self.state.emit(")");
        } else if !self.parse_block()? {
            self.must_parse(Self::parse_expression, "expression")?;
        }
        Ok(true)
    }

    fn parse_return_type_opt(&mut self) -> Result<(), tabscript_scanner::ParseError> {
        if !self.state.peek_lit(":") {
            return Ok(());
        }
        self.type_level(|p| {
            p.state.read_lit(":");
            p.state.emit(":");
            if p.state.read_kw("asserts") {
                p.state.emit("asserts");
            }
            p.must_parse(Self::parse_type, "type")?;
            Ok(true)
        })?;
        Ok(())
    }

    /// Parameter list after the opening `|`, emitted as `(…)`. When
    /// `props` is given (constructor context), visibility-modified
    /// parameter names are collected for `this.x=x;` injection.
    pub(crate) fn parse_params_emit(
        &mut self,
        mut props: Option<&mut Vec<String>>,
    ) -> Result<(), tabscript_scanner::ParseError> {
        self.state.emit("(");
        loop {
            let mut consumed = false;
            if self.state.read_lit("...") {
                self.state.emit("...");
                consumed = true;
            }
            let mut modified = false;
            loop {
                let mut found = false;
                for modifier in ["public", "private", "protected", "readonly"] {
                    if self.state.read_kw(modifier) {
                        self.type_level(|p| {
                            p.state.emit(modifier);
                            Ok(true)
                        })?;
                        found = true;
                        modified = true;
                        consumed = true;
                    }
                }
                if !found {
                    break;
                }
            }
            let Some(name) = self.state.read(&[&IDENTIFIER]) else {
                if consumed {
                    return Err(self.state.failure("parameter"));
                }
                break;
            };
            self.state.emit(&name);
            if modified {
                if let Some(props) = props.as_mut() {
                    props.push(name.clone());
                }
            }
            if self.state.read_lit("?") {
                self.type_level(|p| {
                    p.state.emit("?");
                    Ok(true)
                })?;
            }
            if self.state.peek_lit(":") {
                self.type_level(|p| {
                    p.state.read_lit(":");
                    p.state.emit(":");
                    p.must_parse(Self::parse_type, "type")?;
                    Ok(true)
                })?;
            }
            if self.state.read_lit("=") {
                self.state.emit("=");
                self.must_parse(Self::parse_expression, "expression")?;
            }
            if self.state.read_lit(",") {
                self.state.emit(",");
            } else {
                break;
            }
        }
        let closed = self.state.read_lit("|");
        self.must(closed, "parameters")?;
        self.state.emit(")");
        Ok(())
    }

    // --- Classes ---

    pub(crate) fn parse_class_impl(p: &mut Parser) -> PResult {
        let snap = p.state.snapshot();
        let is_abstract = p.state.read_kw("abstract");
        let interface = if p.state.read_kw("interface") {
            true
        } else if p.state.read_kw("class") {
            false
        } else {
            snap.revert(&mut p.state);
            return Ok(false);
        };
        if is_abstract {
            p.type_level(|p| {
                p.state.emit("abstract");
                Ok(true)
            })?;
        }
        p.state.emit(if interface { "interface" } else { "class" });
        if let Some(name) = p.state.read(&[&IDENTIFIER]) {
            p.state.emit(&name);
        }
        if p.state.peek_lit("<") {
            p.type_level(|p| p.parse_template_params())?;
        }
        let mut derived = false;
        if p.state.read_kw("extends") {
            p.state.emit("extends");
            if interface {
                p.must_parse(Self::parse_type, "type")?;
                while p.state.read_lit(",") {
                    p.state.emit(",");
                    p.must_parse(Self::parse_type, "type")?;
                }
            } else {
                derived = true;
                p.must_parse(Self::parse_expression, "expression")?;
            }
        }
        if p.state.read_kw("implements") {
            p.type_level(|p| {
                p.state.emit("implements");
                p.must_parse(Self::parse_type, "type")?;
                while p.state.read_lit(",") {
                    p.state.emit(",");
                    p.must_parse(Self::parse_type, "type")?;
                }
                Ok(true)
            })?;
        }
        let saved = p.current_class;
        p.current_class = Some(ClassCtx { derived, interface });
        let spec = GroupSpec {
            js_open: "{",
            js_close: "}",
            allow_implicit: true,
            ..Default::default()
        };
        let body = p.parse_group(&spec, |p| p.dispatch("method", Self::parse_method_impl));
        p.current_class = saved;
        if !body? {
            p.state.emit("{}");
        }
        if interface && p.opts.js {
            // Interface members were accumulated speculatively; discard.
            snap.revert_output(&mut p.state);
        }
        Ok(true)
    }

    pub(crate) fn parse_method_impl(p: &mut Parser) -> PResult {
        let Some(ctx) = p.current_class else {
            return Ok(false);
        };
        let member = p.state.snapshot();
        let mut is_abstract = false;
        let mut consumed = false;
        loop {
            if p.state.read_kw("static") {
                consumed = true;
                p.state.emit("static");
                // A static initializer block: `static` directly followed
                // by an indented body.
                if p.parse_block()? {
                    return Ok(true);
                }
                continue;
            }
            if p.state.read_kw("abstract") {
                is_abstract = true;
                consumed = true;
                p.type_level(|p| {
                    p.state.emit("abstract");
                    Ok(true)
                })?;
                continue;
            }
            let mut found = false;
            for modifier in ["public", "private", "protected", "readonly"] {
                if p.state.read_kw(modifier) {
                    p.type_level(|p| {
                        p.state.emit(modifier);
                        Ok(true)
                    })?;
                    found = true;
                    consumed = true;
                }
            }
            if !found {
                break;
            }
        }
        for accessor in ["get", "set"] {
            let got = p.attempt(|p| {
                if p.state.read_kw(accessor) && p.state.peek(&[&IDENTIFIER]).is_some() {
                    p.state.emit(accessor);
                    Ok(true)
                } else {
                    Ok(false)
                }
            })?;
            if got {
                consumed = true;
                break;
            }
        }
        let name = if let Some(n) = p.state.read(&[&IDENTIFIER]) {
            p.state.emit(&n);
            Some(n)
        } else if let Some(n) = p.state.read(&[&STRING]) {
            p.state.emit(&n);
            None
        } else if let Some(n) = p.state.read(&[&NUMBER]) {
            p.state.emit(&n);
            None
        } else if p.state.read_lit("[") {
            p.state.emit("[");
            p.must_parse(Self::parse_expression, "expression")?;
            let closed = p.state.read_lit("]");
            p.must(closed, "member")?;
            p.state.emit("]");
            None
        } else {
            if consumed {
                return Err(p.state.failure("member"));
            }
            return Ok(false);
        };

        if p.state.read_lit("|") {
            let is_ctor = name.as_deref() == Some("constructor");
            let mut props = Vec::new();
            p.parse_params_emit(if is_ctor { Some(&mut props) } else { None })?;
            p.parse_return_type_opt()?;
            if is_ctor {
                let assigns: Vec<String> =
                    props.iter().map(|n| format!("this.{n}={n};")).collect();
                if !p.parse_block_inner(Some((&assigns, ctx.derived)))? {
                    p.state.emit("{");
                    for assign in &assigns {
                        p.state.emit(assign);
                    }
                    p.state.emit("}");
                }
                return Ok(true);
            }
            if ctx.interface {
                p.state.emit(";");
                return Ok(true);
            }
            if is_abstract {
                if p.opts.js {
                    member.revert_output(&mut p.state);
                } else {
                    p.state.emit(";");
                }
                return Ok(true);
            }
            if p.parse_block()? {
                return Ok(true);
            }
            let body = p.state.snapshot();
            p.state.emit("{return");
            if p.parse_expression()? {
                p.state.emit("}");
                return Ok(true);
            }
            body.revert_output(&mut p.state);
            // Overload signature: discarded in both modes.
            member.revert_output(&mut p.state);
            return Ok(true);
        }

        // Field declaration.
        if p.state.read_lit(":") {
            if !p.state.peek_lit("=") {
                let tsnap = p.state.snapshot();
                p.state.emit(":");
                match p.parse_type()? {
                    true => {
                        if p.opts.js {
                            tsnap.revert_output(&mut p.state);
                        }
                    }
                    false => {
                        tsnap.revert_output(&mut p.state);
                    }
                }
            }
            if p.state.read_lit("=") {
                p.state.emit("=");
                p.must_parse(Self::parse_expression, "expression")?;
            }
        } else if p.state.read_lit("=") {
            p.state.emit("=");
            p.must_parse(Self::parse_expression, "expression")?;
        }
        if is_abstract && p.opts.js {
            member.revert_output(&mut p.state);
        } else {
            p.state.emit(";");
        }
        Ok(true)
    }
}
