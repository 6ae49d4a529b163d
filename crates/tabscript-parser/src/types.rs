//! Type grammar.
//!
//! Types are parsed like everything else and emitted as they are read; the
//! caller decides whether the output survives (TS mode) or is reverted
//! (JS mode). `or`/`and` become `|`/`&`, and the function-type return `:`
//! becomes `=>`.

use tabscript_scanner::{IDENTIFIER, NUMBER, STRING};

use crate::{GroupSpec, PResult, Parser};

impl Parser {
    pub fn parse_type(&mut self) -> PResult {
        self.dispatch("type", Self::parse_type_impl)
    }

    pub(crate) fn parse_type_impl(p: &mut Parser) -> PResult {
        if p.state.read_kw("typeof") {
            p.state.emit("typeof");
            match p.state.read(&[&IDENTIFIER]) {
                Some(name) => p.state.emit(&name),
                None => return Err(p.state.failure("type")),
            }
            while p.state.read_lit(".") {
                p.state.emit(".");
                match p.state.read(&[&IDENTIFIER]) {
                    Some(name) => p.state.emit(&name),
                    None => return Err(p.state.failure("type")),
                }
            }
        } else if p.state.read_kw("keyof") {
            p.state.emit("keyof");
            p.must_parse(Self::parse_type, "type")?;
            return Ok(true);
        } else if !p.parse_type_primary()? {
            return Ok(false);
        }
        p.parse_type_postfix()?;
        Ok(true)
    }

    fn parse_type_primary(&mut self) -> PResult {
        if self.state.read_lit("(") {
            self.state.emit("(");
            self.must_parse(Self::parse_type, "type")?;
            let closed = self.state.read_lit(")");
            self.must(closed, "type")?;
            self.state.emit(")");
            return Ok(true);
        }
        if self.parse_object_type()? {
            return Ok(true);
        }
        let tuple = GroupSpec {
            open: Some("["),
            close: Some("]"),
            next: Some(","),
            js_open: "[",
            js_close: "]",
            js_next: ",",
            ..Default::default()
        };
        if self.parse_group(&tuple, |p| p.parse_type())? {
            return Ok(true);
        }
        if self.state.read_lit("|") {
            // Function type: `|params|: T` becomes `(params)=>T`.
            self.parse_params_emit(None)?;
            let colon = self.state.read_lit(":");
            self.must(colon, "type")?;
            self.state.emit("=>");
            self.must_parse(Self::parse_type, "type")?;
            return Ok(true);
        }
        if let Some(s) = self.state.read(&[&STRING]) {
            self.state.emit(&s);
            return Ok(true);
        }
        if let Some(n) = self.state.read(&[&NUMBER]) {
            self.state.emit(&n);
            return Ok(true);
        }
        if let Some(name) = self.state.read(&[&IDENTIFIER]) {
            self.state.emit(&name);
            if self.state.read_lit("<") {
                self.state.emit("<");
                let args = self.template_type_args()?;
                self.must(args, "type")?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn parse_object_type(&mut self) -> PResult {
        let spec = GroupSpec {
            open: Some("{"),
            close: Some("}"),
            next: Some(","),
            js_open: "{",
            js_close: "}",
            js_next: ",",
            ..Default::default()
        };
        self.parse_group(&spec, |p| {
            let Some(key) = p.state.read(&[&IDENTIFIER]) else {
                return Ok(false);
            };
            p.state.emit(&key);
            if p.state.read_lit("?") {
                p.state.emit("?");
            }
            let colon = p.state.read_lit(":");
            p.must(colon, "type member")?;
            p.state.emit(":");
            p.must_parse(Self::parse_type, "type")?;
            Ok(true)
        })
    }

    /// Comma-separated type list closed by `>`; shared with the
    /// expression-side template-argument disambiguation.
    pub(crate) fn template_type_args(&mut self) -> PResult {
        if !self.parse_type()? {
            return Ok(false);
        }
        while self.state.read_lit(",") {
            self.state.emit(",");
            if !self.parse_type()? {
                return Ok(false);
            }
        }
        if !self.state.read_lit(">") {
            return Ok(false);
        }
        self.state.emit(">");
        Ok(true)
    }

    fn parse_type_postfix(&mut self) -> Result<(), tabscript_scanner::ParseError> {
        loop {
            if self.state.read_lit("[") {
                self.state.emit("[");
                let _ = self.parse_type()?;
                let closed = self.state.read_lit("]");
                self.must(closed, "type")?;
                self.state.emit("]");
                continue;
            }
            if self.state.read_kw("or") {
                self.state.emit("|");
                self.must_parse(Self::parse_type, "type")?;
                continue;
            }
            if self.state.read_kw("and") {
                self.state.emit("&");
                self.must_parse(Self::parse_type, "type")?;
                continue;
            }
            if self.state.read_kw("extends") {
                // Conditional type: T extends U ? A : B.
                self.state.emit("extends");
                self.must_parse(Self::parse_type, "type")?;
                let q = self.state.read_lit("?");
                self.must(q, "conditional type")?;
                self.state.emit("?");
                self.must_parse(Self::parse_type, "type")?;
                let colon = self.state.read_lit(":");
                self.must(colon, "conditional type")?;
                self.state.emit(":");
                self.must_parse(Self::parse_type, "type")?;
                continue;
            }
            if self.state.read_kw("is") {
                // Type predicate in a return-type position.
                self.state.emit("is");
                self.must_parse(Self::parse_type, "type")?;
                continue;
            }
            break;
        }
        Ok(())
    }

    /// Declaration-site template parameters: `<T, U extends X>`.
    pub(crate) fn parse_template_params(&mut self) -> PResult {
        if !self.state.read_lit("<") {
            return Ok(false);
        }
        self.state.emit("<");
        loop {
            match self.state.read(&[&IDENTIFIER]) {
                Some(name) => self.state.emit(&name),
                None => return Err(self.state.failure("template parameter")),
            }
            if self.state.read_kw("extends") {
                self.state.emit("extends");
                self.must_parse(Self::parse_type, "type")?;
            }
            if self.state.read_lit(",") {
                self.state.emit(",");
            } else {
                break;
            }
        }
        let closed = self.state.read_lit(">");
        self.must(closed, "template parameters")?;
        self.state.emit(">");
        Ok(true)
    }
}
