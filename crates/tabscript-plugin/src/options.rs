//! Literal-value evaluator for plugin options.
//!
//! `import plugin "path" {…}` captures the option object's rendered source
//! and interprets it as a value. The rendered form is JavaScript, not JSON:
//! keys are bare identifiers and strings may be single-quoted, so
//! `serde_json::from_str` alone does not cut it. This evaluator accepts
//! exactly the literal subset: objects, arrays, numbers, strings, booleans
//! and null.

use serde_json::{Map, Number, Value};

use crate::PluginError;

struct Cursor<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn skip_ws(&mut self) {
        while self.src[self.pos..].starts_with(|c: char| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, lit: char) -> bool {
        if self.peek() == Some(lit) {
            self.pos += lit.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, what: &str) -> PluginError {
        PluginError::InvalidOptions {
            detail: format!("{what} at offset {} in `{}`", self.pos, self.src),
        }
    }

    fn value(&mut self) -> Result<Value, PluginError> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some('\'') | Some('"') => Ok(Value::String(self.string()?)),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.number(),
            Some(_) => self.word(),
            None => Err(self.error("expected a value")),
        }
    }

    fn object(&mut self) -> Result<Value, PluginError> {
        self.eat('{');
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let key = match self.peek() {
                Some('\'') | Some('"') => self.string()?,
                _ => self.identifier()?,
            };
            self.skip_ws();
            if !self.eat(':') {
                return Err(self.error("expected ':' after key"));
            }
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            if !self.eat(',') && self.peek() != Some('}') {
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }

    fn array(&mut self) -> Result<Value, PluginError> {
        self.eat('[');
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            if !self.eat(',') && self.peek() != Some(']') {
                return Err(self.error("expected ',' or ']'"));
            }
        }
    }

    fn string(&mut self) -> Result<String, PluginError> {
        let quote = self.peek().unwrap_or('"');
        self.eat(quote);
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += c.len_utf8();
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                let esc = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
                self.pos += esc.len_utf8();
                out.push(match esc {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            } else {
                out.push(c);
            }
        }
    }

    fn identifier(&mut self) -> Result<String, PluginError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a key"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn number(&mut self) -> Result<Value, PluginError> {
        let start = self.pos;
        if self.peek() == Some('-') || self.peek() == Some('+') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+' | 'x' | 'a'..='f' | 'A'..='F' | 'o' | 'b'))
        {
            self.pos += 1;
        }
        let text = self.src[start..self.pos].trim_start_matches('+');
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            let n = i64::from_str_radix(hex, 16)
                .map_err(|_| self.error("invalid hex number"))?;
            return Ok(Value::Number(n.into()));
        }
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        let f: f64 = text.parse().map_err(|_| self.error("invalid number"))?;
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| self.error("non-finite number"))
    }

    fn word(&mut self) -> Result<Value, PluginError> {
        let word = self.identifier()?;
        match word.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            _ => Err(self.error("expected a literal value")),
        }
    }
}

/// Evaluates rendered literal source to a value. Empty or blank input
/// yields an empty options object.
pub fn parse_literal(src: &str) -> Result<Value, PluginError> {
    let mut cursor = Cursor { src, pos: 0 };
    cursor.skip_ws();
    if cursor.peek().is_none() {
        return Ok(Value::Object(Map::new()));
    }
    let value = cursor.value()?;
    cursor.skip_ws();
    if cursor.peek().is_some() {
        return Err(cursor.error("trailing characters"));
    }
    Ok(value)
}
