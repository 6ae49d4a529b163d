//! Named sticky patterns.
//!
//! A [`Pattern`] is a regex anchored to the current scan position. Matching
//! is done against `&input[pos..]`, so the `\A` anchor gives sticky
//! semantics without scanning ahead and without per-call allocation. The
//! display name stands in for the raw regex source in error messages.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A sticky regex with a descriptive name.
pub struct Pattern {
    re: Regex,
    name: String,
}

impl Pattern {
    /// Compiles `source` anchored at the scan position.
    ///
    /// Panics if `source` is not a valid regex; patterns are fixed at
    /// construction time, so an invalid one is a programming error.
    pub fn new(source: &str, name: &str) -> Self {
        let anchored = format!(r"\A(?:{source})");
        let re = Regex::new(&anchored)
            .unwrap_or_else(|e| panic!("invalid pattern {name}: {e}"));
        Self { re, name: name.to_string() }
    }

    /// The display name used in expected-token lists.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Matches at exactly `pos`, returning the matched slice.
    pub fn find_at<'i>(&self, input: &'i str, pos: usize) -> Option<&'i str> {
        self.re.find(&input[pos..]).map(|m| m.as_str())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern").field("name", &self.name).finish()
    }
}

/// Horizontal whitespace with an optional `#` line comment. Never crosses a
/// newline.
pub static WHITESPACE: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::new(r"[ \t\r]*(?:#[^\n]*)?", "whitespace"));

pub static IDENTIFIER: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::new(r"[A-Za-z_$][0-9A-Za-z_$]*", "an identifier"));

pub static STRING: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(r#"'(?:[^'\\\n]|\\.)*'|"(?:[^"\\\n]|\\.)*""#, "a string")
});

pub static NUMBER: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(
        r"[+\-]?(?:0[xX][0-9a-fA-F]+|0[oO][0-7]+|0[bB][01]+|(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+\-]?[0-9]+)?)",
        "a number",
    )
});

pub static INTEGER: LazyLock<Pattern> =
    LazyLock::new(|| Pattern::new(r"[0-9]+", "an integer"));

/// Binary operators. Word operators require a non-word follow-up character
/// (`\b`), so `inward` never matches `in`. Percent-named operators such as
/// `%mod` or `%bit_or` are matched whole and translated by the parser.
pub static OPERATOR: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(
        r"(?:\*\*=?|\+=|-=|\*=|/=|==|!=|=~|!~|<=|>=|%[A-Za-z_][0-9A-Za-z_]*|[+\-*/=<>]|(?:and|or|in|instanceof)\b)",
        "an operator",
    )
});

/// Consumes backtick-string body text up to the next `${`, the closing
/// backtick, or an edge the scanner resolves itself (`$` before `{`).
pub static WITHIN_BACKTICK_STRING: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(r"(?s)(?:\\.|\$[^{`\\]|[^`$\\])*", "string text")
});

/// Unary/prefix operators.
pub static EXPRESSION_PREFIX: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(
        r"(?:\+\+|--|!|\+|-|(?:typeof|delete|await|new)\b)",
        "a prefix operator",
    )
});

/// JavaScript regex literal with flags.
pub static REGEXP: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(
        r"/(?:[^/\\\n\[]|\\.|\[(?:[^\]\\\n]|\\.)*\])+/[a-zA-Z]*",
        "a regexp",
    )
});

/// True if `c` can appear in an identifier; keyword reads require the
/// character after the literal to fail this test.
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
