//! Generic delimited / indent-implicit list parsing.
//!
//! One engine handles every bracketed or indented construct: argument
//! lists, array and object literals, class bodies, switch cases. The
//! source-side delimiters (`open`/`next`/`close`) are decoupled from the
//! emitted ones (`js_open`/`js_next`/`js_close`), which is how `|params|`
//! becomes `(params)` and an indented body becomes `{…}`.

use tabscript_scanner::Snapshot;

use crate::{PResult, Parser};

/// Options for [`Parser::parse_group`].
#[derive(Debug, Clone, Copy)]
pub struct GroupSpec<'a> {
    /// Source opening delimiter; `None` means indent-only.
    pub open: Option<&'a str>,
    /// Source closing delimiter.
    pub close: Option<&'a str>,
    /// Source item separator; a newline always separates in indented form.
    pub next: Option<&'a str>,
    pub js_open: &'a str,
    pub js_close: &'a str,
    pub js_next: &'a str,
    /// Whether an INDENT may open the group when `open` is absent.
    pub allow_implicit: bool,
    /// When false, a trailing implicit separator is reverted from output.
    pub end_next: bool,
}

impl Default for GroupSpec<'_> {
    fn default() -> Self {
        Self {
            open: None,
            close: None,
            next: None,
            js_open: "",
            js_close: "",
            js_next: "",
            allow_implicit: false,
            end_next: true,
        }
    }
}

impl Parser {
    /// Parses a group per `spec`, calling `item` for each element. Returns
    /// `Ok(false)` without consuming anything if the group does not open.
    pub fn parse_group(
        &mut self,
        spec: &GroupSpec<'_>,
        mut item: impl FnMut(&mut Parser) -> PResult,
    ) -> PResult {
        let mut indented = false;
        let mut opened = false;
        if let Some(open) = spec.open {
            if self.state.read_lit(open) {
                opened = true;
                self.state.emit(spec.js_open);
                if self.state.read_indent()? {
                    indented = true;
                }
            }
        }
        if !opened {
            if spec.allow_implicit && self.state.read_indent()? {
                indented = true;
                self.state.emit(spec.js_open);
            } else {
                return Ok(false);
            }
        }

        let mut dangling: Option<Snapshot> = None;
        loop {
            if !item(self)? {
                break;
            }
            dangling = None;
            let mut separated = false;
            if let Some(next) = spec.next {
                if self.state.read_lit(next) {
                    self.state.emit(spec.js_next);
                    separated = true;
                    if indented {
                        let _ = self.state.read_newline()?;
                    }
                }
            }
            if !separated && indented {
                let snap = self.state.snapshot();
                if self.state.read_newline()? {
                    self.state.emit(spec.js_next);
                    separated = true;
                    dangling = Some(snap);
                }
            }
            if !separated {
                break;
            }
        }
        if let Some(snap) = dangling {
            if !spec.end_next {
                snap.revert_output(&mut self.state);
            }
        }

        if indented {
            let closed = self.state.read_dedent()?;
            self.must(closed, "group")?;
        }
        if let Some(close) = spec.close {
            self.state.clear_out_target();
            let closed = self.state.read_lit(close);
            self.must(closed, "group")?;
            self.state.emit(spec.js_close);
        } else {
            self.emit_close(spec.js_close);
        }
        Ok(true)
    }
}
