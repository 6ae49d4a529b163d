//! TabScript transpiler entry point.
//!
//! ```
//! use tabscript::{transpile, Options, WhitespaceMode};
//!
//! let options = Options { whitespace: WhitespaceMode::Pretty, ..Default::default() };
//! let result = transpile("tabscript 1.0\nx := 1\n", &options);
//! assert!(result.errors.is_empty());
//! assert!(result.code.contains("const x = 1;"));
//! ```


use std::fmt;

use serde_json::Value;

pub use tabscript_parser::{
    ImportTransform, Parser, ParserOptions, PluginEntry, PluginLoader, PluginModule,
};
pub use tabscript_plugin::{parse_literal, PluginError};
pub use tabscript_render::{render, SourceMap, WhitespaceMode};
pub use tabscript_scanner::{ErrorKind, ParseError};

/// Transpilation options.
#[derive(Clone, Default)]
pub struct Options {
    /// Trace token reads and rule dispatch through `tracing`.
    pub debug: bool,
    /// Collect syntax errors and keep going instead of aborting.
    pub recover: bool,
    /// Emit JavaScript (strip type-level tokens, prepend `"use strict";`).
    pub js: bool,
    /// Output whitespace handling; defaults to `Preserve`.
    pub whitespace: WhitespaceMode,
    /// Rewrites string-literal module paths in `import` statements.
    pub transform_import: Option<ImportTransform>,
    /// Loader used by `import plugin "path"` statements.
    pub load_plugin: Option<PluginLoader>,
    /// Plugins applied before the parse starts.
    pub plugins: Vec<PluginEntry>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("debug", &self.debug)
            .field("recover", &self.recover)
            .field("js", &self.js)
            .field("whitespace", &self.whitespace)
            .field("transform_import", &self.transform_import.is_some())
            .field("load_plugin", &self.load_plugin.is_some())
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

/// Transpilation result: best-effort code, collected errors, and the
/// source map as parallel offset arrays.
#[derive(Debug)]
pub struct Transpiled {
    pub code: String,
    pub errors: Vec<ParseError>,
    pub map: SourceMap,
}

/// Transpiles TabScript source to TypeScript or JavaScript.
///
/// With `recover` off, the first error aborts the parse and is returned in
/// `errors`; whatever output had been emitted is still rendered. With
/// `recover` on, all errors are collected and the code is best-effort.
pub fn transpile(input: &str, options: &Options) -> Transpiled {
    let parser_options = ParserOptions {
        js: options.js,
        recover: options.recover,
        debug: options.debug,
        transform_import: options.transform_import.clone(),
        load_plugin: options.load_plugin.clone(),
    };
    let mut parser = Parser::new(input, parser_options);
    for plugin in &options.plugins {
        if let Err(e) = plugin.as_ref()(&mut parser, &Value::Object(Default::default())) {
            let err = parser
                .state
                .error_at(ErrorKind::Plugin, parser.state.in_pos, e.to_string());
            parser.state.errors.push(err);
            let (code, map) = render(&parser.state, options.whitespace);
            return Transpiled { code, errors: std::mem::take(&mut parser.state.errors), map };
        }
    }
    if let Err(e) = parser.parse_main() {
        tracing::debug!(error = %e, "parse aborted");
        parser.state.errors.push(e);
    }
    let (code, map) = render(&parser.state, options.whitespace);
    Transpiled {
        code,
        errors: std::mem::take(&mut parser.state.errors),
        map,
    }
}
