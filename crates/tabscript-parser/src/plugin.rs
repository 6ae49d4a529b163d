//! Plugin dispatch types.
//!
//! A plugin is a callable invoked with the parser handle and its option
//! object. It typically captures the previous implementation of a named
//! rule via [`Parser::override_rule`] and installs a replacement that
//! conditionally delegates back.
//!
//! Contract for replacements: they must honor the parse-method contract
//! (advance on success, leave the state untouched on clean failure), and
//! must take all coordinates from the [`crate::Parser::state`] at call
//! time rather than assuming absolute output positions.
//!
//! How a plugin module is located, read and compiled is not the core's
//! business: the driver supplies a [`PluginLoader`] callable and the
//! parser invokes it for `import plugin "path"` statements.

use std::sync::Arc;

use serde_json::Value;
use tabscript_plugin::PluginError;

use crate::Parser;

/// Plugin entry point: `(parser, plugin_options)`. Global options are
/// reachable through [`Parser::options`].
pub type PluginEntry = Arc<dyn Fn(&mut Parser, &Value) -> Result<(), PluginError>>;

/// What the loader returns for a plugin path.
#[derive(Clone)]
pub struct PluginModule {
    pub default: PluginEntry,
}

/// Resolves a plugin path to its module.
pub type PluginLoader = Arc<dyn Fn(&str) -> Result<PluginModule, PluginError> + Send + Sync>;

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule").finish_non_exhaustive()
    }
}
