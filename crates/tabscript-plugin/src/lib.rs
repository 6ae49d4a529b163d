//! Plugin support types for the TabScript transpiler.
//!
//! The core never locates or compiles plugin code itself; a driver hands it
//! a loader callable and the parser invokes it for `import plugin`
//! statements. This crate carries what both sides share: the error type and
//! the evaluator that turns a rendered option-object literal into a value.

mod options;

pub use options::parse_literal;

use thiserror::Error;

/// Failure while loading or running a plugin, or while evaluating its
/// option literal. Plugin errors are never recoverable.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("Could not load plugin {path}: {detail}")]
    LoadFailed { path: String, detail: String },

    #[error("Plugin {path} failed: {detail}")]
    ExecutionFailed { path: String, detail: String },

    #[error("Invalid plugin options: {detail}")]
    InvalidOptions { detail: String },

    /// `import plugin` was parsed but the driver supplied no loader.
    #[error("No plugin loader configured for {path}")]
    NoLoader { path: String },
}
