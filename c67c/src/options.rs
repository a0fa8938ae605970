//! Knobs [`crate::compile`] accepts, populated by the driver from CLI flags or a `compile.toml`
//! manifest.

use c67c_optimize::OptimizeOptions;

/// Configuration for a single `compile()` call.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Forwarded to the optimizer pipeline unchanged.
    pub optimize: OptimizeOptions,
    /// The label the container's entry point is marked with, and the name the container writer
    /// is told to treat as the process entry symbol.
    pub entry_symbol: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: OptimizeOptions::default(),
            entry_symbol: "_start".to_string(),
        }
    }
}
