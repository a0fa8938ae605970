//! `compile.toml` manifest, layered under CLI flags.

use serde::Deserialize;

use crate::error::DriverError;

/// On-disk form of a `compile.toml` manifest. Every field is optional so a manifest only needs to
/// name the knobs it wants to override; [`CompileManifest::apply`] layers it under
/// [`c67c::CompileOptions::default`], and the CLI flags in [`crate::cli::Cli`] layer on top of that.
#[derive(Debug, Deserialize, Default)]
pub struct CompileManifest {
    /// Overrides [`c67c::CompileOptions::entry_symbol`].
    pub entry_symbol: Option<String>,
    /// The `[optimize]` table.
    #[serde(default)]
    pub optimize: OptimizeManifest,
}

/// The `[optimize]` table of a `compile.toml` manifest.
#[derive(Debug, Deserialize, Default)]
pub struct OptimizeManifest {
    /// Overrides [`c67c_optimize::OptimizeOptions::dead_code_elimination`].
    pub dead_code_elimination: Option<bool>,
    /// Overrides [`c67c_optimize::OptimizeOptions::integer_strength_reduction`].
    pub integer_strength_reduction: Option<bool>,
    /// Overrides [`c67c_optimize::OptimizeOptions::inline_list_length_threshold`].
    pub inline_list_length_threshold: Option<usize>,
}

impl CompileManifest {
    /// Parse a manifest from its TOML text.
    pub fn parse(text: &str) -> Result<Self, DriverError> {
        toml::from_str(text).map_err(DriverError::Manifest)
    }

    /// Layer this manifest's fields under `options`, overwriting only the fields it sets.
    pub fn apply(&self, options: &mut c67c::CompileOptions) {
        if let Some(entry_symbol) = &self.entry_symbol {
            options.entry_symbol = entry_symbol.clone();
        }
        if let Some(v) = self.optimize.dead_code_elimination {
            options.optimize.dead_code_elimination = v;
        }
        if let Some(v) = self.optimize.integer_strength_reduction {
            options.optimize.integer_strength_reduction = v;
        }
        if let Some(v) = self.optimize.inline_list_length_threshold {
            options.optimize.inline_list_length_threshold = v;
        }
    }
}
