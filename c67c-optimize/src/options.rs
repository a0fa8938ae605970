//! Toggles for passes that are disabled or gated by default.

/// Configuration for a single optimization run. The driver's `CompileOptions` embeds one of
/// these, populated from CLI flags or a `compile.toml` manifest.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Dead code elimination (pass 3). Disabled by default; exposed here as a real pass rather
    /// than left unimplemented, gated behind this flag.
    pub dead_code_elimination: bool,
    /// Integer power-of-two strength reduction (`*2^n -> <<n`, etc). Disabled by default:
    /// integer-vs-float context detection is incomplete, so setting this currently has no
    /// additional effect beyond a logged warning — see `DESIGN.md`.
    pub integer_strength_reduction: bool,
    /// Maximum literal-list length for an inline candidate's body (pass 5). Generalized to a
    /// configurable threshold with a default of 5.
    pub inline_list_length_threshold: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            dead_code_elimination: false,
            integer_strength_reduction: false,
            inline_list_length_threshold: 5,
        }
    }
}
