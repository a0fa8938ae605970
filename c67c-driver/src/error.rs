//! Errors the driver binary can report, on top of [`c67c::CoreError`].

use thiserror::Error;

/// Top-level error the `main` binary exits non-zero on.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Reading the input program, the config manifest, or writing the output failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path that could not be read or written.
        path: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The input file was not well-formed JSON for a `Program`.
    #[error("failed to parse {path} as a program: {source}")]
    ProgramJson {
        /// The input path.
        path: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The `--config` manifest was not well-formed TOML.
    #[error("failed to parse compile.toml: {0}")]
    Manifest(#[source] toml::de::Error),

    /// `--target` did not parse as a known triple.
    #[error(transparent)]
    Target(#[from] c67c_target::TargetError),

    /// Compilation itself failed.
    #[error(transparent)]
    Compile(#[from] c67c::CoreError),
}
