use std::fmt;

/// Errors surfaced while resolving a target triple or a register name.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The requested architecture is not one of `x86_64`, `arm64`, or `riscv64`.
    #[error("unsupported architecture: {0}")]
    UnsupportedArch(String),

    /// The requested operating system is not one of `linux`, `darwin`, `freebsd`, or `windows`.
    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    /// A register name did not resolve to any entry in the catalog for the given architecture.
    #[error("'{name}' is not a known register on {arch}")]
    UnknownRegister {
        /// The architecture the lookup was attempted against.
        arch: DisplayArch,
        /// The register name (after alias resolution) that failed to resolve.
        name: String,
    },

    /// A triple string could not be parsed at all.
    #[error("invalid target triple '{0}'")]
    InvalidTriple(String),
}

/// Thin `Display` wrapper so [`TargetError`] doesn't need to depend on `Arch`'s own `Display`
/// impl living in this same error path (kept separate to avoid a cyclic `mod` dependency when
/// `Arch` itself grows a fallible `TryFrom`).
#[derive(Debug)]
pub struct DisplayArch(pub(crate) String);

impl fmt::Display for DisplayArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
