//! Errors surfaced while assembling a loadable image from a finalized [`c67c_codegen::Builder`]
//! image.

use thiserror::Error;

/// Errors raised while assembling an ELF/Mach-O/PE container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The builder's relocation/patch phase failed.
    #[error(transparent)]
    Builder(#[from] c67c_codegen::BuilderError),

    /// The requested entry symbol was never defined as a label.
    #[error("entry point '{0}' is not a defined label")]
    MissingEntryPoint(String),

    /// A format-specific invariant was violated (e.g. a name too long for its string table slot).
    #[error("{0}")]
    Layout(String),
}
