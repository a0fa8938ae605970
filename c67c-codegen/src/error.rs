//! Errors surfaced by the instruction emitter and the builder/relocation engine.

use c67c_target::{Arch, RegisterClass};
use thiserror::Error;

/// Errors raised while encoding a single instruction. Raising one of these must not leave a
/// partially-written instruction in the output buffer: every `ArchEmitter` method either writes a
/// complete instruction or writes nothing at all.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The operand string did not resolve to any register in the target's catalog.
    #[error("'{0}' is not a known register for this target")]
    UnknownRegister(String),

    /// The register resolved but belongs to the wrong register file for this operation.
    #[error("register '{name}' is a {actual:?} register; this operation needs a {expected:?}")]
    WrongRegisterClass {
        /// The register name as given.
        name: String,
        /// The register class the operation requires.
        expected: RegisterClass,
        /// The register class the name actually resolved to.
        actual: RegisterClass,
    },

    /// The requested width is not one this operation supports.
    #[error("operand width of {0} bits is not supported by this operation")]
    UnsupportedWidth(u16),

    /// An immediate operand does not fit in the instruction's encoding.
    #[error("immediate value {value} does not fit in {bits} bits")]
    ImmediateOutOfRange {
        /// The offending value.
        value: i64,
        /// The number of bits available to encode it.
        bits: u32,
    },

    /// The abstract operation has no encoding on this architecture.
    #[error("{op} is not implemented for {arch}")]
    UnsupportedOperation {
        /// Name of the abstract operation, e.g. `"mul3"`.
        op: &'static str,
        /// The architecture that was asked to perform it.
        arch: Arch,
    },
}

/// Errors raised by the builder during emission or the post-emission patch phase.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Propagated from a failed instruction encoding.
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// A label was marked twice. Labels are write-once within a compilation.
    #[error("label '{0}' is already defined")]
    DuplicateLabel(String),

    /// A symbol was defined twice.
    #[error("symbol '{0}' is already defined")]
    DuplicateSymbol(String),

    /// The text section grew past its reserved budget.
    #[error("text section exceeds its reserved budget of {budget} bytes by {overflow} bytes")]
    TextSectionOverflow {
        /// The configured budget, in bytes.
        budget: usize,
        /// How many bytes over budget the section is.
        overflow: usize,
    },

    /// A computed relocation displacement does not fit the target field.
    #[error("relocation displacement {value} does not fit in {bits} bits")]
    RelocationOutOfRange {
        /// The computed displacement.
        value: i64,
        /// The number of bits available to encode it.
        bits: u32,
    },
}
