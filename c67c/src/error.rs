//! Top-level error type produced by [`crate::compile`], wrapping every stage's own error plus the
//! lowering-specific failures this crate introduces.

use thiserror::Error;

/// Errors raised while translating an optimized [`c67c_ast::Program`] into instructions. Most
/// variants name a specific language construct the lowering pass does not (yet) translate, rather
/// than attempting a guess at unresolved semantics.
#[derive(Debug, Error)]
pub enum LoweringError {
    /// An identifier was read or assigned that no earlier `:=` bound in this frame.
    #[error("'{0}' is used before it is defined")]
    UnknownVariable(String),

    /// A construct this lowering pass does not translate. Carries a short, fixed description
    /// rather than echoing the AST node, since most of these are scope decisions (see
    /// `DESIGN.md`) rather than per-input mistakes.
    #[error("not supported by codegen: {0}")]
    Unsupported(&'static str),

    /// `break`/`continue` named a label no enclosing loop on the stack carries.
    #[error("no enclosing loop is labeled {0}")]
    UnknownLoopLabel(u32),

    /// `break`/`continue` appeared outside of any loop.
    #[error("{0} outside of a loop")]
    JumpOutsideLoop(&'static str),

    /// An expression nested deeper than the fixed scratch-register pool this lowering pass
    /// allocates from (see `DESIGN.md`, "straight-line scalar lowering").
    #[error("expression nests too deeply for the fixed scratch-register pool (max depth {0})")]
    ExpressionTooDeep(u8),

    /// A syscall inside an `unsafe` block was given more arguments than the generic `a..f` alias
    /// set can place without colliding with the syscall-number register.
    #[error("syscall given {0} arguments; at most {1} are supported")]
    TooManySyscallArgs(usize, usize),

    /// `unsafe { ... }` had no body specialized for the compile target's architecture.
    #[error("unsafe block has no body for target architecture {0}")]
    NoArchBody(c67c_target::Arch),

    /// Emission or the relocation/patch phase failed while lowering was writing to the builder.
    #[error(transparent)]
    Emit(#[from] c67c_codegen::BuilderError),
}

/// Errors [`crate::compile`] can return, composing every pipeline stage's own error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A pass in the optimizer pipeline failed (currently only an inlining cycle).
    #[error(transparent)]
    Optimize(#[from] c67c_optimize::OptimizeError),

    /// Assembling the final container image failed.
    #[error(transparent)]
    Container(#[from] c67c_container::ContainerError),

    /// Translating the optimized AST to instructions failed.
    #[error(transparent)]
    Lowering(#[from] LoweringError),
}
