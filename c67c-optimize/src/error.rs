//! Optimizer-level errors. Most passes are infallible tree rewrites; the error type exists for
//! the one failure mode worth reporting rather than silently looping: a cycle among inline
//! candidates.

use thiserror::Error;

/// Errors the optimizer pipeline can report.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Two or more inline candidates call each other, which would recurse indefinitely if
    /// inlining ran to a fixed point. Detected and reported rather than looped.
    #[error("inlining cycle detected among functions: {0:?}")]
    InlineCycle(Vec<String>),
}
