//! AST data model ingested from the external parser, and the loop dependency analyzer that
//! feeds the SIMD vectorization gate.
//!
//! Everything in this crate is pure data plus pure queries over that data: no byte emission, no
//! I/O. The optimizer (`c67c-optimize`) and the codegen pipeline (`c67c-codegen`) both consume
//! `Program`/`Stmt`/`Expr` values produced here; nothing downstream mutates the shape of this
//! crate's types, only the values inside the fields the optimizer is documented to fill in
//! (`Lambda::is_pure`, `Lambda::captured_vars`, `Loop::vectorized`).

#![deny(missing_docs)]

mod ast;
mod depanalysis;
mod program;

pub use crate::ast::*;
pub use crate::depanalysis::{
    analyze_loop_dependencies, is_vectorizable, DependencyKind, DependencyRecord,
};
pub use crate::program::{ExportVisibility, Program, StructLayout};
