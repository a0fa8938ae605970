//! Umbrella crate: wires the optimizer, the AST-to-instructions lowering pass, and the container
//! writer into a single `compile()` entry point.
//!
//! ```text
//! Program --optimize--> Program --lower--> (Builder, externals) --container::write--> Vec<u8>
//! ```
//!
//! Every generated program calls out to a small fixed set of runtime-helper symbols
//! ([`lower::RT_PRINTLN_STR`], [`lower::RT_PRINTLN_F64`], [`lower::RT_EXIT`]) rather than raw
//! syscalls, since `c67c-target`'s syscall table has no Windows entries at all — routing output
//! and process exit through externals keeps lowering identical across every target OS instead of
//! branching between a syscall sequence and a libc call per platform.

#![deny(missing_docs)]

mod error;
mod lower;
mod options;

pub use error::{CoreError, LoweringError};
pub use options::CompileOptions;

use c67c_ast::Program;
use c67c_target::Target;

/// Compile `program` for `target`, returning a finished executable image.
///
/// Runs the optimizer pipeline, lowers the result to machine instructions, and assembles the
/// target's native container format (ELF/Mach-O/PE) around them, with `options.entry_symbol` as
/// the process entry point.
pub fn compile(program: Program, target: &Target, options: &CompileOptions) -> Result<Vec<u8>, CoreError> {
    log::debug!("compiling for {:?}/{:?}", target.arch(), target.os());

    let optimized = c67c_optimize::optimize(program, target, &options.optimize)?;

    let (builder, externals) = lower::Lower::run(&optimized, target)?;
    log::debug!("lowering done, {} external symbol(s) referenced", externals.len());

    let image = c67c_container::write(builder, target, &options.entry_symbol, &externals)?;
    Ok(image)
}
