//! Target-abstract instruction emission and relocation/patching.
//!
//! [`ArchEmitter`] is the polymorphic core: one trait, one method per abstract instruction, one
//! struct per architecture overriding the subset it supports. [`InstructionEmitter`] wraps the
//! three concrete emitters behind a single value that dispatches on [`c67c_target::Arch`] at
//! construction time, the same shape `cranelift-codegen`'s `isa::TargetIsa` trait object gives
//! callers that don't want to carry a type parameter through every function that touches codegen.

#![deny(missing_docs)]

mod arm64;
mod builder;
mod emitter;
mod error;
mod operand;
mod riscv64;
mod vex;
mod x86_64;

pub use builder::{Builder, FinalizedImage, Section, SectionBases, Symbol};
pub use emitter::{ArchEmitter, DisplacementSite};
pub use error::{BuilderError, EmitError};
pub use operand::{Condition, MemOperand, RoundMode, ShiftAmount, VectorWidth, Width};

use arm64::Arm64Emitter;
use c67c_target::{Arch, Target};
use riscv64::Riscv64Emitter;
use x86_64::X86_64Emitter;

/// Dispatches every [`ArchEmitter`] call to the concrete emitter for `target.arch()`, chosen once
/// at construction rather than on every call. Holding a `Box<dyn ArchEmitter>` would work equally
/// well; this enum avoids the allocation since the set of architectures is closed and small.
pub enum InstructionEmitter {
    /// x86-64 (System V and Windows calling conventions; encoding itself is convention-agnostic).
    X86_64(X86_64Emitter),
    /// AArch64.
    Arm64(Arm64Emitter),
    /// RISC-V, RV64GC baseline plus the V extension for packed-double ops.
    Riscv64(Riscv64Emitter),
}

impl InstructionEmitter {
    /// Build the emitter for `target`'s architecture.
    pub fn new(target: Target) -> Self {
        match target.arch() {
            Arch::X86_64 => InstructionEmitter::X86_64(X86_64Emitter::new(target)),
            Arch::Arm64 => InstructionEmitter::Arm64(Arm64Emitter::new(target)),
            Arch::Riscv64 => InstructionEmitter::Riscv64(Riscv64Emitter::new(target)),
        }
    }

    /// The underlying `dyn ArchEmitter` for this architecture.
    pub fn as_emitter(&self) -> &dyn ArchEmitter {
        match self {
            InstructionEmitter::X86_64(e) => e,
            InstructionEmitter::Arm64(e) => e,
            InstructionEmitter::Riscv64(e) => e,
        }
    }
}

impl std::ops::Deref for InstructionEmitter {
    type Target = dyn ArchEmitter;

    fn deref(&self) -> &Self::Target {
        self.as_emitter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_target::Os;

    #[test]
    fn dispatches_to_the_right_architecture() {
        let x86 = InstructionEmitter::new(Target::new(Arch::X86_64, Os::Linux));
        let mut out = Vec::new();
        x86.mov_reg_reg(&mut out, Width::W64, "rax", "rdi").unwrap();
        assert_eq!(out, vec![0x48, 0x89, 0xF8]);

        let arm = InstructionEmitter::new(Target::new(Arch::Arm64, Os::Linux));
        let mut out = Vec::new();
        arm.ret(&mut out).unwrap();
        assert_eq!(u32::from_le_bytes(out.try_into().unwrap()), 0xD65F03C0);
    }
}
