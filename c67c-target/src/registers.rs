//! Register description shared by every per-architecture register table.
//!
//! Mirrors the split `isa::registers` makes between a small, generic description type and one
//! populated table per architecture (`isa::x86::registers`, `isa::arm64::registers`,
//! `isa::arm32::registers`) — except the tables here are hand-written `const` arrays rather than
//! generated by a build-time meta-crate (see `DESIGN.md`).

use std::fmt;

/// Which register file a [`Register`] belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// General-purpose integer register (8/16/32/64-bit).
    Integer,
    /// SIMD/vector register (128/256/512-bit XMM/YMM/ZMM, NEON V / SVE Z, RVV v).
    Vector,
    /// Predicate/mask register (x86 k0-k7, ARM64 p0-p15, RISC-V v0 used as a mask).
    Mask,
}

/// A single entry in a per-architecture register catalog.
///
/// `encoding` occupies the low 5 bits for most ISAs; on x86-64 bits 3 and 4 additionally select
/// extended register banks (REX.B/X/R and, for AVX-512, EVEX.X/B'). `size_bits` distinguishes
/// 8/16/32/64-bit integer registers from 128/256/512-bit vector registers and from
/// mask/predicate registers, which carry no meaningful width of their own and report 64 for the
/// RISC-V case (a full mask vector register) or the predicate-file width otherwise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Register {
    /// Canonical register name, e.g. `"rax"`, `"xmm3"`, `"k1"`, `"v0"`.
    pub name: &'static str,
    /// Width in bits.
    pub size_bits: u16,
    /// Hardware encoding number.
    pub encoding: u8,
    /// Which register file this entry belongs to.
    pub class: RegisterClass,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}

impl Register {
    /// Shorthand constructor used by the per-architecture `const` tables.
    pub(crate) const fn new(name: &'static str, size_bits: u16, encoding: u8, class: RegisterClass) -> Self {
        Self {
            name,
            size_bits,
            encoding,
            class,
        }
    }
}
