//! RISC-V 64 (RV64GC + V) register catalog: integer, floating-point, and vector register files.

use crate::registers::{Register, RegisterClass};

macro_rules! gpr {
    ($name:literal, $enc:expr) => {
        Register::new($name, 64, $enc, RegisterClass::Integer)
    };
}

/// Integer registers `x0..x31`, addressed throughout this catalog by their ABI mnemonics
/// (`zero, ra, sp, gp, tp, t0-t2, s0/fp, s1, a0-a7, s2-s11, t3-t6`) rather than `x0..x31`, since
/// RISC-V assembly conventionally never spells out the raw `xN` form.
pub const GPR: [Register; 32] = [
    gpr!("zero", 0),
    gpr!("ra", 1),
    gpr!("sp", 2),
    gpr!("gp", 3),
    gpr!("tp", 4),
    gpr!("t0", 5),
    gpr!("t1", 6),
    gpr!("t2", 7),
    gpr!("s0", 8),
    gpr!("s1", 9),
    gpr!("a0", 10),
    gpr!("a1", 11),
    gpr!("a2", 12),
    gpr!("a3", 13),
    gpr!("a4", 14),
    gpr!("a5", 15),
    gpr!("a6", 16),
    gpr!("a7", 17),
    gpr!("s2", 18),
    gpr!("s3", 19),
    gpr!("s4", 20),
    gpr!("s5", 21),
    gpr!("s6", 22),
    gpr!("s7", 23),
    gpr!("s8", 24),
    gpr!("s9", 25),
    gpr!("s10", 26),
    gpr!("s11", 27),
    gpr!("t3", 28),
    gpr!("t4", 29),
    gpr!("t5", 30),
    gpr!("t6", 31),
];

/// `fp` is the conventional alias for `s0` once a frame pointer is established.
pub const FRAME_POINTER_ALIAS: (&str, &str) = ("fp", "s0");

/// Caller-saved integer registers in the standard calling convention's argument order, for the
/// `a, b, c, d, e, f` cross-architecture aliases. These are literally named `a0..a5`.
pub const ABI_ARG_ORDER: [&str; 6] = ["a0", "a1", "a2", "a3", "a4", "a5"];

/// Stack pointer alias target.
pub const STACK_POINTER: &str = "sp";

/// Frame pointer alias target.
pub const FRAME_POINTER: &str = "s0";

macro_rules! vec_bank {
    ($size:expr, [$($idx:expr => $name:literal),+ $(,)?]) => {
        [$(Register::new($name, $size, $idx, RegisterClass::Vector)),+]
    };
}

/// RVV vector registers `v0..v31`. Modeled at a nominal 128-bit `VLEN`; RVV is fully scalable so
/// the real width is implementation-defined and queried at runtime via `vsetvli`, which the
/// emitter does not attempt to reason about statically.
pub const VECTOR: [Register; 32] = vec_bank!(128, [
    0 => "v0", 1 => "v1", 2 => "v2", 3 => "v3", 4 => "v4", 5 => "v5", 6 => "v6", 7 => "v7",
    8 => "v8", 9 => "v9", 10 => "v10", 11 => "v11", 12 => "v12", 13 => "v13", 14 => "v14",
    15 => "v15", 16 => "v16", 17 => "v17", 18 => "v18", 19 => "v19", 20 => "v20", 21 => "v21",
    22 => "v22", 23 => "v23", 24 => "v24", 25 => "v25", 26 => "v26", 27 => "v27", 28 => "v28",
    29 => "v29", 30 => "v30", 31 => "v31",
]);

/// `v0` doubles as the mask register in masked vector instructions (`vadd.vv v.., v0.t`); there
/// is no separate predicate register file on RISC-V the way there is on x86-64 or AArch64.
pub const MASK: Register = Register::new("v0", 128, 0, RegisterClass::Mask);

/// Look up a register by its literal RISC-V name (no alias resolution).
pub fn lookup(name: &str) -> Option<Register> {
    if name == FRAME_POINTER_ALIAS.0 {
        return lookup(FRAME_POINTER_ALIAS.1);
    }
    if let Some(r) = GPR.iter().find(|r| r.name == name) {
        return Some(*r);
    }
    VECTOR.iter().find(|r| r.name == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_mnemonics_resolve() {
        assert_eq!(lookup("zero").unwrap().encoding, 0);
        assert_eq!(lookup("sp").unwrap().encoding, 2);
        assert_eq!(lookup("a0").unwrap().encoding, 10);
        assert_eq!(lookup("t6").unwrap().encoding, 31);
    }

    #[test]
    fn fp_aliases_s0() {
        assert_eq!(lookup("fp"), lookup("s0"));
    }

    #[test]
    fn vector_registers_resolve() {
        assert_eq!(lookup("v12").unwrap().size_bits, 128);
        assert!(lookup("v32").is_none());
    }
}
