//! x86-64 register catalog: general-purpose, SSE/AVX/AVX-512, and mask register files.

use crate::registers::{Register, RegisterClass};

macro_rules! gpr {
    ($r64:expr, $r32:expr, $r16:expr, $r8:expr, $enc:expr) => {
        [
            Register::new($r64, 64, $enc, RegisterClass::Integer),
            Register::new($r32, 32, $enc, RegisterClass::Integer),
            Register::new($r16, 16, $enc, RegisterClass::Integer),
            Register::new($r8, 8, $enc, RegisterClass::Integer),
        ]
    };
}

/// General-purpose integer registers, in ABI encoding order (`rax`=0 .. `r15`=15).
///
/// The encoding is not alphabetical: `rax, rcx, rdx, rbx, rsp, rbp, rsi, rdi` occupy 0-7 for
/// historical reasons inherited from 16/32-bit x86, then `r8..r15` continue sequentially.
pub const GPR: [[Register; 4]; 16] = [
    gpr!("rax", "eax", "ax", "al", 0),
    gpr!("rcx", "ecx", "cx", "cl", 1),
    gpr!("rdx", "edx", "dx", "dl", 2),
    gpr!("rbx", "ebx", "bx", "bl", 3),
    gpr!("rsp", "esp", "sp", "spl", 4),
    gpr!("rbp", "ebp", "bp", "bpl", 5),
    gpr!("rsi", "esi", "si", "sil", 6),
    gpr!("rdi", "edi", "di", "dil", 7),
    gpr!("r8", "r8d", "r8w", "r8b", 8),
    gpr!("r9", "r9d", "r9w", "r9b", 9),
    gpr!("r10", "r10d", "r10w", "r10b", 10),
    gpr!("r11", "r11d", "r11w", "r11b", 11),
    gpr!("r12", "r12d", "r12w", "r12b", 12),
    gpr!("r13", "r13d", "r13w", "r13b", 13),
    gpr!("r14", "r14d", "r14w", "r14b", 14),
    gpr!("r15", "r15d", "r15w", "r15b", 15),
];

/// Caller-saved integer registers in System V ABI argument order, used to resolve the
/// cross-architecture aliases `a, b, c, d, e, f`.
pub const ABI_ARG_ORDER: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Stack pointer, used to resolve the cross-architecture alias `s`.
pub const STACK_POINTER: &str = "rsp";

/// Frame pointer, used to resolve the cross-architecture alias `p`.
pub const FRAME_POINTER: &str = "rbp";

// `const fn` can't format strings, so the 32 names per bank are spelled out instead of computed.
macro_rules! vec_bank {
    ($prefix:literal, $size:expr, [$($idx:expr => $name:literal),+ $(,)?]) => {
        [$(Register::new($name, $size, $idx, RegisterClass::Vector)),+]
    };
}

/// 128-bit SSE/AVX registers `xmm0`..`xmm31` (the high 16 require AVX-512/EVEX encoding).
pub const XMM: [Register; 32] = vec_bank!("xmm", 128, [
    0 => "xmm0", 1 => "xmm1", 2 => "xmm2", 3 => "xmm3", 4 => "xmm4", 5 => "xmm5",
    6 => "xmm6", 7 => "xmm7", 8 => "xmm8", 9 => "xmm9", 10 => "xmm10", 11 => "xmm11",
    12 => "xmm12", 13 => "xmm13", 14 => "xmm14", 15 => "xmm15", 16 => "xmm16", 17 => "xmm17",
    18 => "xmm18", 19 => "xmm19", 20 => "xmm20", 21 => "xmm21", 22 => "xmm22", 23 => "xmm23",
    24 => "xmm24", 25 => "xmm25", 26 => "xmm26", 27 => "xmm27", 28 => "xmm28", 29 => "xmm29",
    30 => "xmm30", 31 => "xmm31",
]);

/// 256-bit AVX2 registers `ymm0`..`ymm31`.
pub const YMM: [Register; 32] = vec_bank!("ymm", 256, [
    0 => "ymm0", 1 => "ymm1", 2 => "ymm2", 3 => "ymm3", 4 => "ymm4", 5 => "ymm5",
    6 => "ymm6", 7 => "ymm7", 8 => "ymm8", 9 => "ymm9", 10 => "ymm10", 11 => "ymm11",
    12 => "ymm12", 13 => "ymm13", 14 => "ymm14", 15 => "ymm15", 16 => "ymm16", 17 => "ymm17",
    18 => "ymm18", 19 => "ymm19", 20 => "ymm20", 21 => "ymm21", 22 => "ymm22", 23 => "ymm23",
    24 => "ymm24", 25 => "ymm25", 26 => "ymm26", 27 => "ymm27", 28 => "ymm28", 29 => "ymm29",
    30 => "ymm30", 31 => "ymm31",
]);

/// 512-bit AVX-512 registers `zmm0`..`zmm31`.
pub const ZMM: [Register; 32] = vec_bank!("zmm", 512, [
    0 => "zmm0", 1 => "zmm1", 2 => "zmm2", 3 => "zmm3", 4 => "zmm4", 5 => "zmm5",
    6 => "zmm6", 7 => "zmm7", 8 => "zmm8", 9 => "zmm9", 10 => "zmm10", 11 => "zmm11",
    12 => "zmm12", 13 => "zmm13", 14 => "zmm14", 15 => "zmm15", 16 => "zmm16", 17 => "zmm17",
    18 => "zmm18", 19 => "zmm19", 20 => "zmm20", 21 => "zmm21", 22 => "zmm22", 23 => "zmm23",
    24 => "zmm24", 25 => "zmm25", 26 => "zmm26", 27 => "zmm27", 28 => "zmm28", 29 => "zmm29",
    30 => "zmm30", 31 => "zmm31",
]);

/// AVX-512 mask registers `k0`..`k7`. `k0` is special-cased by the ISA (it means "no masking"
/// when used as a mask operand) but is still addressable as a plain predicate register here.
pub const MASK: [Register; 8] = [
    Register::new("k0", 64, 0, RegisterClass::Mask),
    Register::new("k1", 64, 1, RegisterClass::Mask),
    Register::new("k2", 64, 2, RegisterClass::Mask),
    Register::new("k3", 64, 3, RegisterClass::Mask),
    Register::new("k4", 64, 4, RegisterClass::Mask),
    Register::new("k5", 64, 5, RegisterClass::Mask),
    Register::new("k6", 64, 6, RegisterClass::Mask),
    Register::new("k7", 64, 7, RegisterClass::Mask),
];

/// Look up a register by its literal x86-64 name (no alias resolution).
pub fn lookup(name: &str) -> Option<Register> {
    for bank in &GPR {
        if let Some(r) = bank.iter().find(|r| r.name == name) {
            return Some(*r);
        }
    }
    XMM.iter()
        .chain(YMM.iter())
        .chain(ZMM.iter())
        .chain(MASK.iter())
        .find(|r| r.name == name)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_encodings_match_isa_manual() {
        assert_eq!(lookup("rax").unwrap().encoding, 0);
        assert_eq!(lookup("rbx").unwrap().encoding, 3);
        assert_eq!(lookup("rsp").unwrap().encoding, 4);
        assert_eq!(lookup("r15").unwrap().encoding, 15);
        assert_eq!(lookup("eax").unwrap().size_bits, 32);
        assert_eq!(lookup("al").unwrap().size_bits, 8);
    }

    #[test]
    fn vector_banks_share_encoding_across_widths() {
        let xmm3 = lookup("xmm3").unwrap();
        let ymm3 = lookup("ymm3").unwrap();
        let zmm3 = lookup("zmm3").unwrap();
        assert_eq!(xmm3.encoding, 3);
        assert_eq!(ymm3.encoding, 3);
        assert_eq!(zmm3.encoding, 3);
        assert_eq!(xmm3.size_bits, 128);
        assert_eq!(ymm3.size_bits, 256);
        assert_eq!(zmm3.size_bits, 512);
    }

    #[test]
    fn mask_registers_resolve() {
        assert_eq!(lookup("k1").unwrap().class, RegisterClass::Mask);
        assert!(lookup("k8").is_none());
    }
}
