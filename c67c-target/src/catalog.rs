//! Cross-architecture register lookup, including the `a, b, c, d, e, f, s, p` aliases.

use crate::registers::Register;
use crate::triple::Arch;
use crate::{arm64, riscv64, x86_64};

/// Resolve a cross-architecture alias (`a, b, c, d, e, f, s, p`) to the concrete register name
/// it stands for on `arch`. Names that are not aliases pass through unchanged, so callers can
/// run every register name through this function unconditionally before a catalog lookup.
pub fn resolve_alias(arch: Arch, name: &str) -> &str {
    let abi_args: &[&str; 6] = match arch {
        Arch::X86_64 => &x86_64::ABI_ARG_ORDER,
        Arch::Arm64 => &arm64::ABI_ARG_ORDER,
        Arch::Riscv64 => &riscv64::ABI_ARG_ORDER,
    };
    let stack_pointer = match arch {
        Arch::X86_64 => x86_64::STACK_POINTER,
        Arch::Arm64 => arm64::STACK_POINTER,
        Arch::Riscv64 => riscv64::STACK_POINTER,
    };
    let frame_pointer = match arch {
        Arch::X86_64 => x86_64::FRAME_POINTER,
        Arch::Arm64 => arm64::FRAME_POINTER,
        Arch::Riscv64 => riscv64::FRAME_POINTER,
    };
    match name {
        "a" => abi_args[0],
        "b" => abi_args[1],
        "c" => abi_args[2],
        "d" => abi_args[3],
        "e" => abi_args[4],
        "f" => abi_args[5],
        "s" => stack_pointer,
        "p" => frame_pointer,
        other => other,
    }
}

/// Look up a register by name on `arch`, resolving the cross-architecture aliases first.
pub fn lookup(arch: Arch, name: &str) -> Option<Register> {
    let resolved = resolve_alias(arch, name);
    match arch {
        Arch::X86_64 => x86_64::lookup(resolved),
        Arch::Arm64 => arm64::lookup(resolved),
        Arch::Riscv64 => riscv64::lookup(resolved),
    }
}

/// `true` if `name` (after alias resolution) names a register on `arch`.
pub fn is_register(arch: Arch, name: &str) -> bool {
    lookup(arch, name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_per_arch() {
        assert_eq!(lookup(Arch::X86_64, "a"), lookup(Arch::X86_64, "rdi"));
        assert_eq!(lookup(Arch::Arm64, "a"), lookup(Arch::Arm64, "x0"));
        assert_eq!(lookup(Arch::Riscv64, "a"), lookup(Arch::Riscv64, "a0"));

        assert_eq!(lookup(Arch::X86_64, "s"), lookup(Arch::X86_64, "rsp"));
        assert_eq!(lookup(Arch::X86_64, "p"), lookup(Arch::X86_64, "rbp"));
    }

    #[test]
    fn unknown_register_is_none() {
        assert!(!is_register(Arch::X86_64, "nope"));
        assert!(!is_register(Arch::Arm64, "zzz"));
    }

    #[test]
    fn non_alias_names_pass_through() {
        assert_eq!(resolve_alias(Arch::X86_64, "xmm2"), "xmm2");
    }
}
