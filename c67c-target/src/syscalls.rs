//! Per-(architecture, operating system) syscall number tables.
//!
//! Syscall numbers are assigned independently by each OS's kernel ABI, not by the ISA, so the
//! table here is keyed on the full (arch, os) pair. Darwin's x86-64 ABI additionally folds a
//! syscall "class" into the number (`0x2000000` for BSD syscalls); AArch64 Darwin does not use
//! this convention and takes the raw BSD number in `x16`.

use crate::triple::{Arch, Os};

/// Class bit Darwin/x86-64 ORs into BSD syscall numbers before the `syscall` instruction.
const DARWIN_BSD_CLASS: i64 = 0x2000000;

fn bsd_syscall_number(name: &str) -> Option<i64> {
    Some(match name {
        "exit" => 1,
        "fork" => 2,
        "read" => 3,
        "write" => 4,
        "open" => 5,
        "close" => 6,
        "execve" => 59,
        "munmap" => 73,
        "mmap" => 197,
        _ => return None,
    })
}

fn linux_x86_64_syscall_number(name: &str) -> Option<i64> {
    Some(match name {
        "read" => 0,
        "write" => 1,
        "open" => 2,
        "close" => 3,
        "mmap" => 9,
        "munmap" => 11,
        "fork" => 57,
        "execve" => 59,
        "exit" => 60,
        "exit_group" => 231,
        _ => return None,
    })
}

/// Linux's "generic" syscall table, shared by the AArch64 and RISC-V ports (both adopted the
/// numbering introduced for new architectures post-x86, which dropped several legacy syscalls
/// such as a standalone `open`, replaced by `openat`).
fn linux_generic_syscall_number(name: &str) -> Option<i64> {
    Some(match name {
        "read" => 63,
        "write" => 64,
        "openat" => 56,
        "close" => 57,
        "mmap" => 222,
        "munmap" => 215,
        "clone" => 220,
        "execve" => 221,
        "exit" => 93,
        "exit_group" => 94,
        _ => return None,
    })
}

fn freebsd_syscall_number(name: &str) -> Option<i64> {
    Some(match name {
        "exit" => 1,
        "fork" => 2,
        "read" => 3,
        "write" => 4,
        "open" => 5,
        "close" => 6,
        "munmap" => 73,
        "execve" => 59,
        "mmap" => 477,
        _ => return None,
    })
}

/// The syscall number for `name` on `(arch, os)`, or `None` if the pairing has no such syscall
/// (either it doesn't exist on that kernel, or, for Windows, the target doesn't expose raw
/// syscalls at all and libc/Win32 imports are used instead — see `generate_call` in
/// `c67c-codegen`).
pub fn syscall_number(arch: Arch, os: Os, name: &str) -> Option<i64> {
    match (arch, os) {
        (Arch::X86_64, Os::Linux) => linux_x86_64_syscall_number(name),
        (Arch::Arm64, Os::Linux) | (Arch::Riscv64, Os::Linux) => linux_generic_syscall_number(name),
        (Arch::X86_64, Os::Darwin) => bsd_syscall_number(name).map(|n| n | DARWIN_BSD_CLASS),
        (Arch::Arm64, Os::Darwin) => bsd_syscall_number(name),
        (Arch::Riscv64, Os::Darwin) => None,
        (_, Os::FreeBsd) => freebsd_syscall_number(name),
        (_, Os::Windows) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_x86_64_exit_is_60() {
        assert_eq!(syscall_number(Arch::X86_64, Os::Linux, "exit"), Some(60));
    }

    #[test]
    fn darwin_x86_64_carries_class_bit() {
        let write = syscall_number(Arch::X86_64, Os::Darwin, "write").unwrap();
        assert_eq!(write, 0x2000004);
    }

    #[test]
    fn darwin_arm64_has_no_class_bit() {
        let write = syscall_number(Arch::Arm64, Os::Darwin, "write").unwrap();
        assert_eq!(write, 4);
    }

    #[test]
    fn arm64_and_riscv64_linux_share_the_generic_table() {
        assert_eq!(
            syscall_number(Arch::Arm64, Os::Linux, "write"),
            syscall_number(Arch::Riscv64, Os::Linux, "write")
        );
    }

    #[test]
    fn windows_has_no_raw_syscalls() {
        assert_eq!(syscall_number(Arch::X86_64, Os::Windows, "write"), None);
    }
}
