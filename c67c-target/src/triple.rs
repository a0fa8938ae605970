//! The target triple and the queries codegen decisions are made against.

use std::fmt;

use target_lexicon::{Architecture, OperatingSystem, Triple};

use crate::error::TargetError;

/// Instruction set architectures the emitter knows how to generate code for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arch {
    /// 64-bit x86, a.k.a. AMD64.
    X86_64,
    /// 64-bit ARM, a.k.a. AArch64.
    Arm64,
    /// 64-bit RISC-V.
    Riscv64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
            Arch::Riscv64 => "riscv64",
        })
    }
}

/// Operating systems the container writer knows how to target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux, ELF containers.
    Linux,
    /// macOS, Mach-O containers.
    Darwin,
    /// FreeBSD, ELF containers.
    FreeBsd,
    /// Windows, PE containers.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::FreeBsd => "freebsd",
            Os::Windows => "windows",
        })
    }
}

/// The executable container format selected by a [`Target`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Linux/FreeBSD ELF64.
    Elf,
    /// macOS Mach-O 64.
    MachO,
    /// Windows PE32+.
    Pe,
}

/// An immutable (architecture, operating system) pair.
///
/// A `Target` is built once per compilation (typically from a `--target` triple string or the
/// host triple) and passed by reference everywhere an emission decision depends on platform.
/// There is no global mutable target state: every query is a pure function of `self`.
#[derive(Debug, Clone)]
pub struct Target {
    arch: Arch,
    os: Os,
    triple: Triple,
}

impl Target {
    /// Construct a target directly from an architecture/OS pair, bypassing triple parsing.
    pub fn new(arch: Arch, os: Os) -> Self {
        let triple = Triple {
            architecture: match arch {
                Arch::X86_64 => Architecture::X86_64,
                Arch::Arm64 => Architecture::Aarch64(target_lexicon::Aarch64Architecture::Aarch64),
                Arch::Riscv64 => {
                    Architecture::Riscv64(target_lexicon::Riscv64Architecture::Riscv64)
                }
            },
            operating_system: match os {
                Os::Linux => OperatingSystem::Linux,
                Os::Darwin => OperatingSystem::Darwin,
                Os::FreeBsd => OperatingSystem::Freebsd,
                Os::Windows => OperatingSystem::Windows,
            },
            vendor: target_lexicon::Vendor::Unknown,
            environment: target_lexicon::Environment::Unknown,
            binary_format: target_lexicon::BinaryFormat::Unknown,
        };
        Self { arch, os, triple }
    }

    /// Parse a target triple string such as `x86_64-unknown-linux-gnu` or
    /// `aarch64-apple-darwin`.
    pub fn parse(triple: &str) -> Result<Self, TargetError> {
        let triple: Triple = triple
            .parse()
            .map_err(|_| TargetError::InvalidTriple(triple.to_string()))?;
        let arch = match triple.architecture {
            Architecture::X86_64 => Arch::X86_64,
            Architecture::Aarch64(_) => Arch::Arm64,
            Architecture::Riscv64(_) => Arch::Riscv64,
            other => return Err(TargetError::UnsupportedArch(other.to_string())),
        };
        let os = match triple.operating_system {
            OperatingSystem::Linux => Os::Linux,
            OperatingSystem::Darwin => Os::Darwin,
            OperatingSystem::Freebsd => Os::FreeBsd,
            OperatingSystem::Windows => Os::Windows,
            other => return Err(TargetError::UnsupportedOs(other.to_string())),
        };
        Ok(Self { arch, os, triple })
    }

    /// Select a target from an output filename: `.exe` implies PE with no other triple
    /// information given, matching the host architecture otherwise.
    pub fn from_output_path(path: &str, host: &Target) -> Self {
        if path.ends_with(".exe") && host.os != Os::Windows {
            Target::new(host.arch, Os::Windows)
        } else {
            host.clone()
        }
    }

    /// The host target, derived from `target_lexicon::HOST`.
    pub fn host() -> Self {
        Self::parse(&target_lexicon::HOST.to_string()).unwrap_or(Self::new(Arch::X86_64, Os::Linux))
    }

    /// The target architecture.
    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// The target operating system.
    pub fn os(&self) -> Os {
        self.os
    }

    /// The underlying `target-lexicon` triple, for interop with other tooling.
    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    /// The container format this (arch, os) pair is loaded with.
    pub fn container_format(&self) -> ContainerFormat {
        match self.os {
            Os::Linux | Os::FreeBsd => ContainerFormat::Elf,
            Os::Darwin => ContainerFormat::MachO,
            Os::Windows => ContainerFormat::Pe,
        }
    }

    /// `true` if this target is loaded from an ELF container.
    pub fn is_elf(&self) -> bool {
        self.container_format() == ContainerFormat::Elf
    }

    /// `true` if this target is loaded from a Mach-O container.
    pub fn is_macho(&self) -> bool {
        self.container_format() == ContainerFormat::MachO
    }

    /// `true` if this target is loaded from a PE container.
    pub fn is_pe(&self) -> bool {
        self.container_format() == ContainerFormat::Pe
    }

    /// Pointer width in bytes. Always 8: the core targets LP64/LLP64 64-bit ABIs only.
    pub fn pointer_width(&self) -> u32 {
        8
    }

    /// Number of 64-bit lanes in one full-width vector register for this target, i.e. the
    /// `VectorWidth` a vectorized loop is marked with.
    pub fn vector_lane_count(&self) -> u32 {
        match self.arch {
            // AVX-512 ZMM: 8 lanes of f64. Narrower CPUs still get correct, merely
            // less-parallel, code because the emitter picks the encoding by register name.
            Arch::X86_64 => 8,
            // NEON/SVE: model the guaranteed-present NEON width (2 lanes of f64); SVE's
            // scalable width is a multiple of this chosen at runtime by the target CPU.
            Arch::Arm64 => 2,
            // RVV is fully scalable; 2 is the conservative minimum a `vlenb`-ignorant
            // emitter can assume.
            Arch::Riscv64 => 2,
        }
    }

    /// The syscall number for `name` on this (arch, os) pair.
    pub fn syscall_number(&self, name: &str) -> Option<i64> {
        crate::syscalls::syscall_number(self.arch, self.os, name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_triples() {
        let t = Target::parse("x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(t.arch(), Arch::X86_64);
        assert_eq!(t.os(), Os::Linux);
        assert!(t.is_elf());

        let t = Target::parse("aarch64-apple-darwin").unwrap();
        assert_eq!(t.arch(), Arch::Arm64);
        assert!(t.is_macho());

        let t = Target::parse("riscv64gc-unknown-linux-gnu").unwrap();
        assert_eq!(t.arch(), Arch::Riscv64);
        assert!(t.is_elf());
    }

    #[test]
    fn rejects_unsupported_arch() {
        let err = Target::parse("wasm32-unknown-unknown").unwrap_err();
        assert!(matches!(err, TargetError::UnsupportedArch(_)));
    }

    #[test]
    fn exe_extension_selects_pe() {
        let host = Target::new(Arch::X86_64, Os::Linux);
        let picked = Target::from_output_path("hello.exe", &host);
        assert!(picked.is_pe());
        assert_eq!(picked.arch(), Arch::X86_64);
    }

    #[test]
    fn vector_lane_counts_per_arch() {
        assert_eq!(Target::new(Arch::X86_64, Os::Linux).vector_lane_count(), 8);
        assert_eq!(Target::new(Arch::Arm64, Os::Darwin).vector_lane_count(), 2);
        assert_eq!(Target::new(Arch::Riscv64, Os::Linux).vector_lane_count(), 2);
    }
}
