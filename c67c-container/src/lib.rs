//! ELF, Mach-O, and PE container writers.
//!
//! Each submodule consumes a finalized [`c67c_codegen::Builder`] and emits a directly loadable
//! executable for one OS. [`write`] is the entry point most callers want: it dispatches on
//! `target.container_format()` so the umbrella crate doesn't need to match on format itself.

#![deny(missing_docs)]

mod elf;
mod error;
mod macho;
mod pe;

pub use error::ContainerError;

use c67c_codegen::Builder;
use c67c_target::{ContainerFormat, Target};

/// The DLL every PE import resolves against when no caller-specific choice is supplied.
pub const DEFAULT_PE_IMPORT_DLL: &str = "ucrtbase.dll";

/// Assemble a loadable executable from `builder` for `target`, with `entry_symbol` as the process
/// entry point and `externals` naming every function resolved at load time rather than defined in
/// `builder`'s own text.
pub fn write(builder: Builder, target: &Target, entry_symbol: &str, externals: &[String]) -> Result<Vec<u8>, ContainerError> {
    match target.container_format() {
        ContainerFormat::Elf => elf::write(builder, target, entry_symbol, externals),
        ContainerFormat::MachO => macho::write(builder, target, entry_symbol, externals),
        ContainerFormat::Pe => pe::write(builder, target, entry_symbol, externals, DEFAULT_PE_IMPORT_DLL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_codegen::Builder;
    use c67c_target::{Arch, Os};

    fn ret_only_builder(target: Target) -> Builder {
        let mut builder = Builder::new(target);
        builder.mark_label("_start").unwrap();
        let mut ret_bytes = Vec::new();
        builder.emitter().ret(&mut ret_bytes).unwrap();
        builder.text().write_bytes(&ret_bytes);
        builder
    }

    #[test]
    fn elf_image_starts_with_magic() {
        let target = Target::new(Arch::X86_64, Os::Linux);
        let builder = ret_only_builder(target.clone());
        let image = write(builder, &target, "_start", &[]).unwrap();
        assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
    }

    #[test]
    fn macho_image_starts_with_magic() {
        let target = Target::new(Arch::X86_64, Os::Darwin);
        let builder = ret_only_builder(target.clone());
        let image = write(builder, &target, "_start", &[]).unwrap();
        assert_eq!(u32::from_le_bytes(image[0..4].try_into().unwrap()), 0xfeed_facf);
    }

    #[test]
    fn pe_image_starts_with_mz() {
        let target = Target::new(Arch::X86_64, Os::Windows);
        let builder = ret_only_builder(target.clone());
        let image = write(builder, &target, "_start", &[]).unwrap();
        assert_eq!(&image[0..2], &[b'M', b'Z']);
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let target = Target::new(Arch::X86_64, Os::Linux);
        let mut builder = Builder::new(target.clone());
        let mut ret_bytes = Vec::new();
        builder.emitter().ret(&mut ret_bytes).unwrap();
        builder.text().write_bytes(&ret_bytes);
        let err = write(builder, &target, "_start", &[]).unwrap_err();
        assert!(matches!(err, ContainerError::MissingEntryPoint(name) if name == "_start"));
    }
}
