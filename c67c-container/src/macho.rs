//! Mach-O 64 executable writer for Darwin targets.
//!
//! Builds a minimal dynamically-linked Mach-O executable: a file header, `LC_SEGMENT_64` load
//! commands for `__TEXT` and `__DATA`, `LC_SYMTAB`/`LC_DYSYMTAB` for the symbol table, one
//! `LC_LOAD_DYLIB` per needed dylib, and `LC_MAIN` naming the entry offset. External calls go
//! through a lazy-symbol-pointer-free stub: each external gets a `__DATA` pointer slot patched to
//! its dylib-resolved address by the dynamic linker at load time, addressed the same way `elf.rs`
//! addresses its GOT slots.

use c67c_codegen::{Builder, SectionBases};
use c67c_target::Target;

use crate::error::ContainerError;

const MH_MAGIC_64: u32 = 0xfeed_facf;
const CPU_TYPE_ARM64: u32 = 0x0100_000c;
const CPU_TYPE_X86_64: u32 = 0x0100_0007;
const CPU_SUBTYPE_ALL: u32 = 0x0000_0003;
const MH_EXECUTE: u32 = 2;
const MH_NOUNDEFS: u32 = 0x1;
const MH_DYLDLINK: u32 = 0x4;
const MH_PIE: u32 = 0x20_0000;

const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const LC_DYSYMTAB: u32 = 0xb;
const LC_LOAD_DYLIB: u32 = 0xc;
const LC_MAIN: u32 = 0x28 | 0x8000_0000; // LC_REQ_DYLD

const VM_PROT_READ: u32 = 1;
const VM_PROT_WRITE: u32 = 2;
const VM_PROT_EXECUTE: u32 = 4;

const PAGE: u64 = 0x1000;
const BASE_ADDR: u64 = 0x1_0000_0000; // default ASLR slide base on modern Darwin

fn align_up(v: u64, align: u64) -> u64 {
    (v + align - 1) / align * align
}

/// Build a loadable Mach-O64 executable. `externals` resolve against `libSystem.B.dylib`, the only
/// dylib this writer names — anything heavier (Foundation, custom frameworks) is out of scope for
/// a generated program that only needs libc-shaped calls.
pub fn write(mut builder: Builder, target: &Target, entry_symbol: &str, externals: &[String]) -> Result<Vec<u8>, ContainerError> {
    let cpu_type = match target.arch() {
        c67c_target::Arch::X86_64 => CPU_TYPE_X86_64,
        c67c_target::Arch::Arm64 => CPU_TYPE_ARM64,
        other => {
            return Err(ContainerError::Layout(format!("Mach-O has no cpu_type mapping for {other:?}")));
        }
    };

    let dylib_path = "/usr/lib/libSystem.B.dylib\0";
    let dylib_path_padded = align_up(dylib_path.len() as u64, 8) as usize;

    let n_syms = 1 + externals.len(); // entry symbol + one indirect symbol per external
    let strtab = build_strtab(entry_symbol, externals);
    let symtab_entry_size = 16u64;

    let ptr_slot_size = externals.len() as u64 * 8;

    let ncmds = 5 + externals.len() as u32; // 2x LC_SEGMENT_64(text,data) + LC_SYMTAB + LC_DYSYMTAB + LC_MAIN + N x LC_LOAD_DYLIB
    let header_size = 32u64;
    let lc_segment_size = 72 + 80; // one section per segment (__text in __TEXT, __data in __DATA)
    let lc_symtab_size = 24u64;
    let lc_dysymtab_size = 80u64;
    let lc_main_size = 24u64;
    let lc_load_dylib_size = 24 + dylib_path_padded as u64;

    let sizeofcmds = 2 * lc_segment_size + lc_symtab_size + lc_dysymtab_size + lc_main_size + externals.len() as u64 * lc_load_dylib_size;

    let text_file_off = align_up(header_size + sizeofcmds, 16);
    let text_vaddr = BASE_ADDR + text_file_off;
    let text_len = builder.text().offset() as u64;
    let rodata_len = builder.rodata().offset() as u64;
    let text_segment_len = text_len + rodata_len;

    let data_file_off = align_up(text_file_off + text_segment_len, PAGE);
    let data_vaddr = BASE_ADDR + data_file_off;
    let ptr_slots_off = data_file_off;
    let ptr_slots_vaddr = data_vaddr;
    let data_start_off = ptr_slots_off + ptr_slot_size;
    let data_start_vaddr = ptr_slots_vaddr + ptr_slot_size;

    for (i, name) in externals.iter().enumerate() {
        builder.define_address(name, ptr_slots_vaddr + i as u64 * 8);
    }

    let bases = SectionBases {
        header: BASE_ADDR,
        rodata: text_vaddr + text_len,
        data: data_start_vaddr,
        text: text_vaddr,
    };
    let image = builder.finalize_with_bases(bases)?;

    let entry_vaddr = image
        .symbols
        .iter()
        .find(|(name, _, is_fn)| *is_fn && name == entry_symbol)
        .map(|(_, addr, _)| *addr)
        .ok_or_else(|| ContainerError::MissingEntryPoint(entry_symbol.to_string()))?;

    let symtab_off = align_up(data_start_off + image.data.len() as u64, 8);
    let strtab_off = symtab_off + n_syms as u64 * symtab_entry_size;
    let indirectsyms_off = strtab_off + strtab.len() as u64;

    let mut out = Vec::with_capacity((indirectsyms_off + externals.len() as u64 * 4) as usize);

    write_mach_header(&mut out, cpu_type, ncmds, sizeofcmds);

    write_segment(
        &mut out,
        "__TEXT",
        BASE_ADDR,
        data_file_off,
        0,
        data_file_off,
        VM_PROT_READ | VM_PROT_EXECUTE,
        VM_PROT_READ | VM_PROT_EXECUTE,
        "__text",
        text_vaddr,
        text_len,
        text_file_off,
    );
    write_segment(
        &mut out,
        "__DATA",
        data_vaddr,
        ptr_slot_size + image.data.len() as u64,
        data_file_off,
        ptr_slot_size + image.data.len() as u64,
        VM_PROT_READ | VM_PROT_WRITE,
        VM_PROT_READ | VM_PROT_WRITE,
        "__data",
        ptr_slots_vaddr,
        ptr_slot_size + image.data.len() as u64,
        ptr_slots_off,
    );

    write_lc_symtab(&mut out, symtab_off, n_syms as u32, strtab_off, strtab.len() as u32);
    write_lc_dysymtab(&mut out, externals.len() as u32, indirectsyms_off, externals.len() as u32);
    write_lc_main(&mut out, entry_vaddr - BASE_ADDR);
    for _ in externals {
        write_lc_load_dylib(&mut out, dylib_path, dylib_path_padded);
    }

    pad_to(&mut out, text_file_off);
    out.extend_from_slice(&image.text);
    out.extend_from_slice(&image.rodata);
    pad_to(&mut out, ptr_slots_off);
    out.extend_from_slice(&vec![0u8; ptr_slot_size as usize]);
    out.extend_from_slice(&image.data);

    pad_to(&mut out, symtab_off);
    write_nlist(&mut out, 1, entry_vaddr); // entry symbol, string table index 1 (after the leading NUL)
    let mut str_idx = 1 + entry_symbol.len() as u32 + 1;
    for name in externals {
        write_undefined_nlist(&mut out, str_idx);
        str_idx += name.len() as u32 + 1;
    }
    out.extend_from_slice(&strtab);

    for i in 0..externals.len() as u32 {
        out.extend_from_slice(&(i + 1).to_le_bytes()); // indirect symbol table: nlist index of each external
    }

    Ok(out)
}

fn pad_to(out: &mut Vec<u8>, target_len: u64) {
    while (out.len() as u64) < target_len {
        out.push(0);
    }
}

fn write_mach_header(out: &mut Vec<u8>, cpu_type: u32, ncmds: u32, sizeofcmds: u64) {
    out.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
    out.extend_from_slice(&cpu_type.to_le_bytes());
    out.extend_from_slice(&CPU_SUBTYPE_ALL.to_le_bytes());
    out.extend_from_slice(&MH_EXECUTE.to_le_bytes());
    out.extend_from_slice(&ncmds.to_le_bytes());
    out.extend_from_slice(&(sizeofcmds as u32).to_le_bytes());
    out.extend_from_slice(&(MH_NOUNDEFS | MH_DYLDLINK | MH_PIE).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved
}

#[allow(clippy::too_many_arguments)]
fn write_segment(
    out: &mut Vec<u8>,
    seg_name: &str,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    maxprot: u32,
    initprot: u32,
    sect_name: &str,
    sect_addr: u64,
    sect_size: u64,
    sect_offset: u64,
) {
    out.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    out.extend_from_slice(&(72u32 + 80).to_le_bytes()); // cmdsize: segment command + one section
    write_fixed_name(out, seg_name);
    out.extend_from_slice(&vmaddr.to_le_bytes());
    out.extend_from_slice(&vmsize.to_le_bytes());
    out.extend_from_slice(&fileoff.to_le_bytes());
    out.extend_from_slice(&filesize.to_le_bytes());
    out.extend_from_slice(&maxprot.to_le_bytes());
    out.extend_from_slice(&initprot.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // nsects
    out.extend_from_slice(&0u32.to_le_bytes()); // flags

    write_fixed_name(out, sect_name);
    write_fixed_name(out, seg_name);
    out.extend_from_slice(&sect_addr.to_le_bytes());
    out.extend_from_slice(&sect_size.to_le_bytes());
    out.extend_from_slice(&(sect_offset as u32).to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes()); // align, 2^4 = 16 bytes
    out.extend_from_slice(&0u32.to_le_bytes()); // reloff
    out.extend_from_slice(&0u32.to_le_bytes()); // nreloc
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved1
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved2
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved3
}

fn write_fixed_name(out: &mut Vec<u8>, name: &str) {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    out.extend_from_slice(&buf);
}

fn write_lc_symtab(out: &mut Vec<u8>, symoff: u64, nsyms: u32, stroff: u64, strsize: u32) {
    out.extend_from_slice(&LC_SYMTAB.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes());
    out.extend_from_slice(&(symoff as u32).to_le_bytes());
    out.extend_from_slice(&nsyms.to_le_bytes());
    out.extend_from_slice(&(stroff as u32).to_le_bytes());
    out.extend_from_slice(&strsize.to_le_bytes());
}

fn write_lc_dysymtab(out: &mut Vec<u8>, n_undefsyms: u32, indirectsymoff: u64, nindirectsyms: u32) {
    out.extend_from_slice(&LC_DYSYMTAB.to_le_bytes());
    out.extend_from_slice(&80u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // ilocalsym
    out.extend_from_slice(&1u32.to_le_bytes()); // nlocalsym (the entry symbol)
    out.extend_from_slice(&1u32.to_le_bytes()); // iextdefsym
    out.extend_from_slice(&0u32.to_le_bytes()); // nextdefsym
    out.extend_from_slice(&1u32.to_le_bytes()); // iundefsym
    out.extend_from_slice(&n_undefsyms.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // tocoff
    out.extend_from_slice(&0u32.to_le_bytes()); // ntoc
    out.extend_from_slice(&0u32.to_le_bytes()); // modtaboff
    out.extend_from_slice(&0u32.to_le_bytes()); // nmodtab
    out.extend_from_slice(&0u32.to_le_bytes()); // extrefsymoff
    out.extend_from_slice(&0u32.to_le_bytes()); // nextrefsyms
    out.extend_from_slice(&(indirectsymoff as u32).to_le_bytes());
    out.extend_from_slice(&nindirectsyms.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // extreloff
    out.extend_from_slice(&0u32.to_le_bytes()); // nextrel
    out.extend_from_slice(&0u32.to_le_bytes()); // locreloff
    out.extend_from_slice(&0u32.to_le_bytes()); // nlocrel
}

fn write_lc_main(out: &mut Vec<u8>, entry_offset: u64) {
    out.extend_from_slice(&LC_MAIN.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes());
    out.extend_from_slice(&entry_offset.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // stacksize, 0 = default
}

fn write_lc_load_dylib(out: &mut Vec<u8>, path: &str, path_padded: usize) {
    let cmdsize = 24 + path_padded as u32;
    out.extend_from_slice(&LC_LOAD_DYLIB.to_le_bytes());
    out.extend_from_slice(&cmdsize.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes()); // name offset within this load command
    out.extend_from_slice(&0u32.to_le_bytes()); // timestamp
    out.extend_from_slice(&1u32.to_le_bytes()); // current_version
    out.extend_from_slice(&1u32.to_le_bytes()); // compatibility_version
    let before = out.len() as u64;
    out.extend_from_slice(path.as_bytes());
    pad_to(out, before + path_padded as u64);
}

fn write_nlist(out: &mut Vec<u8>, strx: u32, value: u64) {
    out.extend_from_slice(&strx.to_le_bytes());
    out.push(0x0f); // N_SECT | N_EXT
    out.push(1); // n_sect: the __text section
    out.extend_from_slice(&0u16.to_le_bytes()); // n_desc
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_undefined_nlist(out: &mut Vec<u8>, strx: u32) {
    out.extend_from_slice(&strx.to_le_bytes());
    out.push(0x01); // N_UNDF | N_EXT
    out.push(0);
    out.extend_from_slice(&0u16.to_le_bytes()); // n_desc (ordinal 0: any loaded image)
    out.extend_from_slice(&0u64.to_le_bytes());
}

fn build_strtab(entry_symbol: &str, externals: &[String]) -> Vec<u8> {
    let mut out = vec![0u8]; // index 0 is reserved
    out.extend_from_slice(entry_symbol.as_bytes());
    out.push(0);
    for name in externals {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    out
}
