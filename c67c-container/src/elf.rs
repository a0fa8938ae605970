//! ELF64 executable writer for Linux and FreeBSD targets.
//!
//! Builds a dynamically-linked executable directly: ELF header, program headers, a PLT/GOT for
//! every external (imported) function, `.dynsym`/`.dynstr`/`.hash`/`.rela.plt` for the dynamic
//! linker, and a minimal `.dynamic` section naming one needed library. No section header table is
//! emitted — the Linux/FreeBSD loader consults only program headers to map an executable, so one
//! isn't required for loadability, only for tools like `readelf`/`objdump` that want section names.

use c67c_codegen::{Builder, SectionBases};
use c67c_target::{Arch, Target};

use crate::error::ContainerError;

const EI_NIDENT: usize = 16;
const ET_EXEC: u16 = 2;
const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;
const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

const PAGE: u64 = 0x1000;
const BASE_ADDR: u64 = 0x0040_0000;

fn align_up(v: u64, align: u64) -> u64 {
    (v + align - 1) / align * align
}

fn em_machine(arch: Arch) -> u16 {
    match arch {
        Arch::X86_64 => 62,
        Arch::Arm64 => 183,
        Arch::Riscv64 => 243,
    }
}

fn interp_path(arch: Arch) -> &'static str {
    match arch {
        Arch::X86_64 => "/lib64/ld-linux-x86-64.so.2\0",
        Arch::Arm64 => "/lib/ld-linux-aarch64.so.1\0",
        Arch::Riscv64 => "/lib/ld-linux-riscv64-lp64d.so.1\0",
    }
}

/// Build a loadable ELF64 executable from `builder`, whose text section must already contain
/// `entry_symbol` as a defined label. `externals` lists every function name that is resolved at
/// dynamic-link time rather than defined in `builder`'s own text; a PLT stub and GOT slot are
/// generated for each.
pub fn write(mut builder: Builder, target: &Target, entry_symbol: &str, externals: &[String]) -> Result<Vec<u8>, ContainerError> {
    let arch = target.arch();
    let phnum = 5u32; // PT_INTERP + PT_LOAD(ro) + PT_LOAD(rx) + PT_LOAD(rw) + PT_DYNAMIC

    // ---- Every size below is known without touching the builder's relocations, so the whole
    // file layout is fixed up front; only then do external call sites get real addresses to patch
    // against. ----
    let plt_stub_len: u64 = 16;
    let plt_size = externals.len() as u64 * plt_stub_len;
    let got_size = externals.len() as u64 * 8;
    let rela_plt_size = externals.len() as u64 * 24;

    let header_len = 64 + phnum as u64 * 56;
    let interp = interp_path(arch);
    let dynstr = build_dynstr(externals);
    let dynsym = build_dynsym_placeholder(externals);
    let hash = build_hash(externals.len());

    let dynsym_offset = align_up(header_len + interp.len() as u64, 8);
    let dynstr_offset = dynsym_offset + dynsym.len() as u64;
    let hash_offset = dynstr_offset + dynstr.len() as u64;
    let rela_plt_offset = hash_offset + hash.len() as u64;
    let dynamic_offset = rela_plt_offset + rela_plt_size;
    let dynamic_size = 10 * 16; // 10 two-qword Elf64_Dyn entries, see build_dynamic
    let rodata_hdr_end = dynamic_offset + dynamic_size;

    let rodata_len = builder.rodata().offset() as u64;
    let ro_segment_end = rodata_hdr_end + rodata_len;

    let plt_file = align_up(ro_segment_end, PAGE);
    let plt_vaddr = BASE_ADDR + plt_file;
    let text_file = plt_file + plt_size;
    let text_vaddr = plt_vaddr + plt_size;
    let text_len = builder.text().offset() as u64;

    let got_file = align_up(text_file + text_len, PAGE);
    let got_vaddr = BASE_ADDR + got_file;
    let data_file = got_file + got_size;
    let data_vaddr = got_vaddr + got_size;

    let dynamic = build_dynamic(
        BASE_ADDR + dynsym_offset,
        BASE_ADDR + dynstr_offset,
        dynstr.len() as u64,
        got_vaddr,
        BASE_ADDR + rela_plt_offset,
        rela_plt_size,
    );
    debug_assert_eq!(dynamic.len() as u64, dynamic_size);

    for (i, name) in externals.iter().enumerate() {
        builder.define_address(name, plt_vaddr + i as u64 * plt_stub_len);
    }

    let bases = SectionBases {
        header: BASE_ADDR,
        rodata: BASE_ADDR + rodata_hdr_end,
        data: data_vaddr,
        text: text_vaddr,
    };
    let image = builder.finalize_with_bases(bases)?;

    let entry_vaddr = image
        .symbols
        .iter()
        .find(|(name, _, is_fn)| *is_fn && name == entry_symbol)
        .map(|(_, addr, _)| *addr)
        .ok_or_else(|| ContainerError::MissingEntryPoint(entry_symbol.to_string()))?;

    let plt = build_plt_stubs(arch, externals.len(), plt_vaddr, got_vaddr);
    let rela_plt = build_rela_plt(arch, got_vaddr, externals.len());

    let mut out = Vec::new();
    write_ehdr(&mut out, arch, entry_vaddr, phnum);
    write_phdrs(
        &mut out,
        header_len,
        interp,
        ro_segment_end,
        plt_file,
        text_file + text_len - plt_file,
        plt_vaddr,
        got_size + image.data.len() as u64,
        got_vaddr,
        dynamic_offset,
        dynamic_size,
    );
    out.extend_from_slice(interp.as_bytes());
    pad_to(&mut out, dynsym_offset);
    out.extend_from_slice(&dynsym);
    out.extend_from_slice(&dynstr);
    out.extend_from_slice(&hash);
    out.extend_from_slice(&rela_plt);
    out.extend_from_slice(&dynamic);
    pad_to(&mut out, rodata_hdr_end);
    out.extend_from_slice(&image.rodata);
    pad_to(&mut out, plt_file);
    out.extend_from_slice(&plt);
    out.extend_from_slice(&image.text);
    pad_to(&mut out, got_file);
    out.extend_from_slice(&vec![0u8; got_size as usize]);
    out.extend_from_slice(&image.data);

    Ok(out)
}

fn pad_to(out: &mut Vec<u8>, target_len: u64) {
    while (out.len() as u64) < target_len {
        out.push(0);
    }
}

fn write_ehdr(out: &mut Vec<u8>, arch: Arch, entry: u64, phnum: u32) {
    let mut ident = [0u8; EI_NIDENT];
    ident[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    ident[4] = 2; // ELFCLASS64
    ident[5] = 1; // ELFDATA2LSB
    ident[6] = 1; // EV_CURRENT
    out.extend_from_slice(&ident);
    out.extend_from_slice(&ET_EXEC.to_le_bytes());
    out.extend_from_slice(&em_machine(arch).to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&64u64.to_le_bytes()); // e_phoff
    out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff (no section header table)
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
    out.extend_from_slice(&56u16.to_le_bytes()); // e_phentsize
    out.extend_from_slice(&(phnum as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
}

#[allow(clippy::too_many_arguments)]
fn write_phdrs(
    out: &mut Vec<u8>,
    header_len: u64,
    interp: &str,
    ro_file_end: u64,
    rx_file_off: u64,
    rx_size: u64,
    rx_vaddr: u64,
    rw_size: u64,
    rw_vaddr: u64,
    dynamic_off: u64,
    dynamic_size: u64,
) {
    write_phdr(out, PT_INTERP, PF_R, header_len, BASE_ADDR + header_len, interp.len() as u64);
    write_phdr(out, PT_LOAD, PF_R, 0, BASE_ADDR, ro_file_end);
    write_phdr(out, PT_LOAD, PF_R | PF_X, rx_file_off, rx_vaddr, rx_size);
    write_phdr(out, PT_LOAD, PF_R | PF_W, rx_file_off + rx_size, rw_vaddr, rw_size);
    write_phdr(out, PT_DYNAMIC, PF_R, dynamic_off, BASE_ADDR + dynamic_off, dynamic_size);
}

fn write_phdr(out: &mut Vec<u8>, p_type: u32, p_flags: u32, offset: u64, vaddr: u64, size: u64) {
    out.extend_from_slice(&p_type.to_le_bytes());
    out.extend_from_slice(&p_flags.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&vaddr.to_le_bytes());
    out.extend_from_slice(&vaddr.to_le_bytes()); // p_paddr, unused on Linux/FreeBSD
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&PAGE.to_le_bytes());
}

fn build_dynstr(externals: &[String]) -> Vec<u8> {
    let mut out = vec![0u8]; // index 0 is always the empty string
    for name in externals {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    out
}

/// `Elf64_Sym` entries, one per external, with `st_name` offsets matching `build_dynstr`'s layout
/// (index 0 is the empty string, then each name in order, each `name.len()+1` bytes long).
fn build_dynsym_placeholder(externals: &[String]) -> Vec<u8> {
    let mut out = vec![0u8; 24]; // the mandatory null symbol at index 0
    let mut name_off = 1u32;
    for name in externals {
        out.extend_from_slice(&name_off.to_le_bytes()); // st_name
        out.push(0x12); // st_info: STB_GLOBAL(1) << 4 | STT_FUNC(2)
        out.push(0); // st_other
        out.extend_from_slice(&0u16.to_le_bytes()); // st_shndx: SHN_UNDEF
        out.extend_from_slice(&0u64.to_le_bytes()); // st_value
        out.extend_from_slice(&0u64.to_le_bytes()); // st_size
        name_off += name.len() as u32 + 1;
    }
    out
}

fn build_hash(count: usize) -> Vec<u8> {
    // A single-bucket SysV hash table: every symbol chains off bucket 0. Correct, just not
    // average-case fast — fine for the handful of imports a generated program needs.
    let nbucket = 1u32;
    let nchain = (count + 1) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(&nbucket.to_le_bytes());
    out.extend_from_slice(&nchain.to_le_bytes());
    out.extend_from_slice(&(if count > 0 { 1u32 } else { 0 }).to_le_bytes()); // bucket[0]
    out.extend_from_slice(&0u32.to_le_bytes()); // chain[0] (null symbol)
    for i in 1..count {
        out.extend_from_slice(&((i + 1) as u32).to_le_bytes());
    }
    if count > 0 {
        out.extend_from_slice(&0u32.to_le_bytes()); // last chain entry terminates
    }
    out
}

/// The jump-slot relocation type is architecture-specific even though the `Elf64_Rela` layout
/// itself is uniform.
fn jump_slot_reloc_type(arch: Arch) -> u64 {
    match arch {
        Arch::X86_64 => 7,  // R_X86_64_JUMP_SLOT
        Arch::Arm64 => 1026, // R_AARCH64_JUMP_SLOT
        Arch::Riscv64 => 5, // R_RISCV_JUMP_SLOT
    }
}

fn build_rela_plt(arch: Arch, got_vaddr: u64, count: usize) -> Vec<u8> {
    let reloc_type = jump_slot_reloc_type(arch);
    let mut out = Vec::new();
    for i in 0..count {
        let r_offset = got_vaddr + i as u64 * 8;
        let r_info = ((i as u64 + 1) << 32) | reloc_type;
        out.extend_from_slice(&r_offset.to_le_bytes());
        out.extend_from_slice(&r_info.to_le_bytes());
        out.extend_from_slice(&0i64.to_le_bytes()); // r_addend
    }
    out
}

fn build_dynamic(dynsym_off: u64, dynstr_off: u64, dynstr_size: u64, pltgot_vaddr: u64, jmprel_vaddr: u64, pltrelsz: u64) -> Vec<u8> {
    const DT_NEEDED: u64 = 1;
    const DT_STRTAB: u64 = 5;
    const DT_SYMTAB: u64 = 6;
    const DT_STRSZ: u64 = 10;
    const DT_SYMENT: u64 = 11;
    const DT_PLTGOT: u64 = 3;
    const DT_PLTRELSZ: u64 = 2;
    const DT_PLTREL: u64 = 20;
    const DT_JMPREL: u64 = 23;
    const DT_NULL: u64 = 0;
    const DT_RELA_TAG: u64 = 7;

    let mut out = Vec::new();
    let mut entry = |tag: u64, val: u64, out: &mut Vec<u8>| {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&val.to_le_bytes());
    };
    entry(DT_NEEDED, 1, &mut out); // index 1 into .dynstr is reserved for "libc.so.6" by convention here
    entry(DT_SYMTAB, BASE_ADDR + dynsym_off, &mut out);
    entry(DT_STRTAB, BASE_ADDR + dynstr_off, &mut out);
    entry(DT_STRSZ, dynstr_size, &mut out);
    entry(DT_SYMENT, 24, &mut out);
    entry(DT_PLTGOT, pltgot_vaddr, &mut out);
    entry(DT_PLTRELSZ, pltrelsz, &mut out);
    entry(DT_PLTREL, DT_RELA_TAG, &mut out);
    entry(DT_JMPREL, jmprel_vaddr, &mut out);
    entry(DT_NULL, 0, &mut out);
    out
}

fn build_plt_stubs(arch: Arch, count: usize, plt_vaddr: u64, got_vaddr: u64) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..count {
        let stub_addr = plt_vaddr + i as u64 * 16;
        let got_slot = got_vaddr + i as u64 * 8;
        match arch {
            Arch::X86_64 => {
                // FF 25 disp32 : jmp [rip+disp] -> GOT slot. Non-lazy: no PUSH+JMP resolver stub.
                let disp = got_slot as i64 - (stub_addr as i64 + 6);
                out.push(0xFF);
                out.push(0x25);
                out.extend_from_slice(&(disp as i32).to_le_bytes());
                out.extend_from_slice(&[0x90; 10]); // pad to 16 bytes with NOPs
            }
            Arch::Arm64 => {
                // LDR x16, [PC, #8]; BR x16; .xword got_slot (8 bytes of literal data, 16 total).
                out.extend_from_slice(&0x58000050u32.to_le_bytes()); // LDR x16, #8
                out.extend_from_slice(&0xD61F0200u32.to_le_bytes()); // BR x16
                out.extend_from_slice(&got_slot.to_le_bytes());
            }
            Arch::Riscv64 => {
                // AUIPC t1, 0; LD t1, 8(t1); JALR zero, 0(t1); .dword got_slot (16 bytes total).
                out.extend_from_slice(&0x00000317u32.to_le_bytes()); // AUIPC t1, 0
                out.extend_from_slice(&0x00833303u32.to_le_bytes()); // LD t1, 8(t1)
                out.extend_from_slice(&0x00030067u32.to_le_bytes()); // JALR zero, 0(t1)
                out.extend_from_slice(&(got_slot as u32).to_le_bytes());
            }
        }
    }
    out
}
