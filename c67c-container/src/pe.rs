//! PE32+ executable writer for Windows targets.
//!
//! DOS header (just enough for `e_lfanew`) + PE signature + COFF header + Optional Header
//! (PE32+) + a `.text` section (code and rodata) and a `.data` section (writable data, plus the
//! Import Address Table). Every external resolves through the IAT: call sites are patched to
//! `[RIP+disp32]` against their IAT slot rather than a direct `rel32` call, matching how x86-64
//! Windows binaries call into `kernel32`/`ucrtbase` without a PLT-style trampoline.

use c67c_codegen::{Builder, SectionBases};
use c67c_target::Target;

use crate::error::ContainerError;

const IMAGE_DOS_SIGNATURE: u16 = 0x5a4d; // "MZ"
const IMAGE_NT_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;
const IMAGE_FILE_EXECUTABLE_IMAGE: u16 = 0x0002;
const IMAGE_FILE_LARGE_ADDRESS_AWARE: u16 = 0x0020;
const IMAGE_NT_OPTIONAL_HDR64_MAGIC: u16 = 0x020b;
const IMAGE_SUBSYSTEM_WINDOWS_CUI: u16 = 3;
const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;
const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

const FILE_ALIGN: u64 = 0x200;
const SECTION_ALIGN: u64 = 0x1000;
const IMAGE_BASE: u64 = 0x1_4000_0000;

fn align_up(v: u64, align: u64) -> u64 {
    (v + align - 1) / align * align
}

/// Build a loadable PE32+ executable. Every name in `externals` is imported from a single DLL
/// (`dll_name`) — a generated program only ever needs one runtime import library (`ucrtbase.dll`
/// on modern toolchains, or a custom host runtime), so there is no per-symbol DLL selection here.
pub fn write(mut builder: Builder, target: &Target, entry_symbol: &str, externals: &[String], dll_name: &str) -> Result<Vec<u8>, ContainerError> {
    let machine = match target.arch() {
        c67c_target::Arch::X86_64 => IMAGE_FILE_MACHINE_AMD64,
        c67c_target::Arch::Arm64 => IMAGE_FILE_MACHINE_ARM64,
        other => return Err(ContainerError::Layout(format!("PE has no machine mapping for {other:?}"))),
    };

    let dos_stub_len = 0x80u64; // MZ header + stub, e_lfanew points right after
    let num_sections = 2u32; // .text, .data
    let optional_header_len = 112 + 2 * 8; // fixed PE32+ fields + 2 data directory slots (Export, Import)
    let coff_and_opt_len = 4 + 20 + optional_header_len + num_sections as u64 * 40;
    let headers_len = align_up(dos_stub_len + coff_and_opt_len, FILE_ALIGN);

    // ---- Import table layout: one Import Directory Table entry for the single DLL, an Import
    // Lookup Table / Import Address Table pair (identical before binding) per external, plus the
    // Hint/Name table and the DLL name string, all living in `.data`. ----
    let idt_size = 2 * 20; // one real entry + the null terminator entry
    let ilt_size = (externals.len() as u64 + 1) * 8; // + null terminator
    let iat_size = ilt_size;
    let hint_name_entries: Vec<Vec<u8>> = externals
        .iter()
        .map(|name| {
            let mut e = vec![0u8, 0u8]; // Hint = 0
            e.extend_from_slice(name.as_bytes());
            e.push(0);
            if e.len() % 2 != 0 {
                e.push(0); // Hint/Name entries are word-aligned
            }
            e
        })
        .collect();
    let hint_name_size: u64 = hint_name_entries.iter().map(|e| e.len() as u64).sum();
    let dll_name_bytes = {
        let mut s = dll_name.as_bytes().to_vec();
        s.push(0);
        s
    };

    let text_file_off = headers_len;
    let text_rva = SECTION_ALIGN;
    let text_len = builder.text().offset() as u64;
    let rodata_len = builder.rodata().offset() as u64;
    let text_raw_size = align_up(text_len + rodata_len, FILE_ALIGN);
    let text_virt_size = text_len + rodata_len;

    let data_file_off = text_file_off + text_raw_size;
    let data_rva = align_up(text_rva + text_virt_size, SECTION_ALIGN);

    // Within `.data`: IAT first (needs a stable RVA for call-site patching), then the rest.
    let iat_rva = data_rva;
    let idt_rva = iat_rva + iat_size;
    let ilt_rva = idt_rva + idt_size;
    let hint_name_rva = ilt_rva + ilt_size;
    let dll_name_rva = hint_name_rva + hint_name_size;
    let user_data_rva = align_up(dll_name_rva + dll_name_bytes.len() as u64, 8);
    let data_virt_size = user_data_rva - data_rva + builder.data().offset() as u64;
    let data_raw_size = align_up(data_virt_size, FILE_ALIGN);

    for (i, name) in externals.iter().enumerate() {
        builder.define_address(name, IMAGE_BASE + iat_rva + i as u64 * 8);
    }

    let bases = SectionBases {
        header: IMAGE_BASE,
        rodata: IMAGE_BASE + text_rva + text_len,
        data: IMAGE_BASE + user_data_rva,
        text: IMAGE_BASE + text_rva,
    };
    let image = builder.finalize_with_bases(bases)?;

    let entry_rva = image
        .symbols
        .iter()
        .find(|(name, _, is_fn)| *is_fn && name == entry_symbol)
        .map(|(_, addr, _)| addr - IMAGE_BASE)
        .ok_or_else(|| ContainerError::MissingEntryPoint(entry_symbol.to_string()))?;

    let image_size = align_up(data_rva + data_virt_size, SECTION_ALIGN);

    let mut out = Vec::new();
    write_dos_header(&mut out, dos_stub_len);
    write_nt_headers(
        &mut out,
        machine,
        num_sections,
        entry_rva,
        text_rva,
        image_size,
        headers_len,
        optional_header_len,
        idt_rva,
        idt_size,
        iat_rva,
        iat_size,
    );
    write_section_header(&mut out, ".text", text_virt_size, text_rva, text_raw_size, text_file_off, IMAGE_SCN_CNT_CODE | IMAGE_SCN_MEM_EXECUTE | IMAGE_SCN_MEM_READ);
    write_section_header(&mut out, ".data", data_virt_size, data_rva, data_raw_size, data_file_off, IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ | IMAGE_SCN_MEM_WRITE);

    pad_to(&mut out, text_file_off);
    out.extend_from_slice(&image.text);
    out.extend_from_slice(&image.rodata);
    pad_to(&mut out, data_file_off);

    // IAT: before load, identical to the ILT (a pointer-sized ordinal/hint-RVA per import).
    for i in 0..externals.len() as u64 {
        out.extend_from_slice(&(hint_name_rva + hint_name_entries[..i as usize].iter().map(|e| e.len() as u64).sum::<u64>()).to_le_bytes());
    }
    out.extend_from_slice(&0u64.to_le_bytes()); // IAT null terminator

    write_import_directory_entry(&mut out, ilt_rva, dll_name_rva, iat_rva);
    write_import_directory_entry(&mut out, 0, 0, 0); // null terminator entry

    for i in 0..externals.len() as u64 {
        out.extend_from_slice(&(hint_name_rva + hint_name_entries[..i as usize].iter().map(|e| e.len() as u64).sum::<u64>()).to_le_bytes());
    }
    out.extend_from_slice(&0u64.to_le_bytes()); // ILT null terminator

    for entry in &hint_name_entries {
        out.extend_from_slice(entry);
    }
    out.extend_from_slice(&dll_name_bytes);

    pad_to(&mut out, data_file_off + (user_data_rva - data_rva));
    out.extend_from_slice(&image.data);
    pad_to(&mut out, data_file_off + data_raw_size);

    Ok(out)
}

fn pad_to(out: &mut Vec<u8>, target_len: u64) {
    while (out.len() as u64) < target_len {
        out.push(0);
    }
}

fn write_dos_header(out: &mut Vec<u8>, e_lfanew: u64) {
    out.extend_from_slice(&IMAGE_DOS_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&[0u8; 58]); // rest of the DOS header, unused by any loader that honors e_lfanew
    out.extend_from_slice(&(e_lfanew as u32).to_le_bytes());
    pad_to(out, e_lfanew);
}

#[allow(clippy::too_many_arguments)]
fn write_nt_headers(
    out: &mut Vec<u8>,
    machine: u16,
    num_sections: u32,
    entry_rva: u64,
    base_of_code: u64,
    image_size: u64,
    headers_size: u64,
    optional_header_len: u64,
    idt_rva: u64,
    idt_size: u64,
    iat_rva: u64,
    iat_size: u64,
) {
    out.extend_from_slice(&IMAGE_NT_SIGNATURE.to_le_bytes());

    // COFF header
    out.extend_from_slice(&machine.to_le_bytes());
    out.extend_from_slice(&(num_sections as u16).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // TimeDateStamp
    out.extend_from_slice(&0u32.to_le_bytes()); // PointerToSymbolTable
    out.extend_from_slice(&0u32.to_le_bytes()); // NumberOfSymbols
    out.extend_from_slice(&(optional_header_len as u16).to_le_bytes());
    out.extend_from_slice(&(IMAGE_FILE_EXECUTABLE_IMAGE | IMAGE_FILE_LARGE_ADDRESS_AWARE).to_le_bytes());

    // Optional header (PE32+)
    out.extend_from_slice(&IMAGE_NT_OPTIONAL_HDR64_MAGIC.to_le_bytes());
    out.push(14); // MajorLinkerVersion
    out.push(0); // MinorLinkerVersion
    out.extend_from_slice(&(base_of_code as u32).to_le_bytes()); // SizeOfCode (approximated as text RVA span; informational)
    out.extend_from_slice(&0u32.to_le_bytes()); // SizeOfInitializedData
    out.extend_from_slice(&0u32.to_le_bytes()); // SizeOfUninitializedData
    out.extend_from_slice(&(entry_rva as u32).to_le_bytes());
    out.extend_from_slice(&(base_of_code as u32).to_le_bytes()); // BaseOfCode
    out.extend_from_slice(&IMAGE_BASE.to_le_bytes());
    out.extend_from_slice(&(SECTION_ALIGN as u32).to_le_bytes());
    out.extend_from_slice(&(FILE_ALIGN as u32).to_le_bytes());
    out.extend_from_slice(&6u16.to_le_bytes()); // MajorOperatingSystemVersion
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // MajorImageVersion
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&6u16.to_le_bytes()); // MajorSubsystemVersion
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // Win32VersionValue
    out.extend_from_slice(&(image_size as u32).to_le_bytes());
    out.extend_from_slice(&(headers_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // CheckSum
    out.extend_from_slice(&IMAGE_SUBSYSTEM_WINDOWS_CUI.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // DllCharacteristics
    out.extend_from_slice(&0x10_0000u64.to_le_bytes()); // SizeOfStackReserve
    out.extend_from_slice(&0x1000u64.to_le_bytes()); // SizeOfStackCommit
    out.extend_from_slice(&0x10_0000u64.to_le_bytes()); // SizeOfHeapReserve
    out.extend_from_slice(&0x1000u64.to_le_bytes()); // SizeOfHeapCommit
    out.extend_from_slice(&0u32.to_le_bytes()); // LoaderFlags
    out.extend_from_slice(&2u32.to_le_bytes()); // NumberOfRvaAndSizes (only Import + IAT are populated)

    // Data directories: [0] Export, [1] Import
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(idt_rva as u32).to_le_bytes());
    out.extend_from_slice(&(idt_size as u32).to_le_bytes());
    let _ = iat_rva;
    let _ = iat_size;
}

fn write_section_header(out: &mut Vec<u8>, name: &str, virt_size: u64, virt_addr: u64, raw_size: u64, raw_ptr: u64, characteristics: u32) {
    let mut name_buf = [0u8; 8];
    let bytes = name.as_bytes();
    name_buf[..bytes.len()].copy_from_slice(bytes);
    out.extend_from_slice(&name_buf);
    out.extend_from_slice(&(virt_size as u32).to_le_bytes());
    out.extend_from_slice(&(virt_addr as u32).to_le_bytes());
    out.extend_from_slice(&(raw_size as u32).to_le_bytes());
    out.extend_from_slice(&(raw_ptr as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // PointerToRelocations
    out.extend_from_slice(&0u32.to_le_bytes()); // PointerToLinenumbers
    out.extend_from_slice(&0u16.to_le_bytes()); // NumberOfRelocations
    out.extend_from_slice(&0u16.to_le_bytes()); // NumberOfLinenumbers
    out.extend_from_slice(&characteristics.to_le_bytes());
}

fn write_import_directory_entry(out: &mut Vec<u8>, ilt_rva: u64, name_rva: u64, iat_rva: u64) {
    out.extend_from_slice(&(ilt_rva as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // TimeDateStamp
    out.extend_from_slice(&0u32.to_le_bytes()); // ForwarderChain
    out.extend_from_slice(&(name_rva as u32).to_le_bytes());
    out.extend_from_slice(&(iat_rva as u32).to_le_bytes());
}
