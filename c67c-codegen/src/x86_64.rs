//! x86-64 instruction encoder.
//!
//! Legacy encodings (REX + ModRM) cover GPR data movement, arithmetic, and scalar SSE2 doubles.
//! 256-bit packed-double operations use a 3-byte VEX prefix; 512-bit operations use a 4-byte EVEX
//! prefix, both built by [`vex`]. Mask registers (`k0`-`k7`) use the AVX-512 `kand`/`kor`/`kxor`/
//! `knot` family, which take a VEX-style encoding of their own.

use c67c_target::{Arch, Register, RegisterClass, Target};

use crate::emitter::{ArchEmitter, DisplacementSite};
use crate::error::EmitError;
use crate::operand::{Condition, MemOperand, RoundMode, ShiftAmount, VectorWidth, Width};
use crate::vex;

fn resolve(target: &Target, name: &str, class: RegisterClass) -> Result<Register, EmitError> {
    let reg = c67c_target::lookup(target.arch(), name)
        .ok_or_else(|| EmitError::UnknownRegister(name.to_string()))?;
    if reg.class != class {
        return Err(EmitError::WrongRegisterClass {
            name: name.to_string(),
            expected: class,
            actual: reg.class,
        });
    }
    Ok(reg)
}

fn check_width(reg: Register, w: Width) -> Result<(), EmitError> {
    if reg.size_bits != w.bits() {
        return Err(EmitError::UnsupportedWidth(reg.size_bits));
    }
    Ok(())
}

fn imm_fits(imm: i64, bits: u32) -> Result<(), EmitError> {
    if bits >= 64 {
        return Ok(());
    }
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    let umax = (1u64 << bits) - 1;
    if (imm >= min && imm <= max) || (imm >= 0 && (imm as u64) <= umax) {
        Ok(())
    } else {
        Err(EmitError::ImmediateOutOfRange { value: imm, bits })
    }
}

fn rex(w: bool, reg_enc: u8, rm_enc: u8, force: bool) -> Option<u8> {
    let r = (reg_enc & 0x8) != 0;
    let b = (rm_enc & 0x8) != 0;
    if w || r || b || force {
        Some(0x40 | ((w as u8) << 3) | ((r as u8) << 2) | (b as u8))
    } else {
        None
    }
}

fn modrm(mode: u8, reg_field: u8, rm_field: u8) -> u8 {
    (mode << 6) | ((reg_field & 7) << 3) | (rm_field & 7)
}

/// Emit a register-register instruction: optional `66` prefix, optional REX, opcode byte(s),
/// ModRM with mod=11. `reg` occupies the ModRM.reg field, `rm` the ModRM.rm field.
fn emit_rr(out: &mut Vec<u8>, w: Width, opcode: &[u8], reg_reg: Register, rm_reg: Register) {
    if w == Width::W16 {
        out.push(0x66);
    }
    if let Some(b) = rex(w == Width::W64, reg_reg.encoding, rm_reg.encoding, w == Width::W8) {
        out.push(b);
    }
    out.extend_from_slice(opcode);
    out.push(modrm(0b11, reg_reg.encoding, rm_reg.encoding));
}

/// Emit an opcode-extension instruction (`/digit` forms like `NEG`, `NOT`, `IDIV`, the shift
/// group): `ext` is a literal 3-bit ModRM.reg value, never a register, so it never contributes a
/// REX.R bit.
fn emit_ext(out: &mut Vec<u8>, w: Width, opcode: &[u8], ext: u8, rm_reg: Register) {
    if w == Width::W16 {
        out.push(0x66);
    }
    if let Some(b) = rex(w == Width::W64, 0, rm_reg.encoding, w == Width::W8) {
        out.push(b);
    }
    out.extend_from_slice(opcode);
    out.push(modrm(0b11, ext, rm_reg.encoding));
}

/// Emit `[base + disp]` memory-operand bytes following a ModRM byte whose reg field the caller
/// has already written (mod bits chosen here based on `disp`).
fn emit_mem(out: &mut Vec<u8>, reg_field: u8, base: Register, disp: i32) {
    let mode: u8 = if disp == 0 && (base.encoding & 7) != 5 {
        0b00
    } else if disp >= -128 && disp <= 127 {
        0b01
    } else {
        0b10
    };
    // rsp/r12 (encoding & 7 == 4) require a SIB byte even for plain base-only addressing.
    let needs_sib = (base.encoding & 7) == 4;
    out.push(modrm(mode, reg_field, if needs_sib { 0b100 } else { base.encoding }));
    if needs_sib {
        // scale=00, index=100 (none), base=100 (rsp/r12's low 3 bits)
        out.push(0x24);
    }
    match mode {
        0b00 if (base.encoding & 7) == 5 => out.extend_from_slice(&0i32.to_le_bytes()),
        0b01 => out.push(disp as i8 as u8),
        0b10 => out.extend_from_slice(&disp.to_le_bytes()),
        _ => {}
    }
}

fn emit_mem_op(out: &mut Vec<u8>, w: Width, opcode: &[u8], reg: Register, mem: Register, disp: i32, force_rex: bool) {
    if w == Width::W16 {
        out.push(0x66);
    }
    if let Some(b) = rex(w == Width::W64, reg.encoding, mem.encoding, force_rex) {
        out.push(b);
    }
    out.extend_from_slice(opcode);
    emit_mem(out, reg.encoding, mem, disp);
}

fn imm_bytes(imm: i64, w: Width) -> Vec<u8> {
    match w {
        Width::W8 => vec![imm as u8],
        Width::W16 => (imm as i16).to_le_bytes().to_vec(),
        Width::W32 | Width::W64 => (imm as i32).to_le_bytes().to_vec(),
    }
}

/// A struct-of-one holding the target; all dispatch is done through [`ArchEmitter`] default
/// methods being overridden below.
pub struct X86_64Emitter {
    target: Target,
}

impl X86_64Emitter {
    /// Build an emitter for `target`. Panics in debug builds if `target.arch()` is not
    /// [`Arch::X86_64`]; callers only reach this through [`crate::emitter::InstructionEmitter`],
    /// which guarantees the match.
    pub fn new(target: Target) -> Self {
        debug_assert_eq!(target.arch(), Arch::X86_64);
        Self { target }
    }

    fn gpr(&self, name: &str) -> Result<Register, EmitError> {
        resolve(&self.target, name, RegisterClass::Integer)
    }

    fn vreg(&self, name: &str) -> Result<Register, EmitError> {
        resolve(&self.target, name, RegisterClass::Vector)
    }

    fn mreg(&self, name: &str) -> Result<Register, EmitError> {
        resolve(&self.target, name, RegisterClass::Mask)
    }

    fn vec_width_of(&self, reg: Register) -> VectorWidth {
        match reg.size_bits {
            256 => VectorWidth::Bits256,
            512 => VectorWidth::Bits512,
            _ => VectorWidth::Bits128,
        }
    }
}

impl ArchEmitter for X86_64Emitter {
    fn target(&self) -> &Target {
        &self.target
    }

    fn mov_reg_reg(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        check_width(dst, w)?;
        check_width(src, w)?;
        let opcode = if w == Width::W8 { 0x88 } else { 0x89 };
        emit_rr(out, w, &[opcode], src, dst);
        Ok(())
    }

    fn mov_imm_reg(&self, out: &mut Vec<u8>, w: Width, dst: &str, imm: i64) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        check_width(dst, w)?;
        if w == Width::W64 {
            if let Some(b) = rex(true, 0, dst.encoding, false) {
                out.push(b);
            }
            out.push(0xB8 + (dst.encoding & 7));
            out.extend_from_slice(&imm.to_le_bytes());
        } else {
            imm_fits(imm, w.bits() as u32)?;
            if w == Width::W16 {
                out.push(0x66);
            }
            if let Some(b) = rex(false, 0, dst.encoding, w == Width::W8) {
                out.push(b);
            }
            out.push(if w == Width::W8 { 0xB0 } else { 0xB8 } + (dst.encoding & 7));
            out.extend_from_slice(&imm_bytes(imm, w));
        }
        Ok(())
    }

    fn load(
        &self,
        out: &mut Vec<u8>,
        w: Width,
        dst: &str,
        mem: MemOperand,
        sign_extend: bool,
    ) -> Result<(), EmitError> {
        let dst_reg = self.gpr(dst)?;
        let base = self.gpr(mem.base)?;
        match w {
            Width::W64 | Width::W32 if dst_reg.size_bits == w.bits() => {
                emit_mem_op(out, dst_reg_width(dst_reg), &[0x8B], dst_reg, base, mem.disp, false);
            }
            Width::W8 | Width::W16 => {
                let opcode: &[u8] = match (sign_extend, w) {
                    (false, Width::W8) => &[0x0F, 0xB6],
                    (false, Width::W16) => &[0x0F, 0xB7],
                    (true, Width::W8) => &[0x0F, 0xBE],
                    (true, Width::W16) => &[0x0F, 0xBF],
                    _ => unreachable!(),
                };
                emit_mem_op(out, dst_reg_width(dst_reg), opcode, dst_reg, base, mem.disp, true);
            }
            _ => return Err(EmitError::UnsupportedWidth(w.bits())),
        }
        Ok(())
    }

    fn store(&self, out: &mut Vec<u8>, w: Width, mem: MemOperand, src: &str) -> Result<(), EmitError> {
        let src_reg = self.gpr(src)?;
        check_width(src_reg, w)?;
        let base = self.gpr(mem.base)?;
        let opcode: u8 = if w == Width::W8 { 0x88 } else { 0x89 };
        emit_mem_op(out, w, &[opcode], src_reg, base, mem.disp, w == Width::W8);
        Ok(())
    }

    fn push(&self, out: &mut Vec<u8>, src: &str) -> Result<(), EmitError> {
        let src = self.gpr(src)?;
        if let Some(b) = rex(false, 0, src.encoding, false) {
            out.push(b);
        }
        out.push(0x50 + (src.encoding & 7));
        Ok(())
    }

    fn pop(&self, out: &mut Vec<u8>, dst: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        if let Some(b) = rex(false, 0, dst.encoding, false) {
            out.push(b);
        }
        out.push(0x58 + (dst.encoding & 7));
        Ok(())
    }

    fn lea(&self, out: &mut Vec<u8>, dst: &str, mem: MemOperand) -> Result<(), EmitError> {
        let dst_reg = self.gpr(dst)?;
        let base = self.gpr(mem.base)?;
        emit_mem_op(out, Width::W64, &[0x8D], dst_reg, base, mem.disp, false);
        Ok(())
    }

    fn add(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        check_width(dst, w)?;
        check_width(src, w)?;
        let opcode = if w == Width::W8 { 0x00 } else { 0x01 };
        emit_rr(out, w, &[opcode], src, dst);
        Ok(())
    }

    fn sub(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        check_width(dst, w)?;
        check_width(src, w)?;
        let opcode = if w == Width::W8 { 0x28 } else { 0x29 };
        emit_rr(out, w, &[opcode], src, dst);
        Ok(())
    }

    fn neg(&self, out: &mut Vec<u8>, w: Width, dst: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        check_width(dst, w)?;
        let opcode = if w == Width::W8 { 0xF6 } else { 0xF7 };
        emit_ext(out, w, &[opcode], 3, dst);
        Ok(())
    }

    fn mul(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        check_width(dst, w)?;
        check_width(src, w)?;
        if w == Width::W8 {
            return Err(self.unsupported("mul (8-bit IMUL r,r/m does not exist; use AX-form AH:AL)"));
        }
        emit_rr(out, w, &[0x0F, 0xAF], dst, src);
        Ok(())
    }

    fn div(
        &self,
        out: &mut Vec<u8>,
        w: Width,
        _dst: &str,
        _dividend: &str,
        divisor: &str,
    ) -> Result<(), EmitError> {
        let divisor = self.gpr(divisor)?;
        check_width(divisor, w)?;
        // Sign-extend rax into rdx:rax (or eax into edx:eax) ahead of IDIV, the x86-64 ABI's
        // fixed quotient/remainder pairing the contract documents.
        match w {
            Width::W64 => {
                out.push(0x48);
                out.push(0x99); // CQO
            }
            Width::W32 => out.push(0x99), // CDQ
            _ => {}
        }
        let opcode = if w == Width::W8 { 0xF6 } else { 0xF7 };
        emit_ext(out, w, &[opcode], 7, divisor);
        Ok(())
    }

    fn cmp(&self, out: &mut Vec<u8>, w: Width, a: &str, b: &str) -> Result<(), EmitError> {
        let a = self.gpr(a)?;
        let b = self.gpr(b)?;
        check_width(a, w)?;
        check_width(b, w)?;
        let opcode = if w == Width::W8 { 0x38 } else { 0x39 };
        emit_rr(out, w, &[opcode], b, a);
        Ok(())
    }

    fn and(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        emit_rr(out, w, &[if w == Width::W8 { 0x20 } else { 0x21 }], src, dst);
        Ok(())
    }

    fn or(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        emit_rr(out, w, &[if w == Width::W8 { 0x08 } else { 0x09 }], src, dst);
        Ok(())
    }

    fn xor(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        emit_rr(out, w, &[if w == Width::W8 { 0x30 } else { 0x31 }], src, dst);
        Ok(())
    }

    fn not(&self, out: &mut Vec<u8>, w: Width, dst: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let opcode = if w == Width::W8 { 0xF6 } else { 0xF7 };
        emit_ext(out, w, &[opcode], 2, dst);
        Ok(())
    }

    fn shl(&self, out: &mut Vec<u8>, w: Width, dst: &str, amount: ShiftAmount) -> Result<(), EmitError> {
        shift(self, out, w, dst, amount, 4)
    }

    fn shr(
        &self,
        out: &mut Vec<u8>,
        w: Width,
        dst: &str,
        amount: ShiftAmount,
        arithmetic: bool,
    ) -> Result<(), EmitError> {
        shift(self, out, w, dst, amount, if arithmetic { 7 } else { 5 })
    }

    fn bit_test(&self, out: &mut Vec<u8>, w: Width, src: &str, bit: u8) -> Result<(), EmitError> {
        let src = self.gpr(src)?;
        emit_ext(out, w, &[0x0F, 0xBA], 4, src);
        out.push(bit);
        Ok(())
    }

    fn jmp_placeholder(&self, out: &mut Vec<u8>) -> Result<DisplacementSite, EmitError> {
        out.push(0xE9);
        let site = out.len();
        out.extend_from_slice(&0i32.to_le_bytes());
        Ok(site)
    }

    fn jcc_placeholder(&self, out: &mut Vec<u8>, cond: Condition) -> Result<DisplacementSite, EmitError> {
        let tttn: u8 = match cond {
            Condition::Eq => 0x4,
            Condition::Ne => 0x5,
            Condition::Lt => 0xC,
            Condition::Ge => 0xD,
            Condition::Le => 0xE,
            Condition::Gt => 0xF,
            Condition::Below => 0x2,
            Condition::Above => 0x7,
        };
        out.push(0x0F);
        out.push(0x80 | tttn);
        let site = out.len();
        out.extend_from_slice(&0i32.to_le_bytes());
        Ok(site)
    }

    fn call_placeholder(&self, out: &mut Vec<u8>) -> Result<DisplacementSite, EmitError> {
        out.push(0xE8);
        let site = out.len();
        out.extend_from_slice(&0i32.to_le_bytes());
        Ok(site)
    }

    fn call_indirect_reg(&self, out: &mut Vec<u8>, target_reg: &str) -> Result<(), EmitError> {
        let r = self.gpr(target_reg)?;
        if let Some(b) = rex(false, 0, r.encoding, false) {
            out.push(b);
        }
        out.push(0xFF);
        out.push(modrm(0b11, 2, r.encoding));
        Ok(())
    }

    fn call_indirect_mem(&self, out: &mut Vec<u8>, mem: MemOperand) -> Result<(), EmitError> {
        let base = self.gpr(mem.base)?;
        if let Some(b) = rex(false, 0, base.encoding, false) {
            out.push(b);
        }
        out.push(0xFF);
        emit_mem(out, 2, base, mem.disp);
        Ok(())
    }

    fn load_address_placeholder(
        &self,
        out: &mut Vec<u8>,
        dst: &str,
    ) -> Result<Vec<DisplacementSite>, EmitError> {
        let dst = self.gpr(dst)?;
        if let Some(b) = rex(true, dst.encoding, 0, false) {
            out.push(b);
        }
        out.push(0x8D);
        out.push(modrm(0b00, dst.encoding, 0b101)); // RIP-relative
        let site = out.len();
        out.extend_from_slice(&0i32.to_le_bytes());
        Ok(vec![site])
    }

    fn ret(&self, out: &mut Vec<u8>) -> Result<(), EmitError> {
        out.push(0xC3);
        Ok(())
    }

    fn syscall(&self, out: &mut Vec<u8>) -> Result<(), EmitError> {
        out.push(0x0F);
        out.push(0x05);
        Ok(())
    }

    fn fload(&self, out: &mut Vec<u8>, dst: &str, mem: MemOperand) -> Result<(), EmitError> {
        let dst = self.vreg(dst)?;
        let base = self.gpr(mem.base)?;
        out.push(0xF2);
        if let Some(b) = rex(false, dst.encoding, base.encoding, false) {
            out.push(b);
        }
        out.extend_from_slice(&[0x0F, 0x10]);
        emit_mem(out, dst.encoding, base, mem.disp);
        Ok(())
    }

    fn fstore(&self, out: &mut Vec<u8>, mem: MemOperand, src: &str) -> Result<(), EmitError> {
        let src = self.vreg(src)?;
        let base = self.gpr(mem.base)?;
        out.push(0xF2);
        if let Some(b) = rex(false, src.encoding, base.encoding, false) {
            out.push(b);
        }
        out.extend_from_slice(&[0x0F, 0x11]);
        emit_mem(out, src.encoding, base, mem.disp);
        Ok(())
    }

    fn fadd(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_sse(self, out, 0x58, dst, src)
    }

    fn fsub(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_sse(self, out, 0x5C, dst, src)
    }

    fn fmul(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_sse(self, out, 0x59, dst, src)
    }

    fn fdiv(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_sse(self, out, 0x5E, dst, src)
    }

    fn fcmp(&self, out: &mut Vec<u8>, a: &str, b: &str) -> Result<(), EmitError> {
        let a = self.vreg(a)?;
        let b = self.vreg(b)?;
        out.push(0x66);
        if let Some(byte) = rex(false, a.encoding, b.encoding, false) {
            out.push(byte);
        }
        out.extend_from_slice(&[0x0F, 0x2E]);
        out.push(modrm(0b11, a.encoding, b.encoding));
        Ok(())
    }

    fn cvt_int_to_double(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.vreg(dst)?;
        let src = self.gpr(src)?;
        out.push(0xF2);
        if let Some(b) = rex(true, dst.encoding, src.encoding, false) {
            out.push(b);
        }
        out.extend_from_slice(&[0x0F, 0x2A]);
        out.push(modrm(0b11, dst.encoding, src.encoding));
        Ok(())
    }

    fn cvt_double_to_int(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.vreg(src)?;
        out.push(0xF2);
        if let Some(b) = rex(true, dst.encoding, src.encoding, false) {
            out.push(b);
        }
        out.extend_from_slice(&[0x0F, 0x2C]);
        out.push(modrm(0b11, dst.encoding, src.encoding));
        Ok(())
    }

    fn vadd(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x58, dst, a, b)
    }

    fn vsub(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x5C, dst, a, b)
    }

    fn vmul(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x59, dst, a, b)
    }

    fn vdiv(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x5E, dst, a, b)
    }

    fn vfma(
        &self,
        out: &mut Vec<u8>,
        w: VectorWidth,
        dst: &str,
        a: &str,
        b: &str,
        c: &str,
        is_sub: bool,
    ) -> Result<(), EmitError> {
        // VFMADD213PD/VFMSUB213PD: dst = a*dst + c form, `213` operand order (a, dst, c); we
        // require dst == a at the call site (as the AST lowering above this crate always does
        // after FMA synthesis binds the accumulator operand to the destination).
        let opcode = if is_sub { 0xAA } else { 0xA8 };
        vex::fma_op(self, out, w, opcode, dst, a, b, c)
    }

    fn vmin(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x5D, dst, a, b)
    }

    fn vmax(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x5F, dst, a, b)
    }

    fn vsqrt(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, src: &str) -> Result<(), EmitError> {
        vex::packed_double_op(self, out, w, 0x51, dst, src, src)
    }

    fn vround(
        &self,
        out: &mut Vec<u8>,
        w: VectorWidth,
        dst: &str,
        src: &str,
        mode: RoundMode,
    ) -> Result<(), EmitError> {
        let imm = match mode {
            RoundMode::Nearest => 0x00,
            RoundMode::Down => 0x01,
            RoundMode::Up => 0x02,
            RoundMode::TowardZero => 0x03,
        };
        vex::round_op(self, out, w, 0x09, dst, src, imm)
    }

    fn vcmp(&self, out: &mut Vec<u8>, w: VectorWidth, mask_dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::vcmp_to_mask(self, out, w, mask_dst, a, b)
    }

    fn vgather(
        &self,
        out: &mut Vec<u8>,
        w: VectorWidth,
        dst: &str,
        base: &str,
        indices: &str,
    ) -> Result<(), EmitError> {
        vex::gather(self, out, w, dst, base, indices)
    }

    fn vscatter(
        &self,
        out: &mut Vec<u8>,
        w: VectorWidth,
        base: &str,
        indices: &str,
        src: &str,
    ) -> Result<(), EmitError> {
        vex::scatter(self, out, w, base, indices, src)
    }

    fn vload(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, mem: MemOperand) -> Result<(), EmitError> {
        vex::packed_mem_op(self, out, w, true, dst, mem)
    }

    fn vstore(&self, out: &mut Vec<u8>, w: VectorWidth, mem: MemOperand, src: &str) -> Result<(), EmitError> {
        vex::packed_mem_op(self, out, w, false, src, mem)
    }

    fn mask_and(&self, out: &mut Vec<u8>, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::mask_op(self, out, 0x41, dst, a, b)
    }

    fn mask_or(&self, out: &mut Vec<u8>, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::mask_op(self, out, 0x45, dst, a, b)
    }

    fn mask_xor(&self, out: &mut Vec<u8>, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        vex::mask_op(self, out, 0x47, dst, a, b)
    }

    fn mask_not(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        vex::mask_op(self, out, 0x44, dst, src, src)
    }
}

fn dst_reg_width(reg: Register) -> Width {
    match reg.size_bits {
        64 => Width::W64,
        32 => Width::W32,
        16 => Width::W16,
        _ => Width::W8,
    }
}

fn shift(
    emitter: &X86_64Emitter,
    out: &mut Vec<u8>,
    w: Width,
    dst: &str,
    amount: ShiftAmount,
    reg_field: u8,
) -> Result<(), EmitError> {
    let dst = emitter.gpr(dst)?;
    check_width(dst, w)?;
    match amount {
        ShiftAmount::Immediate(n) => {
            let opcode = if w == Width::W8 { 0xC0 } else { 0xC1 };
            emit_ext(out, w, &[opcode], reg_field, dst);
            out.push(n);
        }
        ShiftAmount::Register(r) => {
            if r != "cl" && r != "ecx" && r != "rcx" {
                return Err(EmitError::UnknownRegister(format!(
                    "{r} (x86-64 variable shifts must use cl)"
                )));
            }
            let opcode = if w == Width::W8 { 0xD2 } else { 0xD3 };
            emit_ext(out, w, &[opcode], reg_field, dst);
        }
    }
    Ok(())
}

fn scalar_sse(emitter: &X86_64Emitter, out: &mut Vec<u8>, opcode: u8, dst: &str, src: &str) -> Result<(), EmitError> {
    let dst = emitter.vreg(dst)?;
    let src = emitter.vreg(src)?;
    out.push(0xF2);
    if let Some(b) = rex(false, dst.encoding, src.encoding, false) {
        out.push(b);
    }
    out.extend_from_slice(&[0x0F, opcode]);
    out.push(modrm(0b11, dst.encoding, src.encoding));
    Ok(())
}

pub(crate) fn resolve_vector(target: &Target, name: &str) -> Result<Register, EmitError> {
    resolve(target, name, RegisterClass::Vector)
}

pub(crate) fn resolve_mask(target: &Target, name: &str) -> Result<Register, EmitError> {
    resolve(target, name, RegisterClass::Mask)
}

pub(crate) fn resolve_gpr(target: &Target, name: &str) -> Result<Register, EmitError> {
    resolve(target, name, RegisterClass::Integer)
}

pub(crate) use modrm as modrm_byte;
pub(crate) use rex as rex_byte;
pub(crate) use emit_mem as emit_mem_bytes;

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_target::{Arch, Os};

    fn emitter() -> X86_64Emitter {
        X86_64Emitter::new(Target::new(Arch::X86_64, Os::Linux))
    }

    #[test]
    fn mov_reg_reg_emits_rex_w_and_89_opcode() {
        let e = emitter();
        let mut out = Vec::new();
        e.mov_reg_reg(&mut out, Width::W64, "rax", "rdi").unwrap();
        assert_eq!(out, vec![0x48, 0x89, 0xF8]);
    }

    #[test]
    fn add_extended_registers_sets_rex_r_and_b() {
        let e = emitter();
        let mut out = Vec::new();
        e.add(&mut out, Width::W64, "r8", "r9").unwrap();
        assert_eq!(out[0], 0x4D); // REX.W | REX.R | REX.B
    }

    #[test]
    fn unknown_register_is_rejected() {
        let e = emitter();
        let mut out = Vec::new();
        let err = e.mov_reg_reg(&mut out, Width::W64, "rax", "nope").unwrap_err();
        assert!(matches!(err, EmitError::UnknownRegister(_)));
    }

    #[test]
    fn jmp_placeholder_reserves_rel32_and_reports_its_offset() {
        let e = emitter();
        let mut out = Vec::new();
        let site = e.jmp_placeholder(&mut out).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(site, 1);
    }

    #[test]
    fn call_indirect_reg_uses_ff_slash_2() {
        let e = emitter();
        let mut out = Vec::new();
        e.call_indirect_reg(&mut out, "rax").unwrap();
        assert_eq!(out, vec![0xFF, 0xD0]);
    }

    #[test]
    fn mask_class_mismatch_is_rejected_for_gpr_op() {
        let e = emitter();
        let mut out = Vec::new();
        let err = e.mov_reg_reg(&mut out, Width::W64, "k1", "rax").unwrap_err();
        assert!(matches!(err, EmitError::WrongRegisterClass { .. }));
    }
}
