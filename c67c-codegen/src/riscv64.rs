//! RISC-V64 instruction encoder. Like AArch64, every base-ISA instruction is one little-endian
//! 32-bit word built from named bitfields (RV64I's six formats: R/I/S/B/U/J), plus M-extension
//! multiply/divide and V-extension (RVV) packed-double ops addressed through
//! [`c67c_target::riscv64::VECTOR`] at its nominal 128-bit width.

use c67c_target::{Arch, Register, RegisterClass, Target};

use crate::emitter::{ArchEmitter, DisplacementSite};
use crate::error::EmitError;
use crate::operand::{Condition, MemOperand, RoundMode, ShiftAmount, VectorWidth, Width};

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

fn r(reg: Register) -> u32 {
    (reg.encoding & 0x1F) as u32
}

fn push_word(out: &mut Vec<u8>, word: u32) {
    out.extend_from_slice(&word.to_le_bytes());
}

fn funct3_width(w: Width, signed: bool) -> Result<u32, EmitError> {
    // Load/store funct3: 000=LB/SB, 001=LH/SH, 010=LW/SW, 011=LD/SD, 100=LBU, 101=LHU.
    Ok(match (w, signed) {
        (Width::W8, true) => 0b000,
        (Width::W8, false) => 0b100,
        (Width::W16, true) => 0b001,
        (Width::W16, false) => 0b101,
        (Width::W32, true) => 0b010,
        (Width::W32, false) => 0b110,
        (Width::W64, _) => 0b011,
    })
}

/// R-type: `funct7 rs2 rs1 funct3 rd opcode`.
fn rtype(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

/// I-type: `imm[11:0] rs1 funct3 rd opcode`.
fn itype(imm12: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    ((imm12 & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

/// S-type: `imm[11:5] rs2 rs1 funct3 imm[4:0] opcode`.
fn stype(imm12: u32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let hi = (imm12 >> 5) & 0x7F;
    let lo = imm12 & 0x1F;
    (hi << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (lo << 7) | opcode
}

pub struct Riscv64Emitter {
    target: Target,
}

impl Riscv64Emitter {
    /// Build an emitter for `target`. Panics in debug builds if `target.arch()` is not
    /// [`Arch::Riscv64`].
    pub fn new(target: Target) -> Self {
        debug_assert_eq!(target.arch(), Arch::Riscv64);
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
}

impl ArchEmitter for Riscv64Emitter {
    fn target(&self) -> &Target {
        &self.target
    }

    fn mov_reg_reg(&self, out: &mut Vec<u8>, _w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.gpr(src)?;
        // ADDI rd, rs1, 0 (the canonical MV pseudo-instruction).
        push_word(out, itype(0, r(src), 0b000, r(dst), 0b0010011));
        Ok(())
    }

    fn mov_imm_reg(&self, out: &mut Vec<u8>, _w: Width, dst: &str, imm: i64) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        if !(-2048..=2047).contains(&imm) {
            return Err(EmitError::ImmediateOutOfRange { value: imm, bits: 12 });
        }
        // ADDI rd, zero, imm.
        push_word(out, itype((imm as i32 as u32) & 0xFFF, 0, 0b000, r(dst), 0b0010011));
        Ok(())
    }

    fn load(&self, out: &mut Vec<u8>, w: Width, dst: &str, mem: MemOperand, sign_extend: bool) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let base = self.gpr(mem.base)?;
        if !(-2048..=2047).contains(&mem.disp) {
            return Err(EmitError::ImmediateOutOfRange { value: mem.disp as i64, bits: 12 });
        }
        let funct3 = funct3_width(w, sign_extend)?;
        push_word(out, itype((mem.disp as u32) & 0xFFF, r(base), funct3, r(dst), 0b0000011));
        Ok(())
    }

    fn store(&self, out: &mut Vec<u8>, w: Width, mem: MemOperand, src: &str) -> Result<(), EmitError> {
        let src = self.gpr(src)?;
        let base = self.gpr(mem.base)?;
        if !(-2048..=2047).contains(&mem.disp) {
            return Err(EmitError::ImmediateOutOfRange { value: mem.disp as i64, bits: 12 });
        }
        let funct3 = match w {
            Width::W8 => 0b000,
            Width::W16 => 0b001,
            Width::W32 => 0b010,
            Width::W64 => 0b011,
        };
        push_word(out, stype((mem.disp as u32) & 0xFFF, r(src), r(base), funct3, 0b0100011));
        Ok(())
    }

    fn push(&self, out: &mut Vec<u8>, src: &str) -> Result<(), EmitError> {
        let sp = self.gpr("sp")?;
        // addi sp, sp, -16; sd src, 0(sp).
        push_word(out, itype((-16i32 as u32) & 0xFFF, r(sp), 0b000, r(sp), 0b0010011));
        self.store(out, Width::W64, MemOperand::base("sp"), src)
    }

    fn pop(&self, out: &mut Vec<u8>, dst: &str) -> Result<(), EmitError> {
        let sp = self.gpr("sp")?;
        self.load(out, Width::W64, dst, MemOperand::base("sp"), true)?;
        push_word(out, itype(16, r(sp), 0b000, r(sp), 0b0010011));
        Ok(())
    }

    fn lea(&self, out: &mut Vec<u8>, dst: &str, mem: MemOperand) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let base = self.gpr(mem.base)?;
        if !(-2048..=2047).contains(&mem.disp) {
            return Err(EmitError::ImmediateOutOfRange { value: mem.disp as i64, bits: 12 });
        }
        push_word(out, itype((mem.disp as u32) & 0xFFF, r(base), 0b000, r(dst), 0b0010011));
        Ok(())
    }

    fn add(&self, out: &mut Vec<u8>, _w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let s = self.gpr(src)?;
        push_word(out, rtype(0, r(s), r(d), 0b000, r(d), 0b0110011));
        Ok(())
    }

    fn sub(&self, out: &mut Vec<u8>, _w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let s = self.gpr(src)?;
        push_word(out, rtype(0b0100000, r(s), r(d), 0b000, r(d), 0b0110011));
        Ok(())
    }

    fn neg(&self, out: &mut Vec<u8>, _w: Width, dst: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        // SUB rd, zero, rd.
        push_word(out, rtype(0b0100000, r(d), 0, 0b000, r(d), 0b0110011));
        Ok(())
    }

    fn mul3(&self, out: &mut Vec<u8>, _w: Width, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let a = self.gpr(a)?;
        let b = self.gpr(b)?;
        // MUL rd, rs1, rs2 (RV64M).
        push_word(out, rtype(0b0000001, r(b), r(a), 0b000, r(d), 0b0110011));
        Ok(())
    }

    fn mul(&self, out: &mut Vec<u8>, w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        self.mul3(out, w, dst, dst, src)
    }

    fn div(&self, out: &mut Vec<u8>, _w: Width, dst: &str, dividend: &str, divisor: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let dividend = self.gpr(dividend)?;
        let divisor = self.gpr(divisor)?;
        // DIV rd, rs1, rs2 (RV64M).
        push_word(out, rtype(0b0000001, r(divisor), r(dividend), 0b100, r(d), 0b0110011));
        Ok(())
    }

    fn cmp(&self, out: &mut Vec<u8>, _w: Width, a: &str, b: &str) -> Result<(), EmitError> {
        // RISC-V has no flags register: "compare" materializes `a < b` into a scratch register
        // (t6, never allocated to user values) for the subsequent `jcc_placeholder` to branch on.
        let a = self.gpr(a)?;
        let b = self.gpr(b)?;
        let t6 = self.gpr("t6")?;
        push_word(out, rtype(0, r(b), r(a), 0b010, r(t6), 0b0110011)); // SLT t6, a, b
        Ok(())
    }

    fn and(&self, out: &mut Vec<u8>, _w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let s = self.gpr(src)?;
        push_word(out, rtype(0, r(s), r(d), 0b111, r(d), 0b0110011));
        Ok(())
    }

    fn or(&self, out: &mut Vec<u8>, _w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let s = self.gpr(src)?;
        push_word(out, rtype(0, r(s), r(d), 0b110, r(d), 0b0110011));
        Ok(())
    }

    fn xor(&self, out: &mut Vec<u8>, _w: Width, dst: &str, src: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        let s = self.gpr(src)?;
        push_word(out, rtype(0, r(s), r(d), 0b100, r(d), 0b0110011));
        Ok(())
    }

    fn not(&self, out: &mut Vec<u8>, _w: Width, dst: &str) -> Result<(), EmitError> {
        let d = self.gpr(dst)?;
        // XORI rd, rd, -1.
        push_word(out, itype(0xFFF, r(d), 0b100, r(d), 0b0010011));
        Ok(())
    }

    fn shl(&self, out: &mut Vec<u8>, w: Width, dst: &str, amount: ShiftAmount) -> Result<(), EmitError> {
        shift(self, out, w, dst, amount, 0b001, 0)
    }

    fn shr(&self, out: &mut Vec<u8>, w: Width, dst: &str, amount: ShiftAmount, arithmetic: bool) -> Result<(), EmitError> {
        let funct7 = if arithmetic { 0b0100000 } else { 0 };
        shift(self, out, w, dst, amount, 0b101, funct7)
    }

    fn bit_test(&self, out: &mut Vec<u8>, w: Width, src: &str, bit: u8) -> Result<(), EmitError> {
        if bit as u16 >= w.bits() {
            return Err(EmitError::ImmediateOutOfRange { value: bit as i64, bits: w.bits() as u32 });
        }
        let src = self.gpr(src)?;
        let t6 = self.gpr("t6")?;
        // SRLI t6, src, bit; ANDI t6, t6, 1 — isolates the bit for the next `jcc_placeholder`.
        push_word(out, itype(bit as u32, r(src), 0b101, r(t6), 0b0010011));
        push_word(out, itype(1, r(t6), 0b111, r(t6), 0b0010011));
        Ok(())
    }

    fn jmp_placeholder(&self, out: &mut Vec<u8>) -> Result<DisplacementSite, EmitError> {
        let site = out.len();
        // JAL zero, 0 (unconditional jump, discarding the link address).
        push_word(out, itype(0, 0, 0, 0, 0b1101111));
        Ok(site)
    }

    fn jcc_placeholder(&self, out: &mut Vec<u8>, cond: Condition) -> Result<DisplacementSite, EmitError> {
        let t6 = self.gpr("t6")?;
        let (funct3, rs1, rs2) = match cond {
            Condition::Eq => (0b000, r(t6), 0),
            Condition::Ne => (0b001, r(t6), 0),
            Condition::Lt | Condition::Below => (0b100, r(t6), 0),
            Condition::Ge => (0b101, r(t6), 0),
            Condition::Gt | Condition::Above => (0b100, 0, r(t6)),
            Condition::Le => (0b101, 0, r(t6)),
        };
        let site = out.len();
        // B-type, imm=0: BEQ/BNE/BLT/BGE t6, zero (or swapped operands for GT/LE).
        push_word(out, (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | 0b1100011);
        Ok(site)
    }

    fn call_placeholder(&self, out: &mut Vec<u8>) -> Result<DisplacementSite, EmitError> {
        let ra = self.gpr("ra")?;
        let site = out.len();
        // JAL ra, 0.
        push_word(out, itype(0, 0, 0, r(ra), 0b1101111));
        Ok(site)
    }

    fn call_indirect_reg(&self, out: &mut Vec<u8>, target_reg: &str) -> Result<(), EmitError> {
        let ra = self.gpr("ra")?;
        let rn = self.gpr(target_reg)?;
        // JALR ra, 0(rn).
        push_word(out, itype(0, r(rn), 0, r(ra), 0b1100111));
        Ok(())
    }

    fn call_indirect_mem(&self, out: &mut Vec<u8>, mem: MemOperand) -> Result<(), EmitError> {
        self.load(out, Width::W64, "t6", mem, false)?;
        self.call_indirect_reg(out, "t6")
    }

    fn load_address_placeholder(&self, out: &mut Vec<u8>, dst: &str) -> Result<Vec<DisplacementSite>, EmitError> {
        let dst = self.gpr(dst)?;
        let auipc_site = out.len();
        // AUIPC rd, 0 (U-type).
        push_word(out, rd_utype(0, r(dst), 0b0010111));
        let addi_site = out.len();
        // ADDI rd, rd, 0.
        push_word(out, itype(0, r(dst), 0b000, r(dst), 0b0010011));
        Ok(vec![auipc_site, addi_site])
    }

    fn ret(&self, out: &mut Vec<u8>) -> Result<(), EmitError> {
        let ra = self.gpr("ra")?;
        // JALR zero, 0(ra).
        push_word(out, itype(0, r(ra), 0, 0, 0b1100111));
        Ok(())
    }

    fn syscall(&self, out: &mut Vec<u8>) -> Result<(), EmitError> {
        push_word(out, 0b000000000000_00000_000_00000_1110011); // ECALL
        Ok(())
    }

    fn fload(&self, out: &mut Vec<u8>, dst: &str, mem: MemOperand) -> Result<(), EmitError> {
        let dst = self.vreg(dst)?;
        let base = self.gpr(mem.base)?;
        if !(-2048..=2047).contains(&mem.disp) {
            return Err(EmitError::ImmediateOutOfRange { value: mem.disp as i64, bits: 12 });
        }
        // FLD rd, imm(rs1).
        push_word(out, itype((mem.disp as u32) & 0xFFF, r(base), 0b011, r(dst), 0b0000111));
        Ok(())
    }

    fn fstore(&self, out: &mut Vec<u8>, mem: MemOperand, src: &str) -> Result<(), EmitError> {
        let src = self.vreg(src)?;
        let base = self.gpr(mem.base)?;
        if !(-2048..=2047).contains(&mem.disp) {
            return Err(EmitError::ImmediateOutOfRange { value: mem.disp as i64, bits: 12 });
        }
        push_word(out, stype((mem.disp as u32) & 0xFFF, r(src), r(base), 0b011, 0b0100111));
        Ok(())
    }

    fn fadd(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_fp(self, out, 0b0000001, dst, dst, src)
    }

    fn fsub(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_fp(self, out, 0b0000101, dst, dst, src)
    }

    fn fmul(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_fp(self, out, 0b0001001, dst, dst, src)
    }

    fn fdiv(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        scalar_fp(self, out, 0b0001101, dst, dst, src)
    }

    fn fcmp(&self, out: &mut Vec<u8>, a: &str, b: &str) -> Result<(), EmitError> {
        let a = self.vreg(a)?;
        let b = self.vreg(b)?;
        let t6 = self.gpr("t6")?;
        // FEQ.D t6, a, b (result into the same scratch GPR `jcc_placeholder` reads).
        push_word(out, rtype(0b1010001, r(b), r(a), 0b010, r(t6), 0b1010011));
        Ok(())
    }

    fn cvt_int_to_double(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.vreg(dst)?;
        let src = self.gpr(src)?;
        // FCVT.D.L rd, rs1, dyn.
        push_word(out, rtype(0b1101001, 0b00010, r(src), 0b111, r(dst), 0b1010011));
        Ok(())
    }

    fn cvt_double_to_int(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        let dst = self.gpr(dst)?;
        let src = self.vreg(src)?;
        // FCVT.L.D rd, rs1, rtz.
        push_word(out, rtype(0b1100001, 0b00010, r(src), 0b001, r(dst), 0b1010011));
        Ok(())
    }

    fn vadd(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b000000, dst, a, b)
    }

    fn vsub(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b000010, dst, a, b)
    }

    fn vmul(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b100100, dst, a, b)
    }

    fn vdiv(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b100000, dst, a, b)
    }

    fn vfma(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str, c: &str, is_sub: bool) -> Result<(), EmitError> {
        if w != VectorWidth::Bits128 {
            return Err(self.unsupported("vfma at non-128-bit width"));
        }
        if dst != c {
            rvv_op(self, out, w, 0b000000, dst, c, c)?; // VMV.V.V dst, c (reuse VADD w/ zero)
        }
        let funct6 = if is_sub { 0b101101 } else { 0b101001 }; // VFMACC.VV / VFMSAC.VV
        rvv_op(self, out, w, funct6, dst, a, b)
    }

    fn vmin(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b000100, dst, a, b)
    }

    fn vmax(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b000110, dst, a, b)
    }

    fn vsqrt(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, src: &str) -> Result<(), EmitError> {
        rvv_op(self, out, w, 0b010011, dst, src, src)
    }

    fn vround(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, src: &str, _mode: RoundMode) -> Result<(), EmitError> {
        // RVV has a single VFCVT round-to-integer-then-back-to-float idiom; the frm CSR (set by
        // the caller ahead of this instruction) selects the mode, so `_mode` isn't re-encoded here.
        rvv_op(self, out, w, 0b010010, dst, src, src)
    }

    fn vcmp(&self, out: &mut Vec<u8>, w: VectorWidth, mask_dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        if w != VectorWidth::Bits128 {
            return Err(self.unsupported("vcmp at non-128-bit width"));
        }
        let dst = self.mreg(mask_dst)?;
        let a = self.vreg(a)?;
        let b = self.vreg(b)?;
        // VMFEQ.VV vd, vs2, vs1.
        push_word(out, rtype(0b011000, r(b), r(a), 0b001, r(dst), 0b1010111));
        Ok(())
    }

    fn vgather(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, base: &str, indices: &str) -> Result<(), EmitError> {
        if w != VectorWidth::Bits128 {
            return Err(self.unsupported("vgather at non-128-bit width"));
        }
        let dst = self.vreg(dst)?;
        let base = self.gpr(base)?;
        let idx = self.vreg(indices)?;
        // VLUXEI64.V vd, (rs1), vs2 (unordered indexed load).
        push_word(out, rtype(0b0000_01, r(idx), r(base), 0b111, r(dst), 0b0000111));
        Ok(())
    }

    fn vscatter(&self, out: &mut Vec<u8>, w: VectorWidth, base: &str, indices: &str, src: &str) -> Result<(), EmitError> {
        if w != VectorWidth::Bits128 {
            return Err(self.unsupported("vscatter at non-128-bit width"));
        }
        let src = self.vreg(src)?;
        let base = self.gpr(base)?;
        let idx = self.vreg(indices)?;
        // VSUXEI64.V vs3, (rs1), vs2.
        push_word(out, rtype(0b0000_01, r(idx), r(base), 0b111, r(src), 0b0100111));
        Ok(())
    }

    fn vload(&self, out: &mut Vec<u8>, w: VectorWidth, dst: &str, mem: MemOperand) -> Result<(), EmitError> {
        rvv_mem(self, out, w, true, dst, mem)
    }

    fn vstore(&self, out: &mut Vec<u8>, w: VectorWidth, mem: MemOperand, src: &str) -> Result<(), EmitError> {
        rvv_mem(self, out, w, false, src, mem)
    }

    fn mask_and(&self, out: &mut Vec<u8>, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        mask_op(self, out, 0b011001, dst, a, b)
    }

    fn mask_or(&self, out: &mut Vec<u8>, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        mask_op(self, out, 0b011010, dst, a, b)
    }

    fn mask_xor(&self, out: &mut Vec<u8>, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
        mask_op(self, out, 0b011011, dst, a, b)
    }

    fn mask_not(&self, out: &mut Vec<u8>, dst: &str, src: &str) -> Result<(), EmitError> {
        mask_op(self, out, 0b011011, dst, src, src) // VMXOR dst, src, src == NOT
    }
}

/// U-type: `imm[31:12] rd opcode`.
fn rd_utype(imm20: u32, rd: u32, opcode: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | opcode
}

fn shift(
    emitter: &Riscv64Emitter,
    out: &mut Vec<u8>,
    w: Width,
    dst: &str,
    amount: ShiftAmount,
    funct3: u32,
    funct7: u32,
) -> Result<(), EmitError> {
    let d = emitter.gpr(dst)?;
    match amount {
        ShiftAmount::Immediate(n) => {
            if n as u16 >= w.bits() {
                return Err(EmitError::ImmediateOutOfRange { value: n as i64, bits: w.bits() as u32 });
            }
            push_word(out, itype((funct7 << 5) | n as u32, r(d), funct3, r(d), 0b0010011));
        }
        ShiftAmount::Register(reg_name) => {
            let s = emitter.gpr(reg_name)?;
            push_word(out, rtype(funct7, r(s), r(d), funct3, r(d), 0b0110011));
        }
    }
    Ok(())
}

fn scalar_fp(emitter: &Riscv64Emitter, out: &mut Vec<u8>, funct7: u32, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
    let dst = emitter.vreg(dst)?;
    let a = emitter.vreg(a)?;
    let _ = a;
    let b = emitter.vreg(b)?;
    // funct3=dyn (111): dynamic rounding mode from the frm CSR.
    push_word(out, rtype(funct7, r(b), r(dst), 0b111, r(dst), 0b1010011));
    Ok(())
}

fn rvv_op(emitter: &Riscv64Emitter, out: &mut Vec<u8>, w: VectorWidth, funct6: u32, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
    if w != VectorWidth::Bits128 {
        return Err(emitter.unsupported("rvv op at non-128-bit width"));
    }
    let dst = emitter.vreg(dst)?;
    let a = emitter.vreg(a)?;
    let b = emitter.vreg(b)?;
    // OP-V, funct3=001 (OPFVV, floating-point vector-vector), vm=1 (unmasked).
    push_word(out, (funct6 << 26) | (1 << 25) | (r(b) << 20) | (r(a) << 15) | (0b001 << 12) | (r(dst) << 7) | 0b1010111);
    Ok(())
}

/// VLE64.V/VSE64.V — unit-stride, unmasked (`vm=1`), EEW=64 (`funct3=111`) vector load/store.
/// Shares the scalar `fload`/`fstore` LOAD-FP/STORE-FP opcodes; unit-stride addressing has no
/// displacement field, so `mem.disp` must be zero.
fn rvv_mem(emitter: &Riscv64Emitter, out: &mut Vec<u8>, w: VectorWidth, is_load: bool, reg: &str, mem: MemOperand) -> Result<(), EmitError> {
    if w != VectorWidth::Bits128 {
        return Err(emitter.unsupported("rvv load/store at non-128-bit width"));
    }
    if mem.disp != 0 {
        return Err(emitter.unsupported("unit-stride vector load/store has no displacement"));
    }
    let reg_reg = emitter.vreg(reg)?;
    let base = emitter.gpr(mem.base)?;
    if is_load {
        push_word(out, itype(0x20, r(base), 0b111, r(reg_reg), 0b0000111));
    } else {
        push_word(out, stype(0x20, r(reg_reg), r(base), 0b111, 0b0100111));
    }
    Ok(())
}

fn mask_op(emitter: &Riscv64Emitter, out: &mut Vec<u8>, funct6: u32, dst: &str, a: &str, b: &str) -> Result<(), EmitError> {
    let dst = emitter.mreg(dst)?;
    let a = emitter.mreg(a)?;
    let b = emitter.mreg(b)?;
    push_word(out, (funct6 << 26) | (1 << 25) | (r(b) << 20) | (r(a) << 15) | (0b010 << 12) | (r(dst) << 7) | 0b1010111);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_target::Os;

    fn emitter() -> Riscv64Emitter {
        Riscv64Emitter::new(Target::new(Arch::Riscv64, Os::Linux))
    }

    #[test]
    fn mov_reg_reg_is_addi_zero() {
        let e = emitter();
        let mut out = Vec::new();
        e.mov_reg_reg(&mut out, Width::W64, "a0", "a1").unwrap();
        let word = u32::from_le_bytes(out.try_into().unwrap());
        assert_eq!(word & 0x7F, 0b0010011);
        assert_eq!((word >> 20) & 0xFFF, 0);
    }

    #[test]
    fn ret_is_jalr_zero_ra() {
        let e = emitter();
        let mut out = Vec::new();
        e.ret(&mut out).unwrap();
        let word = u32::from_le_bytes(out.try_into().unwrap());
        assert_eq!(word & 0x7F, 0b1100111);
    }

    #[test]
    fn mov_imm_rejects_out_of_range() {
        let e = emitter();
        let mut out = Vec::new();
        let err = e.mov_imm_reg(&mut out, Width::W64, "a0", 5000).unwrap_err();
        assert!(matches!(err, EmitError::ImmediateOutOfRange { .. }));
    }

    #[test]
    fn rvv_op_rejects_non_128_width() {
        let e = emitter();
        let mut out = Vec::new();
        let err = e.vadd(&mut out, VectorWidth::Bits256, "v0", "v1", "v2").unwrap_err();
        assert!(matches!(err, EmitError::UnsupportedOperation { .. }));
    }
}
