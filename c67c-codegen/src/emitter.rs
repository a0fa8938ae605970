//! Target-abstract instruction emitter.
//!
//! One `trait ArchEmitter` method per abstract operation, a default implementation that reports
//! `EmitError::UnsupportedOperation` for every method an architecture doesn't override, and one
//! struct per architecture implementing the subset it supports — the same "tagged variant + one
//! method per abstract op, runtime-dispatched" shape `cranelift-codegen`'s `isa::TargetIsa` trait
//! object gives rather than monomorphizing the whole emitter per target at compile time (see
//! DESIGN.md, "Polymorphism over operations").

use c67c_target::Target;

use crate::error::EmitError;
use crate::operand::{Condition, MemOperand, RoundMode, ShiftAmount, VectorWidth, Width};

/// Byte offset, within the buffer an emitter method just wrote to, of a relocatable displacement
/// field. The builder turns this into a relocation record; the emitter itself never resolves
/// labels or symbols.
pub type DisplacementSite = usize;

/// One method per abstract operation. Every implementation validates its operands against the
/// register catalog for `target()`'s architecture before writing bytes; on error it writes either
/// nothing or a fully-formed instruction, never a partial one.
pub trait ArchEmitter {
    /// The target this emitter encodes for.
    fn target(&self) -> &Target;

    fn unsupported(&self, op: &'static str) -> EmitError {
        EmitError::UnsupportedOperation {
            op,
            arch: self.target().arch(),
        }
    }

    // ---- Data movement ----------------------------------------------------------------------

    /// Register-to-register move.
    fn mov_reg_reg(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mov_reg_reg"))
    }

    /// Load an immediate into a register.
    fn mov_imm_reg(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _imm: i64) -> Result<(), EmitError> {
        Err(self.unsupported("mov_imm_reg"))
    }

    /// Load from memory into a register, zero- or sign-extending if `w` is narrower than the
    /// register's natural width.
    fn load(
        &self,
        _out: &mut Vec<u8>,
        _w: Width,
        _dst: &str,
        _mem: MemOperand,
        _sign_extend: bool,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("load"))
    }

    /// Store a register to memory.
    fn store(&self, _out: &mut Vec<u8>, _w: Width, _mem: MemOperand, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("store"))
    }

    /// Push a register onto the stack.
    fn push(&self, _out: &mut Vec<u8>, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("push"))
    }

    /// Pop the stack into a register.
    fn pop(&self, _out: &mut Vec<u8>, _dst: &str) -> Result<(), EmitError> {
        Err(self.unsupported("pop"))
    }

    /// Compute a memory operand's effective address into a register.
    fn lea(&self, _out: &mut Vec<u8>, _dst: &str, _mem: MemOperand) -> Result<(), EmitError> {
        Err(self.unsupported("lea"))
    }

    // ---- Integer arithmetic ------------------------------------------------------------------

    /// `dst += src` (2-operand form).
    fn add(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("add"))
    }

    /// `dst -= src` (2-operand form).
    fn sub(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("sub"))
    }

    /// `dst = -dst`.
    fn neg(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str) -> Result<(), EmitError> {
        Err(self.unsupported("neg"))
    }

    /// `dst *= src` (2-operand form, the only form x86-64 supports for general integer multiply).
    fn mul(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mul"))
    }

    /// `dst = a * b` (3-operand form, available on ARM64 `MUL` and RISC-V `MUL`; unsupported on
    /// x86-64, where callers fall back to `mul`).
    fn mul3(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mul3"))
    }

    /// Signed division: on x86-64 this is the `rdx:rax / divisor` quotient/remainder pair (`rax`
    /// receives the quotient, `rdx` the remainder); on ARM64/RISC-V it is a 3-operand
    /// `dst = dividend / divisor` plus a separate remainder instruction, so `dst`/`dividend` are
    /// both consulted there and ignored on x86-64.
    fn div(
        &self,
        _out: &mut Vec<u8>,
        _w: Width,
        _dst: &str,
        _dividend: &str,
        _divisor: &str,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("div"))
    }

    /// Compare two operands, setting the flags/condition state that a subsequent `Condition`
    /// branch consults.
    fn cmp(&self, _out: &mut Vec<u8>, _w: Width, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("cmp"))
    }

    // ---- Bitwise ------------------------------------------------------------------------------

    /// `dst &= src`.
    fn and(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("and"))
    }

    /// `dst |= src`.
    fn or(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("or"))
    }

    /// `dst ^= src`.
    fn xor(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("xor"))
    }

    /// `dst = !dst`.
    fn not(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str) -> Result<(), EmitError> {
        Err(self.unsupported("not"))
    }

    /// `dst <<= amount`.
    fn shl(&self, _out: &mut Vec<u8>, _w: Width, _dst: &str, _amount: ShiftAmount) -> Result<(), EmitError> {
        Err(self.unsupported("shl"))
    }

    /// `dst >>= amount`; `arithmetic` selects sign- vs zero-extending shift.
    fn shr(
        &self,
        _out: &mut Vec<u8>,
        _w: Width,
        _dst: &str,
        _amount: ShiftAmount,
        _arithmetic: bool,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("shr"))
    }

    /// Test whether bit `bit` of `src` is set, reflected in the condition state.
    fn bit_test(&self, _out: &mut Vec<u8>, _w: Width, _src: &str, _bit: u8) -> Result<(), EmitError> {
        Err(self.unsupported("bit_test"))
    }

    // ---- Control flow ---------------------------------------------------------------------

    /// Write an unconditional jump with a placeholder displacement, returning the offset of the
    /// displacement field for the builder to patch.
    fn jmp_placeholder(&self, _out: &mut Vec<u8>) -> Result<DisplacementSite, EmitError> {
        Err(self.unsupported("jmp"))
    }

    /// Write a conditional jump with a placeholder displacement.
    fn jcc_placeholder(&self, _out: &mut Vec<u8>, _cond: Condition) -> Result<DisplacementSite, EmitError> {
        Err(self.unsupported("jcc"))
    }

    /// Write a direct-call placeholder, the raw encoding step behind `Builder::generate_call`.
    fn call_placeholder(&self, _out: &mut Vec<u8>) -> Result<DisplacementSite, EmitError> {
        Err(self.unsupported("call"))
    }

    /// Write an indirect call through a register or `[base+disp]` memory operand.
    fn call_indirect_reg(&self, _out: &mut Vec<u8>, _target_reg: &str) -> Result<(), EmitError> {
        Err(self.unsupported("call_indirect_reg"))
    }

    /// Write an indirect call through memory, e.g. a PE import-address-table slot.
    fn call_indirect_mem(&self, _out: &mut Vec<u8>, _mem: MemOperand) -> Result<(), EmitError> {
        Err(self.unsupported("call_indirect_mem"))
    }

    /// Write a PC-relative load-address placeholder (x86-64 `lea`+RIP-relative; ARM64
    /// `adrp`+`add`; RISC-V `auipc`+`addi`). Returns every displacement field the builder must
    /// patch — one site on x86-64, two on ARM64 and RISC-V.
    fn load_address_placeholder(
        &self,
        _out: &mut Vec<u8>,
        _dst: &str,
    ) -> Result<Vec<DisplacementSite>, EmitError> {
        Err(self.unsupported("load_address"))
    }

    /// Function return.
    fn ret(&self, _out: &mut Vec<u8>) -> Result<(), EmitError> {
        Err(self.unsupported("ret"))
    }

    /// Kernel syscall/trap instruction; the syscall number itself is loaded into the ABI's
    /// syscall-number register by the caller via `mov_imm_reg` first.
    fn syscall(&self, _out: &mut Vec<u8>) -> Result<(), EmitError> {
        Err(self.unsupported("syscall"))
    }

    // ---- Floating-point scalar -----------------------------------------------------------

    /// Load a double from memory into a floating-point/vector register.
    fn fload(&self, _out: &mut Vec<u8>, _dst: &str, _mem: MemOperand) -> Result<(), EmitError> {
        Err(self.unsupported("fload"))
    }

    /// Store a double from a floating-point/vector register to memory.
    fn fstore(&self, _out: &mut Vec<u8>, _mem: MemOperand, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("fstore"))
    }

    /// Scalar double `dst += src`.
    fn fadd(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("fadd"))
    }

    /// Scalar double `dst -= src`.
    fn fsub(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("fsub"))
    }

    /// Scalar double `dst *= src`.
    fn fmul(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("fmul"))
    }

    /// Scalar double `dst /= src`.
    fn fdiv(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("fdiv"))
    }

    /// Scalar double compare.
    fn fcmp(&self, _out: &mut Vec<u8>, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("fcmp"))
    }

    /// Convert a signed integer register to a double.
    fn cvt_int_to_double(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("cvt_int_to_double"))
    }

    /// Convert (truncating) a double to a signed integer register.
    fn cvt_double_to_int(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("cvt_double_to_int"))
    }

    // ---- SIMD packed-double -----------------------------------------------------------------
    //
    // Width is selected by the register name supplied (xmm/ymm/zmm, v-for-NEON vs. z-for-SVE,
    // RVV v with the active `vl`), never by a side channel, so generated code degrades gracefully
    // across CPU capability without recompiling the emitter.

    /// Packed-double add.
    fn vadd(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vadd"))
    }

    /// Packed-double subtract.
    fn vsub(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vsub"))
    }

    /// Packed-double multiply.
    fn vmul(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vmul"))
    }

    /// Packed-double divide.
    fn vdiv(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vdiv"))
    }

    /// Packed-double load from a `[base+disp]` memory operand.
    fn vload(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _mem: MemOperand) -> Result<(), EmitError> {
        Err(self.unsupported("vload"))
    }

    /// Packed-double store to a `[base+disp]` memory operand.
    fn vstore(&self, _out: &mut Vec<u8>, _w: VectorWidth, _mem: MemOperand, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vstore"))
    }

    /// Packed-double fused multiply-add/sub: `dst = a*b + c` (`is_sub = false`) or `a*b - c`
    /// (`is_sub = true`), `dst` aliasing one of the operand registers per the ISA's 3-operand FMA
    /// convention.
    fn vfma(
        &self,
        _out: &mut Vec<u8>,
        _w: VectorWidth,
        _dst: &str,
        _a: &str,
        _b: &str,
        _c: &str,
        _is_sub: bool,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("vfma"))
    }

    /// Packed-double minimum.
    fn vmin(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vmin"))
    }

    /// Packed-double maximum.
    fn vmax(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vmax"))
    }

    /// Packed-double square root.
    fn vsqrt(&self, _out: &mut Vec<u8>, _w: VectorWidth, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("vsqrt"))
    }

    /// Packed-double round to integer under `mode`, result left as a double.
    fn vround(
        &self,
        _out: &mut Vec<u8>,
        _w: VectorWidth,
        _dst: &str,
        _src: &str,
        _mode: RoundMode,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("vround"))
    }

    /// Packed-double compare, yielding a mask register result.
    fn vcmp(
        &self,
        _out: &mut Vec<u8>,
        _w: VectorWidth,
        _mask_dst: &str,
        _a: &str,
        _b: &str,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("vcmp"))
    }

    /// Gather packed doubles using 64-bit indices.
    fn vgather(
        &self,
        _out: &mut Vec<u8>,
        _w: VectorWidth,
        _dst: &str,
        _base: &str,
        _indices: &str,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("vgather"))
    }

    /// Scatter packed doubles using 64-bit indices.
    fn vscatter(
        &self,
        _out: &mut Vec<u8>,
        _w: VectorWidth,
        _base: &str,
        _indices: &str,
        _src: &str,
    ) -> Result<(), EmitError> {
        Err(self.unsupported("vscatter"))
    }

    // ---- Mask register ops -------------------------------------------------------------------

    /// Mask register `dst &= src` (x86-64 `kandq`, ARM64 predicate `AND`, RISC-V mask-vreg `vand`).
    fn mask_and(&self, _out: &mut Vec<u8>, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mask_and"))
    }

    /// Mask register `dst |= src`.
    fn mask_or(&self, _out: &mut Vec<u8>, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mask_or"))
    }

    /// Mask register `dst ^= src`.
    fn mask_xor(&self, _out: &mut Vec<u8>, _dst: &str, _a: &str, _b: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mask_xor"))
    }

    /// Mask register `dst = !src`.
    fn mask_not(&self, _out: &mut Vec<u8>, _dst: &str, _src: &str) -> Result<(), EmitError> {
        Err(self.unsupported("mask_not"))
    }
}
