//! Translates an optimized [`Program`] into a [`Builder`] image plus the set of external runtime
//! symbols the generated code calls.
//!
//! This is a deliberately scoped "straight-line scalar" lowering, not a general-purpose codegen
//! backend: it covers exactly the end-to-end scenarios exercised by `tests/scenarios.rs` (numeric
//! and string `println`, scalar arithmetic including the synthesized `Fma` node, `@ i in a..b`
//! range loops, `while`, labeled `break`/`continue`, `unsafe` blocks' direct
//! register/memory/syscall access, and flat numeric-array literals with indexed read/write and
//! vectorized elementwise loops) plus straightforward generalizations of it. Every division checks
//! its divisor against zero and jumps to a shared exit-with-failure path rather than trapping.
//! Constructs outside that subset — user lambdas that survive inlining, channels,
//! `Parallel`/`Background`/`spawn`, `arena`, maps/structs/pattern-matching, the disabled `<>`
//! operator, and the not-yet-representable `or!` sentinel — are rejected with
//! [`LoweringError::Unsupported`] rather than guessed at; see `DESIGN.md`.

use std::collections::{BTreeSet, HashMap};

use c67c_ast::{AssignTarget, BinOp, Expr, JumpKind, Loop, MemWidth, Program, Stmt, UnOp};
use c67c_codegen::{ArchEmitter, Builder, MemOperand, Width};
use c67c_target::{Arch, Target};

use crate::error::LoweringError;

/// Size of the fixed scratch-register pool both the float and general-purpose evaluators use.
/// Expressions nesting deeper than this spill nowhere (see `DESIGN.md`) and are rejected.
const POOL_SIZE: u8 = 6;

/// Runtime helper that writes a string (pointer in the first GPR arg, byte length in the second)
/// to standard output.
pub const RT_PRINTLN_STR: &str = "c67c_rt_println_str";
/// Runtime helper that writes a single `f64` (in the first float arg register), formatted the way
/// the source language's `println` does for numbers, to standard output.
pub const RT_PRINTLN_F64: &str = "c67c_rt_println_f64";
/// Runtime helper that terminates the process with the status code in the first GPR arg.
pub const RT_EXIT: &str = "c67c_rt_exit";

/// The `i`'th argument/scratch floating-point register for `arch`. Both AArch64 and RISC-V have
/// no register file narrower than their 128-bit vector bank (see `c67c-target::registers`), so a
/// scalar double here is always the low lane of a full vector register, the same way `fadd`'s own
/// default encoding treats it.
fn float_reg(arch: Arch, slot: u8) -> String {
    match arch {
        Arch::X86_64 => format!("xmm{slot}"),
        Arch::Arm64 | Arch::Riscv64 => format!("v{slot}"),
    }
}

/// The `i`'th scratch/argument general-purpose register, spelled as the cross-architecture alias
/// so the same code lowers on every target.
fn gpr_scratch(slot: u8) -> &'static str {
    ["a", "b", "c", "d", "e", "f"][slot as usize]
}

/// The register a raw `syscall`/`svc`/`ecall` instruction reads its syscall number from. Not one
/// of the `a..f` ABI-call aliases on any of the three architectures, so it needs its own table.
fn syscall_number_reg(arch: Arch) -> &'static str {
    match arch {
        Arch::X86_64 => "rax",
        Arch::Arm64 => "x8",
        Arch::Riscv64 => "a7",
    }
}

/// One enclosing loop's jump targets, pushed while lowering its body.
struct LoopFrame {
    label: u32,
    continue_target: String,
    break_target: String,
}

/// A flat numeric-array literal already written to the image: its backing symbol and element
/// count. Arrays have no frame slot of their own (`lower_array_define` never calls `alloc_slot`);
/// every other binding indexes into this table by name instead.
#[derive(Clone)]
struct ArrayInfo {
    symbol: String,
    len: usize,
}

/// Lowering state for one `compile()` call: the builder being filled in, the frame's variable
/// slots, and bookkeeping for fresh labels/externs/enclosing loops.
pub struct Lower<'a> {
    target: &'a Target,
    arch: Arch,
    builder: Builder,
    vars: HashMap<String, i32>,
    frame_size: i32,
    externs: BTreeSet<String>,
    label_counter: u32,
    rodata_counter: u32,
    loop_stack: Vec<LoopFrame>,
    arrays: HashMap<String, ArrayInfo>,
    /// The shared division-by-zero exit label, allocated lazily on the first `fdiv` lowered and
    /// emitted once at the end of `run`.
    div_zero_label: Option<String>,
}

impl<'a> Lower<'a> {
    /// Start lowering `program` for `target`, returning the finished builder and the sorted list
    /// of runtime-helper symbols it calls (the only externals this lowering ever references).
    pub fn run(program: &Program, target: &'a Target) -> Result<(Builder, Vec<String>), LoweringError> {
        let mut vars = HashMap::new();
        collect_frame(&program.statements, &mut vars);
        let frame_size = (((vars.len() as i32) * 8 + 15) / 16) * 16;

        let mut lower = Lower {
            target,
            arch: target.arch(),
            builder: Builder::new(target.clone()),
            vars,
            frame_size,
            externs: BTreeSet::new(),
            label_counter: 0,
            rodata_counter: 0,
            loop_stack: Vec::new(),
            arrays: HashMap::new(),
            div_zero_label: None,
        };

        lower.builder.mark_label("_start")?;
        lower.prologue()?;
        for stmt in &program.statements {
            lower.lower_stmt(stmt)?;
        }
        lower.emit_exit(0)?;

        if let Some(label) = lower.div_zero_label.clone() {
            lower.builder.mark_label(&label)?;
            lower.emit_exit(1)?;
        }

        let externs: Vec<String> = lower.externs.iter().cloned().collect();
        Ok((lower.builder, externs))
    }

    /// Emits `f`'s output into the text section. Exists so callers never need the
    /// `builder.emitter()` / `builder.text()` borrows alive at once (they can't be: the first
    /// borrows `&builder`, the second `&mut builder`).
    fn emit(&mut self, f: impl FnOnce(&dyn c67c_codegen::ArchEmitter, &mut Vec<u8>) -> Result<(), c67c_codegen::EmitError>) -> Result<(), LoweringError> {
        let mut buf = Vec::new();
        f(self.builder.emitter(), &mut buf).map_err(c67c_codegen::BuilderError::Emit)?;
        self.builder.text().write_bytes(&buf);
        Ok(())
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("L{}_{tag}", self.label_counter)
    }

    fn frame_ptr(&self) -> &'static str {
        "p"
    }

    fn var_slot(&self, name: &str) -> Result<i32, LoweringError> {
        self.vars.get(name).copied().ok_or_else(|| LoweringError::UnknownVariable(name.to_string()))
    }

    /// `sub`'s stack-frame prologue: establish `p` as the frame pointer and reserve one 8-byte
    /// slot per distinct variable name the frame-collection pass found.
    fn prologue(&mut self) -> Result<(), LoweringError> {
        self.emit(|e, out| e.mov_reg_reg(out, Width::W64, "p", "s"))?;
        let frame_size = self.frame_size;
        if frame_size > 0 {
            let scratch = gpr_scratch(0);
            self.emit(|e, out| e.mov_imm_reg(out, Width::W64, scratch, frame_size as i64))?;
            self.emit(|e, out| e.sub(out, Width::W64, "s", scratch))?;
        }
        Ok(())
    }

    /// Writes an 8-byte IEEE-754 double to a fresh read-only symbol and returns its name. Every
    /// numeric literal in the language goes through this rather than `mov_imm_reg` +
    /// `cvt_int_to_double`, so fractional literals (not just whole-number ones) round-trip
    /// exactly.
    fn define_double(&mut self, value: f64) -> Result<String, LoweringError> {
        self.rodata_counter += 1;
        let name = format!("__const_f64_{}", self.rodata_counter);
        self.builder.define(&name, &value.to_le_bytes())?;
        Ok(name)
    }

    /// Loads the double literal `value` into `float_reg(depth)`, using `gpr_scratch(depth)` to
    /// hold the literal's address in the interim.
    fn load_double_literal(&mut self, value: f64, depth: u8) -> Result<(), LoweringError> {
        let symbol = self.define_double(value)?;
        let addr_reg = gpr_scratch(depth);
        self.builder.load_address(addr_reg, &symbol)?;
        let dst = float_reg(self.arch, depth);
        self.emit(|e, out| e.fload(out, &dst, MemOperand::base(addr_reg)))
    }

    /// Evaluates `expr` into `float_reg(depth)` and returns that register's name. Every arm that
    /// recurses does so at `depth + 1`, so `depth` is simultaneously "next free pool slot" and the
    /// slot the final value always lands in — callers can rely on `eval(e, 0)` leaving its result
    /// in the architecture's first float argument register, which is exactly what a one-`f64`-arg
    /// runtime call needs.
    fn eval(&mut self, expr: &Expr, depth: u8) -> Result<String, LoweringError> {
        if depth >= POOL_SIZE {
            return Err(LoweringError::ExpressionTooDeep(POOL_SIZE));
        }
        let dst = float_reg(self.arch, depth);
        match expr {
            Expr::Number(n) => {
                self.load_double_literal(*n, depth)?;
                Ok(dst)
            }
            Expr::Ident(ident) => {
                if ident.namespace.is_some() {
                    return Err(LoweringError::Unsupported("namespaced identifier"));
                }
                let offset = self.var_slot(&ident.name)?;
                let base = self.frame_ptr();
                self.emit(|e, out| e.fload(out, &dst, MemOperand { base, disp: offset }))?;
                Ok(dst)
            }
            Expr::Unary { op: UnOp::Neg, operand } => {
                let src = self.eval(operand, depth + 1)?;
                self.load_double_literal(0.0, depth)?;
                self.emit(|e, out| e.fsub(out, &dst, &src))?;
                Ok(dst)
            }
            Expr::Unary { .. } => Err(LoweringError::Unsupported("bitwise/boolean unary operator on a float value")),
            Expr::Binary { op, lhs, rhs } if !op.is_comparison() => {
                let lhs_reg = self.eval(lhs, depth)?;
                let rhs_reg = self.eval(rhs, depth + 1)?;
                match op {
                    BinOp::Add => self.emit(|e, out| e.fadd(out, &lhs_reg, &rhs_reg))?,
                    BinOp::Sub => self.emit(|e, out| e.fsub(out, &lhs_reg, &rhs_reg))?,
                    BinOp::Mul => self.emit(|e, out| e.fmul(out, &lhs_reg, &rhs_reg))?,
                    BinOp::Div => {
                        self.div_zero_check(&rhs_reg)?;
                        self.emit(|e, out| e.fdiv(out, &lhs_reg, &rhs_reg))?
                    }
                    _ => return Err(LoweringError::Unsupported("integer-only binary operator on a float value")),
                }
                Ok(lhs_reg)
            }
            Expr::Binary { .. } => Err(LoweringError::Unsupported("comparison used as a value (only as a loop/while condition)")),
            Expr::Index { base, index } => {
                let name = array_base_name(base)?;
                let addr_reg = self.array_element_address(&name, index, depth)?;
                self.emit(|e, out| e.fload(out, &dst, MemOperand::base(&addr_reg)))?;
                Ok(dst)
            }
            Expr::Fma { a, b, c, is_sub, is_neg_mul } => {
                if *is_neg_mul {
                    return Err(LoweringError::Unsupported("negated-product FMA (c - a*b)"));
                }
                let a_reg = self.eval(a, depth)?;
                let b_reg = self.eval(b, depth + 1)?;
                let c_reg = self.eval(c, depth + 2)?;
                self.emit(|e, out| e.vfma(out, c67c_codegen::VectorWidth::Bits128, &a_reg, &a_reg, &b_reg, &c_reg, *is_sub))?;
                Ok(a_reg)
            }
            Expr::Cast { expr, kind } => self.eval_cast(expr, kind, depth),
            Expr::Call { callee, args, indirect: false } => self.eval_numeric_call(callee, args, depth),
            _ => Err(LoweringError::Unsupported("expression form not lowered to a scalar float value")),
        }
    }

    fn eval_cast(&mut self, expr: &Expr, kind: &c67c_ast::CastKind, depth: u8) -> Result<String, LoweringError> {
        use c67c_ast::{CastKind, NumericType};
        match kind {
            CastKind::Numeric(NumericType::Float64) => self.eval(expr, depth),
            CastKind::Numeric(NumericType::Int64) => {
                let dst = self.eval(expr, depth)?;
                let tmp_gpr = gpr_scratch(depth);
                self.emit(|e, out| e.cvt_double_to_int(out, tmp_gpr, &dst))?;
                self.emit(|e, out| e.cvt_int_to_double(out, &dst, tmp_gpr))?;
                Ok(dst)
            }
            CastKind::Numeric(_) => Err(LoweringError::Unsupported("cast to an integer width narrower than 64 bits")),
            CastKind::Bitcast(_) => Err(LoweringError::Unsupported("raw bitcast outside an unsafe block")),
        }
    }

    /// A direct call in value position. `println` returns no value and every other callee would
    /// require a user-function calling convention this lowering pass doesn't implement, so this
    /// always errors; it exists so `eval`'s `Call` arm has somewhere to route through instead of
    /// falling into the generic `Unsupported("expression form ...")` catch-all with a less useful
    /// message.
    fn eval_numeric_call(&mut self, callee: &Expr, _args: &[Expr], _depth: u8) -> Result<String, LoweringError> {
        let name = callee_name(callee)?;
        if name == "println" {
            Err(LoweringError::Unsupported("println used as a value"))
        } else {
            Err(LoweringError::Unsupported("call to a user-defined function (only println and unsafe-block syscalls are lowered)"))
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), LoweringError> {
        match stmt {
            Stmt::Assign { target: AssignTarget::Name(name), compound_op: None, value, .. } if is_numeric_array_literal(value) => {
                let items = match value {
                    Expr::ListLit(items) => items,
                    _ => unreachable!("is_numeric_array_literal only matches Expr::ListLit"),
                };
                self.lower_array_define(name, items)
            }
            Stmt::Assign { target: AssignTarget::Name(name), compound_op, value, .. } => {
                self.lower_assign(name, compound_op.as_ref(), value)
            }
            Stmt::Assign { target: AssignTarget::Index { base, index }, compound_op, value, .. } => {
                self.lower_index_assign(base, index, compound_op.as_ref(), value)
            }
            Stmt::Assign { target: AssignTarget::Field { .. }, .. } => {
                Err(LoweringError::Unsupported("field assignment (no struct/map runtime representation)"))
            }
            Stmt::ExprStmt(expr) => self.lower_expr_stmt(expr),
            Stmt::Loop(loop_) => self.lower_loop(loop_),
            Stmt::While { label, cond, body } => self.lower_while(*label, cond, body),
            Stmt::Jump { kind, label } => self.lower_jump(*kind, *label),
            Stmt::Import { .. } => Ok(()),
            Stmt::RegisterAssign { register, value } => self.lower_register_assign(register, value),
            Stmt::MemoryStore { address, value, width } => self.lower_memory_store(address, value, *width),
            Stmt::Syscall { number, args } => self.lower_syscall(number, args),
            Stmt::Defer(_) => Err(LoweringError::Unsupported("defer (requires a scope-exit runtime this backend does not model)")),
            Stmt::Spawn(_) => Err(LoweringError::Unsupported("spawn (requires a process/scheduler runtime this backend does not model)")),
            Stmt::Arena(_) => Err(LoweringError::Unsupported("arena block (requires a scoped allocator this backend does not model)")),
        }
    }

    fn lower_assign(&mut self, name: &str, compound_op: Option<&BinOp>, value: &Expr) -> Result<(), LoweringError> {
        let offset = self.var_slot(name)?;
        let base = self.frame_ptr();
        match compound_op {
            None => {
                let reg = self.eval(value, 0)?;
                self.emit(|e, out| e.fstore(out, MemOperand { base, disp: offset }, &reg))
            }
            Some(op) => {
                let old = float_reg(self.arch, 0);
                self.emit(|e, out| e.fload(out, &old, MemOperand { base, disp: offset }))?;
                let rhs = self.eval(value, 1)?;
                match op {
                    BinOp::Add => self.emit(|e, out| e.fadd(out, &old, &rhs))?,
                    BinOp::Sub => self.emit(|e, out| e.fsub(out, &old, &rhs))?,
                    BinOp::Mul => self.emit(|e, out| e.fmul(out, &old, &rhs))?,
                    BinOp::Div => {
                        self.div_zero_check(&rhs)?;
                        self.emit(|e, out| e.fdiv(out, &old, &rhs))?
                    }
                    _ => return Err(LoweringError::Unsupported("non-arithmetic compound assignment operator")),
                }
                self.emit(|e, out| e.fstore(out, MemOperand { base, disp: offset }, &old))
            }
        }
    }

    /// `name := [1.0, 2.0, 3.0]` — writes the literal's bytes to a fresh writable data symbol and
    /// registers it in `self.arrays`. `name` never gets a frame slot; every later reference to it
    /// resolves through the array table instead of `var_slot`.
    fn lower_array_define(&mut self, name: &str, items: &[Expr]) -> Result<(), LoweringError> {
        let mut bytes = Vec::with_capacity(items.len() * 8);
        for item in items {
            match item {
                Expr::Number(n) => bytes.extend_from_slice(&n.to_le_bytes()),
                _ => return Err(LoweringError::Unsupported("array literal element that is not a numeric constant")),
            }
        }
        self.rodata_counter += 1;
        let symbol = format!("__array_{name}_{}", self.rodata_counter);
        self.builder.define_writable(&symbol, &bytes)?;
        self.arrays.insert(name.to_string(), ArrayInfo { symbol, len: items.len() });
        Ok(())
    }

    /// Computes `&array[index]` into `gpr_scratch(depth + 1)`; `gpr_scratch(depth)` is left free
    /// for the caller. Guards `depth` itself so the `+ 1` can never walk past the fixed pool.
    fn array_element_address(&mut self, name: &str, index: &Expr, depth: u8) -> Result<String, LoweringError> {
        if depth + 1 >= POOL_SIZE {
            return Err(LoweringError::ExpressionTooDeep(POOL_SIZE));
        }
        let info = self.arrays.get(name).cloned().ok_or_else(|| LoweringError::UnknownVariable(name.to_string()))?;
        let index_reg = self.eval_int(index, depth)?;
        let addr_reg = gpr_scratch(depth + 1).to_string();
        self.builder.load_address(&addr_reg, &info.symbol)?;
        self.emit(|e, out| e.shl(out, Width::W64, &index_reg, c67c_codegen::ShiftAmount::Immediate(3)))?;
        self.emit(|e, out| e.add(out, Width::W64, &addr_reg, &index_reg))?;
        Ok(addr_reg)
    }

    /// `base[index] <- value`.
    fn lower_index_assign(&mut self, base: &Expr, index: &Expr, compound_op: Option<&BinOp>, value: &Expr) -> Result<(), LoweringError> {
        if compound_op.is_some() {
            return Err(LoweringError::Unsupported("compound assignment to an indexed array element"));
        }
        let name = array_base_name(base)?;
        let value_reg = self.eval(value, 0)?;
        let addr_reg = self.array_element_address(&name, index, 1)?;
        self.emit(|e, out| e.fstore(out, MemOperand::base(&addr_reg), &value_reg))
    }

    /// Checks `divisor` against zero and jumps to the shared division-by-zero exit path. Must run
    /// immediately before every `fdiv` this pass emits.
    fn div_zero_check(&mut self, divisor: &str) -> Result<(), LoweringError> {
        let zero = self.zero_float_const()?;
        self.emit(|e, out| e.fcmp(out, divisor, &zero))?;
        let label = self.div_zero_target();
        self.builder.generate_jump_if(c67c_codegen::Condition::Eq, &label)?;
        Ok(())
    }

    /// Loads `0.0` into the dedicated zero-constant slot (`float_reg(arch, POOL_SIZE)`), a register
    /// the depth-bounded recursive pool never reaches.
    fn zero_float_const(&mut self) -> Result<String, LoweringError> {
        let symbol = self.define_double(0.0)?;
        let addr_reg = gpr_scratch(0);
        let dst = float_reg(self.arch, POOL_SIZE);
        self.builder.load_address(addr_reg, &symbol)?;
        self.emit(|e, out| e.fload(out, &dst, MemOperand::base(addr_reg)))?;
        Ok(dst)
    }

    /// The shared division-by-zero exit label, allocated on first use.
    fn div_zero_target(&mut self) -> String {
        if let Some(label) = &self.div_zero_label {
            return label.clone();
        }
        let label = self.fresh_label("div_zero");
        self.div_zero_label = Some(label.clone());
        label
    }

    fn lower_expr_stmt(&mut self, expr: &Expr) -> Result<(), LoweringError> {
        match expr {
            Expr::Call { callee, args, indirect: false } if callee_name(callee).as_deref() == Ok("println") => {
                self.lower_println(args)
            }
            Expr::Unsafe(block) => self.lower_unsafe_block(block),
            Expr::Postfix { op, operand } => self.lower_postfix(*op, operand),
            _ => {
                self.eval(expr, 0)?;
                Ok(())
            }
        }
    }

    fn lower_postfix(&mut self, op: c67c_ast::PostfixOp, operand: &Expr) -> Result<(), LoweringError> {
        let name = match operand {
            Expr::Ident(ident) if ident.namespace.is_none() => ident.name.clone(),
            _ => return Err(LoweringError::Unsupported("postfix increment/decrement on a non-variable operand")),
        };
        let offset = self.var_slot(&name)?;
        let base = self.frame_ptr();
        let cur = float_reg(self.arch, 0);
        self.emit(|e, out| e.fload(out, &cur, MemOperand { base, disp: offset }))?;
        self.load_double_literal(1.0, 1)?;
        let one = float_reg(self.arch, 1);
        match op {
            c67c_ast::PostfixOp::Inc => self.emit(|e, out| e.fadd(out, &cur, &one))?,
            c67c_ast::PostfixOp::Dec => self.emit(|e, out| e.fsub(out, &cur, &one))?,
        }
        self.emit(|e, out| e.fstore(out, MemOperand { base, disp: offset }, &cur))
    }

    fn lower_println(&mut self, args: &[Expr]) -> Result<(), LoweringError> {
        if args.len() != 1 {
            return Err(LoweringError::Unsupported("println with other than exactly one argument"));
        }
        match &args[0] {
            Expr::Str(s) => {
                self.rodata_counter += 1;
                let symbol = format!("__str_lit_{}", self.rodata_counter);
                let mut bytes = s.clone().into_bytes();
                bytes.push(b'\n');
                self.builder.define(&symbol, &bytes)?;
                let ptr_reg = gpr_scratch(0);
                let len_reg = gpr_scratch(1);
                self.builder.load_address(ptr_reg, &symbol)?;
                self.emit(|e, out| e.mov_imm_reg(out, Width::W64, len_reg, bytes.len() as i64))?;
                self.externs.insert(RT_PRINTLN_STR.to_string());
                self.builder.generate_call(RT_PRINTLN_STR)?;
                Ok(())
            }
            numeric => {
                self.eval(numeric, 0)?;
                self.externs.insert(RT_PRINTLN_F64.to_string());
                self.builder.generate_call(RT_PRINTLN_F64)?;
                Ok(())
            }
        }
    }

    fn lower_loop(&mut self, loop_: &Loop) -> Result<(), LoweringError> {
        if loop_.num_threads != 0 {
            return Err(LoweringError::Unsupported("explicit worker-thread loop (`@(n) i in ...`)"));
        }
        if self.try_lower_vectorized_loop(loop_)? {
            return Ok(());
        }
        let (start, end, inclusive) = match loop_.iterable.as_ref() {
            Expr::Range { start, end, inclusive } => (start.as_ref(), end.as_ref(), *inclusive),
            _ => return Err(LoweringError::Unsupported("loop over a non-range iterable (lists/maps need a runtime representation this backend does not model)")),
        };

        let var_offset = self.var_slot(&loop_.var)?;
        let end_offset = self.var_slot(&end_slot_name(loop_.label))?;
        let base = self.frame_ptr();

        let start_reg = self.eval(start, 0)?;
        self.emit(|e, out| e.fstore(out, MemOperand { base, disp: var_offset }, &start_reg))?;
        let end_reg = self.eval(end, 0)?;
        self.emit(|e, out| e.fstore(out, MemOperand { base, disp: end_offset }, &end_reg))?;

        let top = self.fresh_label("loop_top");
        let cont = self.fresh_label("loop_continue");
        let exit = self.fresh_label("loop_exit");

        self.builder.mark_label(&top)?;
        let cur = float_reg(self.arch, 0);
        let lim = float_reg(self.arch, 1);
        self.emit(|e, out| e.fload(out, &cur, MemOperand { base, disp: var_offset }))?;
        self.emit(|e, out| e.fload(out, &lim, MemOperand { base, disp: end_offset }))?;
        self.emit(|e, out| e.fcmp(out, &cur, &lim))?;
        let exit_cond = if inclusive { c67c_codegen::Condition::Gt } else { c67c_codegen::Condition::Ge };
        self.builder.generate_jump_if(exit_cond, &exit)?;

        self.loop_stack.push(LoopFrame { label: loop_.label, continue_target: cont.clone(), break_target: exit.clone() });
        for stmt in &loop_.body {
            self.lower_stmt(stmt)?;
        }
        self.loop_stack.pop();

        self.builder.mark_label(&cont)?;
        let cur = float_reg(self.arch, 0);
        self.emit(|e, out| e.fload(out, &cur, MemOperand { base, disp: var_offset }))?;
        self.load_double_literal(1.0, 1)?;
        let one = float_reg(self.arch, 1);
        self.emit(|e, out| e.fadd(out, &cur, &one))?;
        self.emit(|e, out| e.fstore(out, MemOperand { base, disp: var_offset }, &cur))?;
        self.builder.generate_jump(&top)?;
        self.builder.mark_label(&exit)?;
        Ok(())
    }

    /// Attempts the SIMD fast path for a loop the vectorizer marked `vectorized`: a single-statement
    /// elementwise body (`out[i] <- a[i] OP b[i]`) over a `0..count` range where `out`/`a`/`b` are
    /// all known flat arrays of length `count`. Returns `Ok(false)` (not an error) for anything that
    /// doesn't match the shape the vectorizer itself only ever marks — the scalar path below still
    /// handles it correctly, just without SIMD.
    fn try_lower_vectorized_loop(&mut self, loop_: &Loop) -> Result<bool, LoweringError> {
        if !loop_.vectorized {
            return Ok(false);
        }
        let Some((out_name, a_name, b_name, op)) = match_elementwise_pattern(loop_) else {
            return Ok(false);
        };
        let (start, end, inclusive) = match loop_.iterable.as_ref() {
            Expr::Range { start, end, inclusive } => (start.as_ref(), end.as_ref(), *inclusive),
            _ => return Ok(false),
        };
        if inclusive {
            return Ok(false);
        }
        let (Expr::Number(start_n), Expr::Number(end_n)) = (start, end) else {
            return Ok(false);
        };
        if *start_n != 0.0 || *end_n < 0.0 {
            return Ok(false);
        }
        let count = *end_n as usize;

        let (Some(out_info), Some(a_info), Some(b_info)) =
            (self.arrays.get(&out_name).cloned(), self.arrays.get(&a_name).cloned(), self.arrays.get(&b_name).cloned())
        else {
            return Ok(false);
        };
        if out_info.len != count || a_info.len != count || b_info.len != count {
            return Ok(false);
        }

        let width = vector_width_for_lanes(loop_.vector_width);
        let lanes = loop_.vector_width.max(1) as usize;
        let mut i = 0;
        while i + lanes <= count {
            self.emit_vectorized_chunk(width, &out_info, &a_info, &b_info, op, i)?;
            i += lanes;
        }
        while i < count {
            self.emit_scalar_array_chunk(&out_name, &a_name, &b_name, op, i)?;
            i += 1;
        }
        Ok(true)
    }

    /// Processes one full-width SIMD chunk of a vectorized elementwise loop: load `a`/`b`'s lane
    /// group, combine, store to `out`. The three arrays' known element offsets are compile-time
    /// constants, so this needs no runtime index arithmetic at all (unlike the scalar fallback).
    fn emit_vectorized_chunk(
        &mut self,
        w: c67c_codegen::VectorWidth,
        out: &ArrayInfo,
        a: &ArrayInfo,
        b: &ArrayInfo,
        op: BinOp,
        index: usize,
    ) -> Result<(), LoweringError> {
        let disp = (index * 8) as i32;
        let va = float_reg(self.arch, 0);
        let vb = float_reg(self.arch, 1);
        let addr = gpr_scratch(0).to_string();

        self.builder.load_address(&addr, &a.symbol)?;
        self.emit(|e, out_buf| e.vload(out_buf, w, &va, MemOperand { base: addr.as_str(), disp }))?;
        self.builder.load_address(&addr, &b.symbol)?;
        self.emit(|e, out_buf| e.vload(out_buf, w, &vb, MemOperand { base: addr.as_str(), disp }))?;
        match op {
            BinOp::Add => self.emit(|e, out_buf| e.vadd(out_buf, w, &va, &va, &vb))?,
            BinOp::Sub => self.emit(|e, out_buf| e.vsub(out_buf, w, &va, &va, &vb))?,
            BinOp::Mul => self.emit(|e, out_buf| e.vmul(out_buf, w, &va, &va, &vb))?,
            BinOp::Div => self.emit(|e, out_buf| e.vdiv(out_buf, w, &va, &va, &vb))?,
            _ => return Err(LoweringError::Unsupported("non-arithmetic operator in a vectorized loop body")),
        }
        self.builder.load_address(&addr, &out.symbol)?;
        self.emit(|e, out_buf| e.vstore(out_buf, w, MemOperand { base: addr.as_str(), disp }, &va))
    }

    /// Handles one remainder element below the SIMD chunk width by synthesizing the equivalent
    /// `out[index] <- a[index] OP b[index]` statement and routing it through the ordinary scalar
    /// index-assign lowering — which is where the division-by-zero check lives, so the remainder
    /// tail gets it automatically even though the SIMD fast path above does not (see `DESIGN.md`).
    fn emit_scalar_array_chunk(&mut self, out_name: &str, a_name: &str, b_name: &str, op: BinOp, index: usize) -> Result<(), LoweringError> {
        let idx = Expr::Number(index as f64);
        let stmt = Stmt::Assign {
            target: AssignTarget::Index {
                base: Box::new(Expr::Ident(c67c_ast::Ident::simple(out_name))),
                index: Box::new(idx.clone()),
            },
            mutable: false,
            is_define: false,
            compound_op: None,
            value: Expr::Binary {
                op,
                lhs: Box::new(Expr::Index {
                    base: Box::new(Expr::Ident(c67c_ast::Ident::simple(a_name))),
                    index: Box::new(idx.clone()),
                }),
                rhs: Box::new(Expr::Index {
                    base: Box::new(Expr::Ident(c67c_ast::Ident::simple(b_name))),
                    index: Box::new(idx),
                }),
            },
        };
        self.lower_stmt(&stmt)
    }

    fn lower_while(&mut self, label: u32, cond: &Expr, body: &[Stmt]) -> Result<(), LoweringError> {
        let top = self.fresh_label("while_top");
        let exit = self.fresh_label("while_exit");

        self.builder.mark_label(&top)?;
        self.lower_cond_jump_if_false(cond, &exit)?;

        self.loop_stack.push(LoopFrame { label, continue_target: top.clone(), break_target: exit.clone() });
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        self.loop_stack.pop();

        self.builder.generate_jump(&top)?;
        self.builder.mark_label(&exit)?;
        Ok(())
    }

    /// Emits a conditional jump to `target` taken when `cond` is *false*. Comparisons are a
    /// control-flow primitive here, not a value: `ArchEmitter` exposes no "materialize condition
    /// flags as a 0.0/1.0 double" operation, so a comparison used anywhere but directly as a
    /// loop/while condition is rejected by `eval` instead of guessed at.
    fn lower_cond_jump_if_false(&mut self, cond: &Expr, target: &str) -> Result<(), LoweringError> {
        let (op, lhs, rhs) = match cond {
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => (*op, lhs.as_ref(), rhs.as_ref()),
            _ => return Err(LoweringError::Unsupported("while condition is not a direct comparison")),
        };
        let a = self.eval(lhs, 0)?;
        let b = self.eval(rhs, 1)?;
        self.emit(|e, out| e.fcmp(out, &a, &b))?;
        let false_cond = op.inverted().ok_or(LoweringError::Unsupported("non-invertible comparison operator"))?;
        let cond = match false_cond {
            BinOp::Eq => c67c_codegen::Condition::Eq,
            BinOp::Ne => c67c_codegen::Condition::Ne,
            BinOp::Lt => c67c_codegen::Condition::Lt,
            BinOp::Le => c67c_codegen::Condition::Le,
            BinOp::Gt => c67c_codegen::Condition::Gt,
            BinOp::Ge => c67c_codegen::Condition::Ge,
            _ => return Err(LoweringError::Unsupported("non-relational while condition")),
        };
        self.builder.generate_jump_if(cond, target)?;
        Ok(())
    }

    fn lower_jump(&mut self, kind: JumpKind, label: Option<u32>) -> Result<(), LoweringError> {
        let frame = match label {
            Some(n) => self.loop_stack.iter().rev().find(|f| f.label == n).ok_or(LoweringError::UnknownLoopLabel(n))?,
            None => self.loop_stack.last().ok_or(LoweringError::JumpOutsideLoop(match kind {
                JumpKind::Break => "break",
                JumpKind::Continue => "continue",
            }))?,
        };
        let target = match kind {
            JumpKind::Break => frame.break_target.clone(),
            JumpKind::Continue => frame.continue_target.clone(),
        };
        self.builder.generate_jump(&target)?;
        Ok(())
    }

    /// Evaluates an integer/address-valued expression into `gpr_scratch(depth)`, for use inside
    /// `unsafe` blocks (register/memory/syscall access is the only place the language deals in raw
    /// integers rather than its one float type).
    fn eval_int(&mut self, expr: &Expr, depth: u8) -> Result<String, LoweringError> {
        if depth >= POOL_SIZE {
            return Err(LoweringError::ExpressionTooDeep(POOL_SIZE));
        }
        let dst = gpr_scratch(depth).to_string();
        match expr {
            Expr::Number(n) => {
                self.emit(|e, out| e.mov_imm_reg(out, Width::W64, &dst, *n as i64))?;
                Ok(dst)
            }
            Expr::RegisterLoad(reg) => {
                if reg != &dst {
                    self.emit(|e, out| e.mov_reg_reg(out, Width::W64, &dst, reg))?;
                }
                Ok(dst)
            }
            Expr::Ident(ident) if ident.namespace.is_none() => {
                let offset = self.var_slot(&ident.name)?;
                let base = self.frame_ptr();
                let fdst = float_reg(self.arch, depth);
                self.emit(|e, out| e.fload(out, &fdst, MemOperand { base, disp: offset }))?;
                self.emit(|e, out| e.cvt_double_to_int(out, &dst, &fdst))?;
                Ok(dst)
            }
            Expr::Binary { op: BinOp::Add, lhs, rhs } => {
                let l = self.eval_int(lhs, depth)?;
                let r = self.eval_int(rhs, depth + 1)?;
                self.emit(|e, out| e.add(out, Width::W64, &l, &r))?;
                Ok(l)
            }
            Expr::Binary { op: BinOp::Sub, lhs, rhs } => {
                let l = self.eval_int(lhs, depth)?;
                let r = self.eval_int(rhs, depth + 1)?;
                self.emit(|e, out| e.sub(out, Width::W64, &l, &r))?;
                Ok(l)
            }
            _ => Err(LoweringError::Unsupported("address/integer expression form not lowered inside an unsafe block")),
        }
    }

    fn lower_unsafe_block(&mut self, block: &c67c_ast::UnsafeBlock) -> Result<(), LoweringError> {
        let body = block
            .bodies
            .iter()
            .find(|b| b.arch == self.arch)
            .ok_or(LoweringError::NoArchBody(self.arch))?;
        for stmt in &body.body {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// `register ← <float expression>` has no agreed-upon semantics (a plain float store and a
    /// bit-reinterpreting `as!` cast are both plausible readings); reject both forms rather than
    /// pick one, per `DESIGN.md`. A register-to-register or memory-to-register copy has no such
    /// ambiguity and is lowered directly.
    fn lower_register_assign(&mut self, register: &str, value: &Expr) -> Result<(), LoweringError> {
        match value {
            Expr::RegisterLoad(src) => self.emit(|e, out| e.mov_reg_reg(out, Width::W64, register, src)),
            Expr::MemoryLoad { address, width } => {
                let addr_reg = self.eval_int(address, 0)?;
                let w = mem_width(*width);
                let register = register.to_string();
                self.emit(move |e, out| e.load(out, w, &register, MemOperand::base(&addr_reg), false))
            }
            _ => Err(LoweringError::Unsupported("register assignment from a floating-point expression: semantics unresolved, see DESIGN.md")),
        }
    }

    fn lower_memory_store(&mut self, address: &Expr, value: &Expr, width: MemWidth) -> Result<(), LoweringError> {
        let addr_reg = self.eval_int(address, 0)?;
        let val_reg = self.eval_int(value, 1)?;
        let w = mem_width(width);
        self.emit(move |e, out| e.store(out, w, MemOperand::base(&addr_reg), &val_reg))
    }

    fn lower_syscall(&mut self, number: &Expr, args: &[Expr]) -> Result<(), LoweringError> {
        if args.len() > 5 {
            return Err(LoweringError::TooManySyscallArgs(args.len(), 5));
        }
        for (i, arg) in args.iter().enumerate() {
            self.eval_int(arg, i as u8)?;
        }
        let num_slot = args.len() as u8;
        let num_reg = self.eval_int(number, num_slot)?;
        let sys_reg = syscall_number_reg(self.arch);
        self.emit(move |e, out| e.mov_reg_reg(out, Width::W64, sys_reg, &num_reg))?;
        self.emit(|e, out| e.syscall(out))
    }

    /// Emits the process-exit sequence every compiled program ends with: call the runtime exit
    /// helper with `code`, the same external-symbol mechanism every other runtime call uses.
    fn emit_exit(&mut self, code: i64) -> Result<(), LoweringError> {
        let reg = gpr_scratch(0);
        self.emit(|e, out| e.mov_imm_reg(out, Width::W64, reg, code))?;
        self.externs.insert(RT_EXIT.to_string());
        self.builder.generate_call(RT_EXIT)?;
        Ok(())
    }
}

fn mem_width(w: MemWidth) -> Width {
    match w {
        MemWidth::Byte => Width::W8,
        MemWidth::Half => Width::W16,
        MemWidth::Word => Width::W32,
        MemWidth::Qword => Width::W64,
    }
}

fn callee_name(callee: &Expr) -> Result<String, LoweringError> {
    match callee {
        Expr::Ident(ident) if ident.namespace.is_none() => Ok(ident.name.clone()),
        _ => Err(LoweringError::Unsupported("indirect or namespaced call target")),
    }
}

/// The synthetic per-loop variable holding the (evaluated once) range end, keyed by the loop's own
/// label so nested loops don't collide.
fn end_slot_name(label: u32) -> String {
    format!("__loop_end_{label}")
}

/// `true` for a `ListLit` whose every element is a bare numeric constant — the only list shape
/// this backend gives a runtime representation to (a flat `f64` array).
fn is_numeric_array_literal(value: &Expr) -> bool {
    matches!(value, Expr::ListLit(items) if items.iter().all(|item| matches!(item, Expr::Number(_))))
}

fn array_base_name(expr: &Expr) -> Result<String, LoweringError> {
    ident_name(expr).ok_or(LoweringError::Unsupported("indexed access on a non-identifier base expression"))
}

fn ident_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(ident) if ident.namespace.is_none() => Some(ident.name.clone()),
        _ => None,
    }
}

/// Recognizes the canonical vectorizable-loop body shape (see `c67c-optimize::vectorize`'s own
/// tests): a single `out[i] <- a[i] OP b[i]` statement where `i` is the loop variable in all three
/// index positions. Returns the three array names and the operator.
fn match_elementwise_pattern(loop_: &Loop) -> Option<(String, String, String, BinOp)> {
    let [Stmt::Assign { target: AssignTarget::Index { base: out_base, index: out_index }, compound_op: None, value, .. }] = loop_.body.as_slice() else {
        return None;
    };
    if ident_name(out_index).as_deref() != Some(loop_.var.as_str()) {
        return None;
    }
    let out_name = ident_name(out_base)?;
    let Expr::Binary { op, lhs, rhs } = value else {
        return None;
    };
    if !matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div) {
        return None;
    }
    let Expr::Index { base: a_base, index: a_index } = lhs.as_ref() else {
        return None;
    };
    let Expr::Index { base: b_base, index: b_index } = rhs.as_ref() else {
        return None;
    };
    if ident_name(a_index).as_deref() != Some(loop_.var.as_str()) || ident_name(b_index).as_deref() != Some(loop_.var.as_str()) {
        return None;
    }
    Some((out_name, ident_name(a_base)?, ident_name(b_base)?, *op))
}

/// The `VectorWidth` whose lane count matches `lanes` (as set by the loop-vectorization-marking
/// pass, which always derives it from `Target::vector_lane_count`).
fn vector_width_for_lanes(lanes: u32) -> c67c_codegen::VectorWidth {
    match lanes {
        4 => c67c_codegen::VectorWidth::Bits256,
        8 => c67c_codegen::VectorWidth::Bits512,
        _ => c67c_codegen::VectorWidth::Bits128,
    }
}

/// Walks every statement (including loop/while/unsafe bodies) and assigns each distinct variable
/// name one 8-byte frame slot, in first-occurrence order. Slots are never reclaimed or reused:
/// this lowering trades a larger-than-strictly-necessary frame for never having to prove a
/// variable's lifetime has ended.
fn collect_frame(stmts: &[Stmt], vars: &mut HashMap<String, i32>) {
    for stmt in stmts {
        walk_stmt_for_frame(stmt, vars);
    }
}

fn alloc_slot(vars: &mut HashMap<String, i32>, name: &str) {
    if !vars.contains_key(name) {
        let offset = -(((vars.len() as i32) + 1) * 8);
        vars.insert(name.to_string(), offset);
    }
}

fn walk_stmt_for_frame(stmt: &Stmt, vars: &mut HashMap<String, i32>) {
    match stmt {
        Stmt::Assign { target: AssignTarget::Name(_), value, .. } if is_numeric_array_literal(value) => {}
        Stmt::Assign { target: AssignTarget::Name(name), .. } => alloc_slot(vars, name),
        Stmt::Assign { .. } => {}
        Stmt::Loop(loop_) => {
            alloc_slot(vars, &loop_.var);
            alloc_slot(vars, &end_slot_name(loop_.label));
            collect_frame(&loop_.body, vars);
        }
        Stmt::While { body, .. } => collect_frame(body, vars),
        Stmt::Arena(body) => collect_frame(body, vars),
        Stmt::ExprStmt(Expr::Unsafe(block)) => {
            for body in &block.bodies {
                collect_frame(&body.body, vars);
            }
        }
        Stmt::ExprStmt(_) | Stmt::Jump { .. } | Stmt::Defer(_) | Stmt::Spawn(_) | Stmt::Import { .. } => {}
        Stmt::RegisterAssign { .. } | Stmt::MemoryStore { .. } | Stmt::Syscall { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::Ident;

    fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign {
            target: AssignTarget::Name(name.to_string()),
            mutable: false,
            is_define: true,
            compound_op: None,
            value,
        }
    }

    fn array_literal(name: &str, items: &[f64]) -> Stmt {
        assign(name, Expr::ListLit(items.iter().map(|n| Expr::Number(*n)).collect()))
    }

    fn index_assign(name: &str, index: Expr, value: Expr) -> Stmt {
        Stmt::Assign {
            target: AssignTarget::Index {
                base: Box::new(Expr::Ident(Ident::simple(name))),
                index: Box::new(index),
            },
            mutable: false,
            is_define: false,
            compound_op: None,
            value,
        }
    }

    fn array_index(name: &str, index: Expr) -> Expr {
        Expr::Index { base: Box::new(Expr::Ident(Ident::simple(name))), index: Box::new(index) }
    }

    #[test]
    fn collect_frame_gives_each_distinct_variable_its_own_slot() {
        let stmts = vec![assign("x", Expr::Number(1.0)), assign("y", Expr::Number(2.0))];
        let mut vars = HashMap::new();
        collect_frame(&stmts, &mut vars);
        assert_eq!(vars.len(), 2);
        assert_ne!(vars["x"], vars["y"]);
    }

    #[test]
    fn collect_frame_reuses_the_slot_for_a_reassigned_variable() {
        let stmts = vec![assign("x", Expr::Number(1.0)), assign("x", Expr::Number(2.0))];
        let mut vars = HashMap::new();
        collect_frame(&stmts, &mut vars);
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn collect_frame_descends_into_loop_bodies_and_reserves_an_end_slot() {
        let loop_ = Stmt::Loop(Loop {
            label: 3,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(1.0)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body: vec![assign("acc", Expr::Number(0.0))],
            num_threads: 0,
            vectorized: false,
            vector_width: 0,
        });
        let mut vars = HashMap::new();
        collect_frame(std::slice::from_ref(&loop_), &mut vars);
        assert!(vars.contains_key("i"));
        assert!(vars.contains_key("acc"));
        assert!(vars.contains_key(&end_slot_name(3)));
    }

    #[test]
    fn unknown_variable_is_reported_by_name() {
        let program = Program {
            statements: vec![Stmt::ExprStmt(Expr::Call {
                callee: Box::new(Expr::Ident(Ident::simple("println"))),
                args: vec![Expr::Ident(Ident::simple("missing"))],
                indirect: false,
            })],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        let err = Lower::run(&program, &target).unwrap_err();
        assert!(matches!(err, LoweringError::UnknownVariable(name) if name == "missing"));
    }

    #[test]
    fn deeply_nested_expression_is_rejected_rather_than_spilled() {
        // Nests on the right-hand side, the operand `eval` advances `depth` for: a left-deep chain
        // never grows past depth 1, since `eval`'s `Binary` arm evaluates `lhs` at the *same* depth
        // it was called with and only `rhs` at `depth + 1`.
        let mut expr = Expr::Number(1.0);
        for _ in 0..POOL_SIZE + 1 {
            expr = Expr::Binary { op: BinOp::Add, lhs: Box::new(Expr::Number(1.0)), rhs: Box::new(expr) };
        }
        let program = Program {
            statements: vec![Stmt::ExprStmt(Expr::Call {
                callee: Box::new(Expr::Ident(Ident::simple("println"))),
                args: vec![expr],
                indirect: false,
            })],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        let err = Lower::run(&program, &target).unwrap_err();
        assert!(matches!(err, LoweringError::ExpressionTooDeep(POOL_SIZE)));
    }

    #[test]
    fn break_outside_a_loop_is_rejected() {
        let program = Program {
            statements: vec![Stmt::Jump { kind: JumpKind::Break, label: None }],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        let err = Lower::run(&program, &target).unwrap_err();
        assert!(matches!(err, LoweringError::JumpOutsideLoop("break")));
    }

    #[test]
    fn array_literal_supports_indexed_read_and_write() {
        let program = Program {
            statements: vec![
                array_literal("a", &[1.0, 2.0, 3.0]),
                index_assign(
                    "a",
                    Expr::Number(0.0),
                    Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(array_index("a", Expr::Number(1.0))),
                        rhs: Box::new(Expr::Number(10.0)),
                    },
                ),
            ],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        Lower::run(&program, &target).unwrap();
    }

    #[test]
    fn field_assignment_is_rejected() {
        let program = Program {
            statements: vec![Stmt::Assign {
                target: AssignTarget::Field { base: Box::new(Expr::Ident(Ident::simple("obj"))), name: "x".to_string() },
                mutable: false,
                is_define: false,
                compound_op: None,
                value: Expr::Number(1.0),
            }],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        let err = Lower::run(&program, &target).unwrap_err();
        assert!(matches!(err, LoweringError::Unsupported(_)));
    }

    #[test]
    fn indexing_an_undefined_array_is_reported_by_name() {
        let program = Program {
            statements: vec![index_assign("missing", Expr::Number(0.0), Expr::Number(1.0))],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        let err = Lower::run(&program, &target).unwrap_err();
        assert!(matches!(err, LoweringError::UnknownVariable(name) if name == "missing"));
    }

    fn elementwise_sum_loop(label: u32, width: u32, count: f64) -> Stmt {
        Stmt::Loop(Loop {
            label,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(count)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body: vec![index_assign(
                "out",
                Expr::Ident(Ident::simple("i")),
                Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(array_index("a", Expr::Ident(Ident::simple("i")))),
                    rhs: Box::new(array_index("b", Expr::Ident(Ident::simple("i")))),
                },
            )],
            num_threads: 0,
            vectorized: true,
            vector_width: width,
        })
    }

    #[test]
    fn vectorized_loop_shorter_than_one_lane_falls_back_to_a_scalar_remainder() {
        // Three elements against an 8-lane width never forms a full chunk, so every iteration
        // is lowered through the scalar remainder path.
        let program = Program {
            statements: vec![
                array_literal("a", &[1.0, 2.0, 3.0]),
                array_literal("b", &[4.0, 5.0, 6.0]),
                array_literal("out", &[0.0, 0.0, 0.0]),
                elementwise_sum_loop(0, 8, 3.0),
            ],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        Lower::run(&program, &target).unwrap();
    }

    #[test]
    fn vectorized_loop_spanning_exactly_one_lane_emits_a_simd_chunk() {
        let program = Program {
            statements: vec![
                array_literal("a", &[1.0; 8]),
                array_literal("b", &[2.0; 8]),
                array_literal("out", &[0.0; 8]),
                elementwise_sum_loop(1, 8, 8.0),
            ],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        Lower::run(&program, &target).unwrap();
    }

    #[test]
    fn vectorized_loop_with_a_partial_trailing_chunk_mixes_simd_and_scalar() {
        let program = Program {
            statements: vec![
                array_literal("a", &[1.0; 11]),
                array_literal("b", &[2.0; 11]),
                array_literal("out", &[0.0; 11]),
                elementwise_sum_loop(2, 8, 11.0),
            ],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        Lower::run(&program, &target).unwrap();
    }

    #[test]
    fn multiple_divisions_share_one_division_by_zero_exit_label() {
        let program = Program {
            statements: vec![
                assign(
                    "a",
                    Expr::Binary { op: BinOp::Div, lhs: Box::new(Expr::Number(4.0)), rhs: Box::new(Expr::Number(2.0)) },
                ),
                assign(
                    "b",
                    Expr::Binary { op: BinOp::Div, lhs: Box::new(Expr::Number(9.0)), rhs: Box::new(Expr::Number(3.0)) },
                ),
            ],
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, c67c_target::Os::Linux);
        Lower::run(&program, &target).unwrap();
    }
}
