//! The expression-oriented AST handed to the core by the (out-of-scope) source parser.
//!
//! Passes mutate this tree in place; nothing here owns byte buffers or talks to the emitter.
//! Optional fields that only make sense after a particular optimizer pass has run
//! (`Lambda::is_pure`, `Lambda::captured_vars`, `Loop::vectorized`/`vector_width`) default to the
//! "not yet analyzed" value and are filled in by that pass, never by the parser.

use c67c_target::Arch;

/// A numeric-literal-friendly scalar value. The source language has a single numeric type
/// (64-bit float); integer semantics only exist inside an explicit integer context (see
/// [`CastKind`] and the strength-reduction gate documented on the optimizer).
pub type Number = f64;

/// A (possibly namespaced) identifier, e.g. `math.sqrt` parses to
/// `Ident { namespace: Some("math"), name: "sqrt" }`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ident {
    /// The namespace qualifier, if any (resolved against `Program::namespaces`).
    pub namespace: Option<String>,
    /// The unqualified name.
    pub name: String,
}

impl Ident {
    /// Build an unqualified identifier.
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }
}

/// Binary operators. Comparisons and arithmetic share one enum because both are subject to
/// constant folding and strength reduction uniformly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `and`, short-circuiting
    And,
    /// `or`, short-circuiting
    Or,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

impl BinOp {
    /// `true` for the six relational/equality operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// The operator with the comparison direction inverted, used by `not(comparison)` folding.
    /// Returns `None` for non-comparison operators.
    pub fn inverted(self) -> Option<BinOp> {
        Some(match self {
            BinOp::Eq => BinOp::Ne,
            BinOp::Ne => BinOp::Eq,
            BinOp::Lt => BinOp::Ge,
            BinOp::Le => BinOp::Gt,
            BinOp::Gt => BinOp::Le,
            BinOp::Ge => BinOp::Lt,
            _ => return None,
        })
    }
}

/// Prefix unary operators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnOp {
    /// `-x`
    Neg,
    /// `not x`
    Not,
    /// `~x`
    BitNot,
}

/// Postfix operators (`x++`, `x--`); these desugar to a read followed by a compound store and
/// are kept as a distinct node so the optimizer can recognize and fold the common
/// `i++` loop-increment idiom without re-deriving it from an assignment pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PostfixOp {
    /// `x++`
    Inc,
    /// `x--`
    Dec,
}

/// What `@`-prefixed loop-state queries refer to inside a loop body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopState {
    /// `@i` — current element/index.
    Index,
    /// `@counter` — number of iterations completed so far.
    Counter,
    /// `@first` — `true` on the first iteration.
    First,
    /// `@last` — `true` on the last iteration.
    Last,
}

/// The numeric types an explicit `as` cast can target. `Float64` is the language's only implicit
/// type; the others only exist inside a cast or an `unsafe` block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericType {
    /// 64-bit IEEE-754 float, the default representation.
    Float64,
    /// 64-bit two's-complement integer.
    Int64,
    /// 32-bit two's-complement integer.
    Int32,
    /// 16-bit two's-complement integer.
    Int16,
    /// 8-bit two's-complement integer.
    Int8,
}

/// Whether a cast reinterprets the numeric value (`as`) or reinterprets the underlying bits
/// (`as!`, a raw bitcast used by `unsafe` blocks to move a float's bit pattern into an integer
/// register and back).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CastKind {
    /// Numeric conversion, e.g. `3.9 as int64 == 3`.
    Numeric(NumericType),
    /// Raw bit reinterpretation, no value conversion.
    Bitcast(NumericType),
}

/// Width of a memory access in a register/memory-load expression or a `store` statement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemWidth {
    /// 8 bits.
    Byte,
    /// 16 bits.
    Half,
    /// 32 bits.
    Word,
    /// 64 bits.
    Qword,
}

/// A lambda (closure) literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lambda {
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
    /// Optional per-parameter type annotations (same length as `params` when present).
    pub param_types: Option<Vec<NumericType>>,
    /// Name of the variadic parameter, if the lambda accepts one (it collects trailing args).
    pub variadic: Option<String>,
    /// Optional declared return type.
    pub return_type: Option<NumericType>,
    /// The lambda body.
    pub body: LambdaBody,
    /// Filled by purity analysis (`c67c-optimize`'s `purity` pass). `false` until analyzed.
    pub is_pure: bool,
    /// Filled by closure analysis (`c67c-optimize`'s `closures` pass): every free identifier the
    /// body references (directly, or transitively through a nested lambda) that is not a global.
    pub captured_vars: Vec<String>,
    /// `true` if this lambda is itself nested inside another lambda's body.
    pub is_nested_lambda: bool,
}

/// A lambda's body: either a single tail expression or a full statement block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LambdaBody {
    /// `|x| x + 1`
    Expr(Box<Expr>),
    /// `|x| { y := x + 1; y * 2 }`
    Block(Vec<Stmt>),
}

/// One arm of a `match` expression or a pattern-dispatched lambda.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchArm {
    /// The pattern this arm matches.
    pub pattern: Pattern,
    /// An optional boolean guard; the arm only matches if the guard also evaluates to true.
    pub guard: Option<Expr>,
    /// The arm's result expression.
    pub body: Expr,
}

/// Patterns usable in `match` arms and pattern-lambda parameter lists.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pattern {
    /// `_`
    Wildcard,
    /// A literal number or string that must equal the scrutinee.
    Literal(Literal),
    /// Binds the scrutinee (or sub-value) to a name.
    Binding(String),
    /// `Point { x, y }` — destructures a struct literal's fields by name.
    Struct {
        /// The struct's declared name.
        name: String,
        /// Field name to sub-pattern.
        fields: Vec<(String, Pattern)>,
    },
}

/// A literal value, as used in [`Pattern::Literal`] and as an [`Expr`] leaf.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    /// A numeric literal.
    Number(Number),
    /// A string literal.
    Str(String),
}

/// One architecture-specialized body inside an `unsafe` block, e.g. the code that runs when the
/// compile target is `x86_64`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchBody {
    /// Which architecture this body applies to.
    pub arch: Arch,
    /// The statements to run on that architecture.
    pub body: Vec<Stmt>,
}

/// An `unsafe { ... }` block, whose contents are specialized per target architecture (inline
/// assembly is never portable across ISAs the way ordinary statements are).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnsafeBlock {
    /// One entry per architecture the block has a specialized body for.
    pub bodies: Vec<ArchBody>,
}

/// Expression nodes. `Fma` is synthetic: only the constant-folding pass ever constructs one, the
/// parser never does.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// A numeric literal.
    Number(Number),
    /// A string literal.
    Str(String),
    /// An address-of-symbol literal (`&some_label`).
    Address(String),
    /// A variable or function reference.
    Ident(Ident),
    /// An `@`-prefixed loop-state query.
    LoopState(LoopState),
    /// A binary operation.
    Binary {
        /// Which operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A prefix unary operation.
    Unary {
        /// Which operator.
        op: UnOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A postfix increment/decrement.
    Postfix {
        /// Which operator.
        op: PostfixOp,
        /// The operand (must be an lvalue; enforced by the parser, not here).
        operand: Box<Expr>,
    },
    /// `#expr` — the length of a list, map, or string.
    Len(Box<Expr>),
    /// `base[index]`
    Index {
        /// The collection being indexed.
        base: Box<Expr>,
        /// The index expression.
        index: Box<Expr>,
    },
    /// `base[start..end]`
    Slice {
        /// The collection being sliced.
        base: Box<Expr>,
        /// Inclusive lower bound, or `None` to start from the beginning.
        start: Option<Box<Expr>>,
        /// Exclusive upper bound, or `None` to run to the end.
        end: Option<Box<Expr>>,
    },
    /// `base.field`
    Field {
        /// The struct/map being accessed.
        base: Box<Expr>,
        /// The field name.
        name: String,
    },
    /// A direct or indirect call.
    Call {
        /// The callee. For a direct call this is typically an `Ident`; for an indirect call, any
        /// expression evaluating to a callable value.
        callee: Box<Expr>,
        /// Argument expressions, in order.
        args: Vec<Expr>,
        /// `true` if the callee is not a statically-known function label.
        indirect: bool,
    },
    /// `start..end` or `start..<end`.
    Range {
        /// Range start.
        start: Box<Expr>,
        /// Range end.
        end: Box<Expr>,
        /// `true` for `..=` (inclusive), `false` for `..<` (exclusive).
        inclusive: bool,
    },
    /// `[a, b, c]`
    ListLit(Vec<Expr>),
    /// `{k1: v1, k2: v2}`
    MapLit(Vec<(Expr, Expr)>),
    /// `Point { x: 1, y: 2 }`
    StructLit {
        /// The struct's declared name.
        name: String,
        /// Field name/value pairs, in source order.
        fields: Vec<(String, Expr)>,
    },
    /// `<1.0, 2.0, 3.0, 4.0>` — a fixed-width numeric vector literal, as distinct from a list
    /// (vector literals are what loop vectorization and SIMD codegen actually operate on).
    VectorLit(Vec<Expr>),
    /// A single-clause lambda.
    Lambda(Lambda),
    /// Several lambdas under one name, dispatched on the number of arguments at the call site.
    MultiLambda(Vec<Lambda>),
    /// A lambda whose single parameter is matched against a list of patterns.
    PatternLambda(Vec<MatchArm>),
    /// `a |> b` — pipes the result of `a` as the first argument to `b`.
    Pipe(Box<Expr>, Box<Expr>),
    /// `{ a, b, c }` evaluated concurrently, e.g. a parallel `for` body or a fan-out block.
    Parallel(Vec<Expr>),
    /// `a <> b` — function composition. Disabled: see `DESIGN.md`; lowering rejects this node.
    Compose(Box<Expr>, Box<Expr>),
    /// `background { ... }` — spawns `expr` without waiting for it.
    Background(Box<Expr>),
    /// `channel <- value`
    Send {
        /// The channel expression.
        channel: Box<Expr>,
        /// The value to send.
        value: Box<Expr>,
    },
    /// `<- channel`
    Receive(Box<Expr>),
    /// `match scrutinee { ... }`, with guarded arms and an optional default (`_`) arm.
    Match {
        /// The value being matched.
        scrutinee: Box<Expr>,
        /// Arms to try, in order.
        arms: Vec<MatchArm>,
        /// The default arm's body, if a bare `_` arm was given.
        default: Option<Box<Expr>>,
    },
    /// A numeric or raw-bitcast conversion.
    Cast {
        /// The expression being converted.
        expr: Box<Expr>,
        /// The target type and conversion kind.
        kind: CastKind,
    },
    /// A fused multiply-add, synthesized by constant folding from `a*b + c` (`is_sub = false`)
    /// or `a*b - c` (`is_sub = true`). `is_neg_mul` additionally negates the product, for the
    /// `-(a*b) + c` shape folded from `c - a*b`.
    Fma {
        /// First multiplicand.
        a: Box<Expr>,
        /// Second multiplicand.
        b: Box<Expr>,
        /// Addend/subtrahend.
        c: Box<Expr>,
        /// `true` for `a*b - c`.
        is_sub: bool,
        /// `true` if the product itself should be negated before combining with `c`.
        is_neg_mul: bool,
    },
    /// `unsafe { ... }` as an expression (the last architecture body's value is the result).
    Unsafe(UnsafeBlock),
    /// Reads the current value of a machine register inside an `unsafe` block.
    RegisterLoad(String),
    /// Reads `width` bits from `address` inside an `unsafe` block.
    MemoryLoad {
        /// The address expression.
        address: Box<Expr>,
        /// How many bits to read.
        width: MemWidth,
    },
    /// `arena { ... }` used in expression position: yields the value of its last expression.
    Arena(Box<Expr>),
}

/// Which loop-exit statement a [`Stmt::Jump`] performs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JumpKind {
    /// `break`
    Break,
    /// `continue`
    Continue,
}

/// A `@ var in iterable { ... }` loop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loop {
    /// Numeric label used by labeled `break`/`continue`, assigned by the parser.
    pub label: u32,
    /// The expression producing the iterable (a `Range`, `ListLit`, identifier, etc).
    pub iterable: Box<Expr>,
    /// The per-iteration binding name.
    pub var: String,
    /// The loop body.
    pub body: Vec<Stmt>,
    /// Number of worker threads requested (`0` means not parallel). A nonzero value bypasses the
    /// SIMD gate and is considered vectorizable unconditionally (see `c67c-ast::depanalysis`).
    pub num_threads: u32,
    /// Filled by the loop-vectorization-marking optimizer pass.
    pub vectorized: bool,
    /// Filled alongside `vectorized`: the SIMD width (lane count) codegen should target.
    pub vector_width: u32,
}

/// The left-hand side of an [`Stmt::Assign`]. Only [`AssignTarget::Name`] can introduce a new
/// binding (`is_define = true`); indexed and field targets always update something that already
/// exists.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssignTarget {
    /// `name := value` / `name = value`
    Name(String),
    /// `base[index] <- value`
    Index {
        /// The collection being written into.
        base: Box<Expr>,
        /// The index expression.
        index: Box<Expr>,
    },
    /// `base.field <- value`
    Field {
        /// The struct/map being written into.
        base: Box<Expr>,
        /// The field name.
        name: String,
    },
}

/// Top-level and nested statements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stmt {
    /// A `name := value` (define, `is_define = true`) or `name = value`/`name += value`
    /// (update, `is_define = false`) binding, or an indexed/field store (`result[i] <- value`).
    /// `compound_op` carries the operator for `+=`/`-=`/etc., `None` for a plain store.
    Assign {
        /// What is being assigned to.
        target: AssignTarget,
        /// `true` if this binding allows future reassignment (`:=!`, a mutable define).
        /// Meaningless (always `false`) for non-`Name` targets.
        mutable: bool,
        /// `true` for `:=` (introduces a new binding), `false` for `=`/compound assignment or
        /// any indexed/field store.
        is_define: bool,
        /// The operator for a compound assignment (`sum += i`), or `None` for a plain store.
        compound_op: Option<BinOp>,
        /// The right-hand side.
        value: Expr,
    },
    /// An expression evaluated for its side effects.
    ExprStmt(Expr),
    /// An iterator-style loop.
    Loop(Loop),
    /// A `while cond { ... }` loop.
    While {
        /// Numeric label for labeled `break`/`continue`.
        label: u32,
        /// The loop condition, re-evaluated each iteration.
        cond: Expr,
        /// The loop body.
        body: Vec<Stmt>,
    },
    /// `break`/`continue`, optionally targeting an enclosing loop by label rather than the
    /// innermost one.
    Jump {
        /// Which kind of jump.
        kind: JumpKind,
        /// The target loop's label, or `None` for the innermost enclosing loop.
        label: Option<u32>,
    },
    /// `defer expr` — pushes `expr` onto the current scope's LIFO defer list.
    Defer(Expr),
    /// `spawn expr` — forks an independent process running `expr`.
    Spawn(Expr),
    /// `arena { ... }` used as a statement: every allocation inside is released on every exit
    /// from the block, including an early `break`/`return`/`continue`.
    Arena(Vec<Stmt>),
    /// `rax <- expr` inside an `unsafe` block: stores into a named machine register.
    RegisterAssign {
        /// The register name (already alias-resolved; no architecture context yet at AST level).
        register: String,
        /// The value expression.
        value: Expr,
    },
    /// `store(address, value, width)` inside an `unsafe` block.
    MemoryStore {
        /// The address expression.
        address: Expr,
        /// The value to write.
        value: Expr,
        /// How many bits to write.
        width: MemWidth,
    },
    /// A direct syscall invocation inside an `unsafe` block.
    Syscall {
        /// The syscall number expression (may be a named constant resolved by `c67c-target`).
        number: Expr,
        /// Syscall arguments, in ABI register order.
        args: Vec<Expr>,
    },
    /// `import path as alias` — recorded for informational purposes only; the core never
    /// resolves imports itself (see `Program::namespaces`).
    Import {
        /// The imported module path.
        path: String,
        /// The local alias, if any.
        alias: Option<String>,
    },
}
