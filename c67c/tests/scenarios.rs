//! End-to-end compile tests against the public API, one per scenario the pipeline is expected to
//! handle. Scenario 6 (the `or!` operator) is not covered here — see `DESIGN.md`'s lowering-pass
//! entry for why no AST node exists to lower in the first place.

use c67c::{compile, CompileOptions, CoreError, LoweringError};
use c67c_ast::{AssignTarget, BinOp, Expr, Ident, Loop, Program, Stmt};
use c67c_target::{Arch, Os, Target};

fn array_literal(name: &str, items: &[f64]) -> Stmt {
    assign(name, Expr::ListLit(items.iter().map(|n| Expr::Number(*n)).collect()))
}

fn array_index(name: &str, index: Expr) -> Expr {
    Expr::Index { base: Box::new(Expr::Ident(Ident::simple(name))), index: Box::new(index) }
}

fn target() -> Target {
    Target::new(Arch::X86_64, Os::Linux)
}

fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        target: AssignTarget::Name(name.to_string()),
        mutable: false,
        is_define: true,
        compound_op: None,
        value,
    }
}

fn println(expr: Expr) -> Stmt {
    Stmt::ExprStmt(Expr::Call {
        callee: Box::new(Expr::Ident(Ident::simple("println"))),
        args: vec![expr],
        indirect: false,
    })
}

/// Scenario 1: `println("Hello, World!")`.
#[test]
fn hello_world_compiles_to_an_elf_image() {
    let program = Program {
        statements: vec![println(Expr::Str("Hello, World!".to_string()))],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// Scenario 2: `x := 5; y := 10; println(x + y)` — folds/propagates to `println(15)` before
/// lowering ever sees a variable reference.
#[test]
fn folded_sum_compiles() {
    let program = Program {
        statements: vec![
            assign("x", Expr::Number(5.0)),
            assign("y", Expr::Number(10.0)),
            println(Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Ident(Ident::simple("x"))),
                rhs: Box::new(Expr::Ident(Ident::simple("y"))),
            }),
        ],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// Scenario 3: `a := 2.0; b := 3.0; c := 4.0; println(a * b + c)` — constant folding synthesizes
/// an `Expr::Fma` node here, exercised through `vfma`.
#[test]
fn fma_shaped_expression_compiles() {
    let program = Program {
        statements: vec![
            assign("a", Expr::Number(2.0)),
            assign("b", Expr::Number(3.0)),
            assign("c", Expr::Number(4.0)),
            println(Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: Box::new(Expr::Ident(Ident::simple("a"))),
                    rhs: Box::new(Expr::Ident(Ident::simple("b"))),
                }),
                rhs: Box::new(Expr::Ident(Ident::simple("c"))),
            }),
        ],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// Scenario 4: `sum := 0; @ i in 0..<10 { sum += i }; println(sum)` — a scalar, non-vectorizable
/// accumulation loop (flow dependency on `sum` across iterations).
#[test]
fn accumulator_loop_compiles() {
    let program = Program {
        statements: vec![
            assign("sum", Expr::Number(0.0)),
            Stmt::Loop(Loop {
                label: 1,
                iterable: Box::new(Expr::Range {
                    start: Box::new(Expr::Number(0.0)),
                    end: Box::new(Expr::Number(10.0)),
                    inclusive: false,
                }),
                var: "i".to_string(),
                body: vec![Stmt::Assign {
                    target: AssignTarget::Name("sum".to_string()),
                    mutable: false,
                    is_define: false,
                    compound_op: Some(BinOp::Add),
                    value: Expr::Ident(Ident::simple("i")),
                }],
                num_threads: 0,
                vectorized: false,
                vector_width: 0,
            }),
            println(Expr::Ident(Ident::simple("sum"))),
        ],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// Scenario 5: `a := [1.0, 2.0, 3.0, ...]; out := [0.0, ...]; @ i in 0..<n { out[i] <- a[i] + b[i] }`
/// — the optimizer marks this loop `vectorized` (see `c67c-optimize/src/vectorize.rs`), and the
/// lowering pass emits a real packed-SIMD chunk plus a scalar remainder for the tail elements.
#[test]
fn vectorized_elementwise_array_loop_compiles() {
    let loop_ = Stmt::Loop(Loop {
        label: 2,
        iterable: Box::new(Expr::Range {
            start: Box::new(Expr::Number(0.0)),
            end: Box::new(Expr::Number(11.0)),
            inclusive: false,
        }),
        var: "i".to_string(),
        body: vec![Stmt::Assign {
            target: AssignTarget::Index {
                base: Box::new(Expr::Ident(Ident::simple("out"))),
                index: Box::new(Expr::Ident(Ident::simple("i"))),
            },
            mutable: false,
            is_define: false,
            compound_op: None,
            value: Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(array_index("a", Expr::Ident(Ident::simple("i")))),
                rhs: Box::new(array_index("b", Expr::Ident(Ident::simple("i")))),
            },
        }],
        num_threads: 0,
        vectorized: true,
        vector_width: 8,
    });
    let program = Program {
        statements: vec![
            array_literal("a", &[1.0; 11]),
            array_literal("b", &[2.0; 11]),
            array_literal("out", &[0.0; 11]),
            loop_,
        ],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// Dividing by a constant zero is a runtime-checked failure, not an unchecked `fdiv`.
#[test]
fn division_by_a_literal_zero_still_compiles_with_a_guarded_exit_path() {
    let program = Program {
        statements: vec![println(Expr::Binary {
            op: BinOp::Div,
            lhs: Box::new(Expr::Number(1.0)),
            rhs: Box::new(Expr::Number(0.0)),
        })],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// Lowering an unsupported construct reports a specific, non-panicking error rather than
/// guessing at semantics the optimizer can't fold away first.
#[test]
fn field_assignment_is_rejected_not_guessed() {
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
    let err = compile(program, &target(), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CoreError::Lowering(LoweringError::Unsupported(_))));
}

/// Compiles for all three architectures without a target-specific branch in the test itself.
#[test]
fn compiles_for_every_architecture() {
    for (arch, os) in [
        (Arch::X86_64, Os::Linux),
        (Arch::Arm64, Os::Darwin),
        (Arch::Riscv64, Os::Linux),
    ] {
        let target = Target::new(arch, os);
        let program = Program {
            statements: vec![println(Expr::Number(15.0))],
            ..Default::default()
        };
        compile(program, &target, &CompileOptions::default()).unwrap();
    }
}

/// A `while` loop lowers its condition as a control-flow jump, never a materialized boolean.
#[test]
fn while_loop_with_labeled_break_compiles() {
    let program = Program {
        statements: vec![
            assign("n", Expr::Number(0.0)),
            Stmt::While {
                label: 7,
                cond: Expr::Binary {
                    op: BinOp::Lt,
                    lhs: Box::new(Expr::Ident(Ident::simple("n"))),
                    rhs: Box::new(Expr::Number(3.0)),
                },
                body: vec![
                    Stmt::Assign {
                        target: AssignTarget::Name("n".to_string()),
                        mutable: false,
                        is_define: false,
                        compound_op: Some(BinOp::Add),
                        value: Expr::Number(1.0),
                    },
                    Stmt::Jump {
                        kind: c67c_ast::JumpKind::Continue,
                        label: Some(7),
                    },
                ],
            },
            println(Expr::Ident(Ident::simple("n"))),
        ],
        ..Default::default()
    };
    let image = compile(program, &target(), &CompileOptions::default()).unwrap();
    assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
}
