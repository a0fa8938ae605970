//! Loop vectorization marking — optimizer pass 7. Consults the dependency analyzer and SIMD gate
//! (`c67c-ast`'s `depanalysis` module) and sets `Loop::vectorized`/`vector_width`; the loop body
//! itself is never rewritten here, codegen reads the flag.

use c67c_ast::{analyze_loop_dependencies, is_vectorizable, Program, Stmt};
use c67c_target::Target;

fn mark_stmt(stmt: &mut Stmt, target: &Target) {
    match stmt {
        Stmt::Loop(l) => {
            for s in &mut l.body {
                mark_stmt(s, target);
            }
            let records = analyze_loop_dependencies(&l.body);
            if is_vectorizable(l, &records) {
                l.vectorized = true;
                l.vector_width = target.vector_lane_count();
            }
        }
        Stmt::While { body, .. } | Stmt::Arena(body) => {
            for s in body {
                mark_stmt(s, target);
            }
        }
        _ => {}
    }
}

/// Marks every vectorizable loop reachable from `program` for `target`.
pub fn vectorize_program(mut program: Program, target: &Target) -> Program {
    for stmt in &mut program.statements {
        mark_stmt(stmt, target);
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::{AssignTarget, BinOp, Expr, Ident, Loop};
    use c67c_target::Os;

    #[test]
    fn marks_elementwise_loop_vectorized() {
        let loop_stmt = Stmt::Loop(Loop {
            label: 0,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(64.0)),
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
                    lhs: Box::new(Expr::Index {
                        base: Box::new(Expr::Ident(Ident::simple("a"))),
                        index: Box::new(Expr::Ident(Ident::simple("i"))),
                    }),
                    rhs: Box::new(Expr::Index {
                        base: Box::new(Expr::Ident(Ident::simple("b"))),
                        index: Box::new(Expr::Ident(Ident::simple("i"))),
                    }),
                },
            }],
            num_threads: 0,
            vectorized: false,
            vector_width: 0,
        });
        let target = Target::new(c67c_target::Arch::X86_64, Os::Linux);
        let program = vectorize_program(
            Program {
                statements: vec![loop_stmt],
                ..Default::default()
            },
            &target,
        );
        match &program.statements[0] {
            Stmt::Loop(l) => {
                assert!(l.vectorized);
                assert_eq!(l.vector_width, 8);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn accumulator_loop_is_not_vectorized() {
        let loop_stmt = Stmt::Loop(Loop {
            label: 0,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(64.0)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body: vec![Stmt::Assign {
                target: AssignTarget::Name("sum".to_string()),
                mutable: true,
                is_define: false,
                compound_op: Some(BinOp::Add),
                value: Expr::Index {
                    base: Box::new(Expr::Ident(Ident::simple("a"))),
                    index: Box::new(Expr::Ident(Ident::simple("i"))),
                },
            }],
            num_threads: 0,
            vectorized: false,
            vector_width: 0,
        });
        let target = Target::new(c67c_target::Arch::X86_64, Os::Linux);
        let program = vectorize_program(
            Program {
                statements: vec![loop_stmt],
                ..Default::default()
            },
            &target,
        );
        match &program.statements[0] {
            Stmt::Loop(l) => assert!(!l.vectorized),
            other => panic!("unexpected {other:?}"),
        }
    }
}
