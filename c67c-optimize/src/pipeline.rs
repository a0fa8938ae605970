//! Orchestrates the seven-pass optimizer pipeline in fixed order.

use std::collections::HashSet;

use c67c_ast::Program;
use c67c_target::Target;

use crate::closures::analyze_closures;
use crate::dce::eliminate_dead_code;
use crate::error::OptimizeError;
use crate::fold::fold_program;
use crate::inline::inline_program;
use crate::options::OptimizeOptions;
use crate::propagate::propagate_program;
use crate::purity::analyze_purity;
use crate::vectorize::vectorize_program;

fn top_level_names(program: &Program) -> HashSet<String> {
    use c67c_ast::{AssignTarget, Stmt};
    program
        .statements
        .iter()
        .filter_map(|s| match s {
            Stmt::Assign {
                target: AssignTarget::Name(name),
                ..
            } => Some(name.clone()),
            Stmt::Import { alias, path } => Some(alias.clone().unwrap_or_else(|| path.clone())),
            _ => None,
        })
        .collect()
}

/// Runs every pass in order against `program`, targeting `target` for the vectorization gate's
/// lane width. Logs a warning (rather than failing) if `options.integer_strength_reduction` is
/// set, since that rule isn't implemented — see `DESIGN.md`.
pub fn optimize(
    mut program: Program,
    target: &Target,
    options: &OptimizeOptions,
) -> Result<Program, OptimizeError> {
    if options.integer_strength_reduction {
        log::warn!(
            "integer_strength_reduction requested but not implemented; no additional reduction \
             will be applied beyond the always-on identity/negation/compare/boolean rules"
        );
    }

    log::debug!("optimize: pass 1 (constant folding)");
    program = fold_program(program);

    log::debug!("optimize: pass 2 (constant propagation)");
    program = propagate_program(program);

    if options.dead_code_elimination {
        log::debug!("optimize: pass 3 (dead code elimination)");
        program.statements = eliminate_dead_code(program.statements);
    } else {
        log::trace!("optimize: pass 3 (dead code elimination) skipped, disabled by default");
    }

    log::debug!("optimize: closure capture analysis (precedes purity)");
    let globals = top_level_names(&program);
    analyze_closures(&mut program.statements, &globals);

    log::debug!("optimize: pass 4 (purity analysis)");
    analyze_purity(&mut program.statements);

    log::debug!("optimize: pass 5+6 (function inlining, post-inline fold)");
    program = inline_program(program, options)?;

    log::debug!("optimize: pass 7 (loop vectorization marking)");
    program = vectorize_program(program, target);

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::{AssignTarget, BinOp, Expr, Ident, Stmt};
    use c67c_target::{Arch, Os};

    #[test]
    fn end_to_end_folds_propagates_and_inlines() {
        let stmts = vec![
            Stmt::Assign {
                target: AssignTarget::Name("scale".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Number(2.0),
            },
            Stmt::Assign {
                target: AssignTarget::Name("double".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(c67c_ast::Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: c67c_ast::LambdaBody::Expr(Box::new(Expr::Binary {
                        op: BinOp::Mul,
                        lhs: Box::new(Expr::Ident(Ident::simple("x"))),
                        rhs: Box::new(Expr::Ident(Ident::simple("scale"))),
                    })),
                    is_pure: false,
                    captured_vars: Vec::new(),
                    is_nested_lambda: false,
                }),
            },
            Stmt::Assign {
                target: AssignTarget::Name("result".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Call {
                    callee: Box::new(Expr::Ident(Ident::simple("double"))),
                    args: vec![Expr::Number(21.0)],
                    indirect: false,
                },
            },
        ];
        let program = Program {
            statements: stmts,
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, Os::Linux);
        let out = optimize(program, &target, &OptimizeOptions::default()).unwrap();
        match out.statements.last().unwrap() {
            Stmt::Assign { value, .. } => assert_eq!(*value, Expr::Number(42.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_inline_cycle() {
        // f := |x| g(x); g := |x| f(x) — a direct mutual-recursion cycle among candidates.
        let stmts = vec![
            Stmt::Assign {
                target: AssignTarget::Name("f".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(c67c_ast::Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: c67c_ast::LambdaBody::Expr(Box::new(Expr::Call {
                        callee: Box::new(Expr::Ident(Ident::simple("g"))),
                        args: vec![Expr::Ident(Ident::simple("x"))],
                        indirect: false,
                    })),
                    is_pure: false,
                    captured_vars: Vec::new(),
                    is_nested_lambda: false,
                }),
            },
            Stmt::Assign {
                target: AssignTarget::Name("g".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(c67c_ast::Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: c67c_ast::LambdaBody::Expr(Box::new(Expr::Call {
                        callee: Box::new(Expr::Ident(Ident::simple("f"))),
                        args: vec![Expr::Ident(Ident::simple("x"))],
                        indirect: false,
                    })),
                    is_pure: false,
                    captured_vars: Vec::new(),
                    is_nested_lambda: false,
                }),
            },
        ];
        let program = Program {
            statements: stmts,
            ..Default::default()
        };
        let target = Target::new(Arch::X86_64, Os::Linux);
        let err = optimize(program, &target, &OptimizeOptions::default()).unwrap_err();
        assert!(matches!(err, OptimizeError::InlineCycle(_)));
    }
}
