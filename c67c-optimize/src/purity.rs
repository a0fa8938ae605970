//! Purity analysis — optimizer pass 4: a monotone least fixed point over the set of
//! known-pure function names. Runs after closure analysis so it can check
//! `Lambda::captured_vars.is_empty()`.

use std::collections::HashSet;

use c67c_ast::{Expr, Lambda, LambdaBody, Stmt};

use crate::walk::{for_each_child, for_each_child_mut};

/// Built-ins treated as impure regardless of what the fixed point would otherwise conclude.
const KNOWN_IMPURE: &[&str] = &["printf", "println", "print", "scanf", "read", "write"];

fn collect_calls(expr: &Expr, out: &mut Vec<String>) {
    if let Expr::Call { callee, .. } = expr {
        if let Expr::Ident(ident) = callee.as_ref() {
            out.push(ident.name.clone());
        }
    }
    // A nested lambda's own calls are its own business — its purity is judged independently,
    // not folded into the enclosing body's call set.
    if matches!(
        expr,
        Expr::Lambda(_) | Expr::MultiLambda(_) | Expr::PatternLambda(_)
    ) {
        return;
    }
    for_each_child(expr, |child| collect_calls(child, out));
}

fn lambda_calls(lambda: &Lambda) -> Vec<String> {
    let mut out = Vec::new();
    match &lambda.body {
        LambdaBody::Expr(e) => collect_calls(e, &mut out),
        LambdaBody::Block(stmts) => {
            for s in stmts {
                collect_calls_stmt(s, &mut out);
            }
        }
    }
    out
}

fn collect_calls_stmt(stmt: &Stmt, out: &mut Vec<String>) {
    for e in crate::walk::stmt_exprs(stmt) {
        collect_calls(e, out);
    }
    for body in crate::walk::stmt_nested_bodies(stmt) {
        for s in body {
            collect_calls_stmt(s, out);
        }
    }
}

fn try_mark_pure(lambda: &mut Lambda, pure_names: &HashSet<String>) -> bool {
    if lambda.is_pure {
        return false;
    }
    let calls = lambda_calls(lambda);
    let has_side_effect = calls
        .iter()
        .any(|name| KNOWN_IMPURE.contains(&name.as_str()) || !pure_names.contains(name));
    if !has_side_effect && lambda.captured_vars.is_empty() {
        lambda.is_pure = true;
        true
    } else {
        false
    }
}

/// Walks every `Lambda` reachable from `stmts` (including ones nested inside other expressions),
/// calling `f` with the lambda and, when statically known (the lambda is the direct value of a
/// `name := |...| ...` binding), the name it's bound to.
fn visit_lambdas(stmts: &mut [Stmt], f: &mut impl FnMut(&mut Lambda, Option<&str>)) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let bound_name = match target {
                    c67c_ast::AssignTarget::Name(n) => Some(n.clone()),
                    _ => None,
                };
                visit_lambdas_in_expr(value, bound_name.as_deref(), f);
            }
            Stmt::ExprStmt(e) | Stmt::Defer(e) | Stmt::Spawn(e) => {
                visit_lambdas_in_expr(e, None, f)
            }
            Stmt::Loop(l) => visit_lambdas(&mut l.body, f),
            Stmt::While { body, .. } => visit_lambdas(body, f),
            Stmt::Arena(body) => visit_lambdas(body, f),
            Stmt::RegisterAssign { value, .. } => visit_lambdas_in_expr(value, None, f),
            Stmt::MemoryStore { address, value, .. } => {
                visit_lambdas_in_expr(address, None, f);
                visit_lambdas_in_expr(value, None, f);
            }
            Stmt::Syscall { number, args } => {
                visit_lambdas_in_expr(number, None, f);
                for a in args {
                    visit_lambdas_in_expr(a, None, f);
                }
            }
            Stmt::Jump { .. } | Stmt::Import { .. } => {}
        }
    }
}

fn visit_lambdas_in_expr(
    expr: &mut Expr,
    name: Option<&str>,
    f: &mut impl FnMut(&mut Lambda, Option<&str>),
) {
    match expr {
        Expr::Lambda(lambda) => {
            if let LambdaBody::Block(body) = &mut lambda.body {
                visit_lambdas(body, f);
            }
            f(lambda, name);
        }
        Expr::MultiLambda(lambdas) => {
            for lambda in lambdas {
                if let LambdaBody::Block(body) = &mut lambda.body {
                    visit_lambdas(body, f);
                }
                f(lambda, name);
            }
        }
        _ => for_each_child_mut(expr, |child| visit_lambdas_in_expr(child, None, f)),
    }
}

/// Runs the fixed point to completion, setting [`Lambda::is_pure`] on every lambda reachable from
/// `stmts`.
pub fn analyze_purity(stmts: &mut [Stmt]) {
    let mut pure_names: HashSet<String> = HashSet::new();
    loop {
        let mut changed = false;
        visit_lambdas(stmts, &mut |lambda, name| {
            if try_mark_pure(lambda, &pure_names) {
                changed = true;
                if let Some(name) = name {
                    pure_names.insert(name.to_string());
                }
            }
        });
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::{AssignTarget, BinOp, Ident};

    fn pure_lambda_stmt(name: &str, calls_println: bool) -> Stmt {
        let body = if calls_println {
            Expr::Call {
                callee: Box::new(Expr::Ident(Ident::simple("println"))),
                args: vec![Expr::Ident(Ident::simple("x"))],
                indirect: false,
            }
        } else {
            Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Ident(Ident::simple("x"))),
                rhs: Box::new(Expr::Number(1.0)),
            }
        };
        Stmt::Assign {
            target: AssignTarget::Name(name.to_string()),
            mutable: false,
            is_define: true,
            compound_op: None,
            value: Expr::Lambda(Lambda {
                params: vec!["x".to_string()],
                param_types: None,
                variadic: None,
                return_type: None,
                body: c67c_ast::LambdaBody::Expr(Box::new(body)),
                is_pure: false,
                captured_vars: Vec::new(),
                is_nested_lambda: false,
            }),
        }
    }

    #[test]
    fn numeric_only_lambda_is_pure() {
        let mut stmts = vec![pure_lambda_stmt("inc", false)];
        analyze_purity(&mut stmts);
        match &stmts[0] {
            Stmt::Assign {
                value: Expr::Lambda(lambda),
                ..
            } => assert!(lambda.is_pure),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn println_caller_is_impure() {
        let mut stmts = vec![pure_lambda_stmt("logger", true)];
        analyze_purity(&mut stmts);
        match &stmts[0] {
            Stmt::Assign {
                value: Expr::Lambda(lambda),
                ..
            } => assert!(!lambda.is_pure),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn caller_of_pure_function_is_pure() {
        let mut stmts = vec![
            pure_lambda_stmt("inc", false),
            Stmt::Assign {
                target: AssignTarget::Name("twice".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: c67c_ast::LambdaBody::Expr(Box::new(Expr::Call {
                        callee: Box::new(Expr::Ident(Ident::simple("inc"))),
                        args: vec![Expr::Ident(Ident::simple("x"))],
                        indirect: false,
                    })),
                    is_pure: false,
                    captured_vars: Vec::new(),
                    is_nested_lambda: false,
                }),
            },
        ];
        analyze_purity(&mut stmts);
        match &stmts[1] {
            Stmt::Assign {
                value: Expr::Lambda(lambda),
                ..
            } => assert!(lambda.is_pure),
            other => panic!("unexpected {other:?}"),
        }
    }
}
