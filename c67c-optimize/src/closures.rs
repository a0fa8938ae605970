//! Closure capture analysis. Runs before purity analysis in the pipeline so purity can check
//! `captured_vars.is_empty()`.

use std::collections::HashSet;

use c67c_ast::{AssignTarget, Expr, Lambda, LambdaBody, Pattern, Stmt};

use crate::walk::{for_each_child, for_each_child_mut, stmt_exprs, stmt_nested_bodies};

fn bind_pattern(pattern: &Pattern, bound: &mut HashSet<String>) {
    match pattern {
        Pattern::Binding(name) => {
            bound.insert(name.clone());
        }
        Pattern::Struct { fields, .. } => {
            for (_, sub) in fields {
                bind_pattern(sub, bound);
            }
        }
        Pattern::Wildcard | Pattern::Literal(_) => {}
    }
}

fn free_vars_in_expr(expr: &Expr, bound: &HashSet<String>, out: &mut HashSet<String>) {
    match expr {
        Expr::Ident(ident) if ident.namespace.is_none() => {
            if !bound.contains(&ident.name) {
                out.insert(ident.name.clone());
            }
        }
        Expr::Lambda(lambda) => free_vars_in_lambda(lambda, bound, out),
        Expr::MultiLambda(lambdas) => {
            for l in lambdas {
                free_vars_in_lambda(l, bound, out);
            }
        }
        Expr::PatternLambda(arms) => {
            for arm in arms {
                let mut inner = bound.clone();
                bind_pattern(&arm.pattern, &mut inner);
                if let Some(g) = &arm.guard {
                    free_vars_in_expr(g, &inner, out);
                }
                free_vars_in_expr(&arm.body, &inner, out);
            }
        }
        _ => for_each_child(expr, |child| free_vars_in_expr(child, bound, out)),
    }
}

fn free_vars_in_stmt(stmt: &Stmt, bound: &HashSet<String>, out: &mut HashSet<String>) {
    for e in stmt_exprs(stmt) {
        free_vars_in_expr(e, bound, out);
    }
    let mut inner = bound.clone();
    if let Stmt::Loop(l) = stmt {
        inner.insert(l.var.clone());
    }
    for body in stmt_nested_bodies(stmt) {
        scan_block(body, &inner, out);
    }
}

/// Scans a statement block left to right, accumulating each `:=` binding into scope for the
/// statements that follow it (mirroring ordinary sequential evaluation), and returns the free
/// variables found.
fn scan_block(stmts: &[Stmt], outer_bound: &HashSet<String>, out: &mut HashSet<String>) {
    let mut scope = outer_bound.clone();
    for stmt in stmts {
        free_vars_in_stmt(stmt, &scope, out);
        if let Stmt::Assign {
            target: AssignTarget::Name(name),
            is_define: true,
            ..
        } = stmt
        {
            scope.insert(name.clone());
        }
    }
}

fn free_vars_in_lambda(lambda: &Lambda, outer_bound: &HashSet<String>, out: &mut HashSet<String>) {
    let mut bound = outer_bound.clone();
    for p in &lambda.params {
        bound.insert(p.clone());
    }
    if let Some(v) = &lambda.variadic {
        bound.insert(v.clone());
    }
    match &lambda.body {
        LambdaBody::Expr(e) => free_vars_in_expr(e, &bound, out),
        LambdaBody::Block(stmts) => scan_block(stmts, &bound, out),
    }
}

fn analyze_closures_in_lambda(lambda: &mut Lambda, globals: &HashSet<String>) {
    // Nested lambdas are analyzed first so this lambda's own free-variable scan sees their
    // already-filled captures folded in through the recursive `Expr::Lambda` case above.
    match &mut lambda.body {
        LambdaBody::Expr(e) => analyze_closures_in_expr(e, globals),
        LambdaBody::Block(stmts) => {
            for s in stmts.iter_mut() {
                analyze_closures_in_stmt(s, globals);
            }
        }
    }
    let empty = HashSet::new();
    let mut free = HashSet::new();
    free_vars_in_lambda(lambda, &empty, &mut free);
    let mut captured: Vec<String> = free.difference(globals).cloned().collect();
    captured.sort();
    lambda.captured_vars = captured;
}

fn analyze_closures_in_expr(expr: &mut Expr, globals: &HashSet<String>) {
    match expr {
        Expr::Lambda(lambda) => analyze_closures_in_lambda(lambda, globals),
        Expr::MultiLambda(lambdas) => {
            for l in lambdas {
                analyze_closures_in_lambda(l, globals);
            }
        }
        Expr::PatternLambda(arms) => {
            for arm in arms {
                if let Some(g) = &mut arm.guard {
                    analyze_closures_in_expr(g, globals);
                }
                analyze_closures_in_expr(&mut arm.body, globals);
            }
        }
        _ => for_each_child_mut(expr, |child| analyze_closures_in_expr(child, globals)),
    }
}

fn analyze_closures_in_stmt(stmt: &mut Stmt, globals: &HashSet<String>) {
    match stmt {
        Stmt::Assign { value, target, .. } => {
            analyze_closures_in_expr(value, globals);
            match target {
                AssignTarget::Index { base, index } => {
                    analyze_closures_in_expr(base, globals);
                    analyze_closures_in_expr(index, globals);
                }
                AssignTarget::Field { base, .. } => analyze_closures_in_expr(base, globals),
                AssignTarget::Name(_) => {}
            }
        }
        Stmt::ExprStmt(e) | Stmt::Defer(e) | Stmt::Spawn(e) => {
            analyze_closures_in_expr(e, globals)
        }
        Stmt::Loop(l) => {
            analyze_closures_in_expr(&mut l.iterable, globals);
            for s in &mut l.body {
                analyze_closures_in_stmt(s, globals);
            }
        }
        Stmt::While { cond, body, .. } => {
            analyze_closures_in_expr(cond, globals);
            for s in body {
                analyze_closures_in_stmt(s, globals);
            }
        }
        Stmt::Arena(body) => {
            for s in body {
                analyze_closures_in_stmt(s, globals);
            }
        }
        Stmt::RegisterAssign { value, .. } => analyze_closures_in_expr(value, globals),
        Stmt::MemoryStore { address, value, .. } => {
            analyze_closures_in_expr(address, globals);
            analyze_closures_in_expr(value, globals);
        }
        Stmt::Syscall { number, args } => {
            analyze_closures_in_expr(number, globals);
            for a in args {
                analyze_closures_in_expr(a, globals);
            }
        }
        Stmt::Jump { .. } | Stmt::Import { .. } => {}
    }
}

/// Fills `captured_vars` for every lambda reachable from `stmts`. `globals` are names the
/// enclosing program binds at top level (and imports) — always directly addressable, so never
/// counted as a capture.
pub fn analyze_closures(stmts: &mut Vec<Stmt>, globals: &HashSet<String>) {
    for stmt in stmts.iter_mut() {
        analyze_closures_in_stmt(stmt, globals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::Ident;

    #[test]
    fn captures_outer_free_variable() {
        let mut stmts = vec![
            Stmt::Assign {
                target: AssignTarget::Name("n".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Number(5.0),
            },
            Stmt::Assign {
                target: AssignTarget::Name("adder".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: LambdaBody::Expr(Box::new(Expr::Binary {
                        op: c67c_ast::BinOp::Add,
                        lhs: Box::new(Expr::Ident(Ident::simple("x"))),
                        rhs: Box::new(Expr::Ident(Ident::simple("n"))),
                    })),
                    is_pure: false,
                    captured_vars: Vec::new(),
                    is_nested_lambda: false,
                }),
            },
        ];
        let globals = HashSet::new();
        analyze_closures(&mut stmts, &globals);
        match &stmts[1] {
            Stmt::Assign {
                value: Expr::Lambda(lambda),
                ..
            } => assert_eq!(lambda.captured_vars, vec!["n".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_names_are_never_captures() {
        let mut stmts = vec![Stmt::Assign {
            target: AssignTarget::Name("f".to_string()),
            mutable: false,
            is_define: true,
            compound_op: None,
            value: Expr::Lambda(Lambda {
                params: vec![],
                param_types: None,
                variadic: None,
                return_type: None,
                body: LambdaBody::Expr(Box::new(Expr::Ident(Ident::simple("global_const")))),
                is_pure: false,
                captured_vars: Vec::new(),
                is_nested_lambda: false,
            }),
        }];
        let mut globals = HashSet::new();
        globals.insert("global_const".to_string());
        analyze_closures(&mut stmts, &globals);
        match &stmts[0] {
            Stmt::Assign {
                value: Expr::Lambda(lambda),
                ..
            } => assert!(lambda.captured_vars.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
