//! Function inlining — optimizer pass 5, plus the post-inline fold (pass 6).
//!
//! Candidates are immutably-bound lambdas whose body is "simple": not a block, not a match, not
//! a parallel expression; list literals of length ≤5; no nested complex calls (a call whose own
//! argument is itself a call). Every call site by name is substituted with a deep copy of the
//! body, arguments bound to parameters; substitution never renames outer parameters of nested
//! lambdas — it replaces only free identifiers.

use std::collections::HashMap;

use c67c_ast::{AssignTarget, Expr, Lambda, LambdaBody, Program, Stmt};

use crate::error::OptimizeError;
use crate::fold::fold_stmts;
use crate::options::OptimizeOptions;
use crate::walk::map_children;

struct Candidate {
    params: Vec<String>,
    body: Expr,
}

fn expr_is_simple(expr: &Expr, depth: u32, list_threshold: usize) -> bool {
    match expr {
        Expr::Match { .. } | Expr::Parallel(_) => false,
        Expr::ListLit(items) => {
            items.len() <= list_threshold
                && items.iter().all(|i| expr_is_simple(i, depth, list_threshold))
        }
        Expr::Call { args, .. } => {
            if depth >= 1 {
                return false;
            }
            args.iter().all(|a| expr_is_simple(a, depth + 1, list_threshold))
        }
        other => {
            let mut ok = true;
            crate::walk::for_each_child(other, |child| {
                ok &= expr_is_simple(child, depth, list_threshold)
            });
            ok
        }
    }
}

fn is_candidate(lambda: &Lambda, list_threshold: usize) -> Option<Candidate> {
    if lambda.variadic.is_some() {
        return None;
    }
    match &lambda.body {
        LambdaBody::Expr(body) if expr_is_simple(body, 0, list_threshold) => Some(Candidate {
            params: lambda.params.clone(),
            body: (**body).clone(),
        }),
        _ => None,
    }
}

/// Collects every top-level immutable `name := |params| simple_body` binding into a candidate
/// table. Mutable bindings and reassignments are never candidates: the call site can't be trusted
/// to still resolve to the original body.
fn collect_candidates(stmts: &[Stmt], list_threshold: usize) -> HashMap<String, Candidate> {
    let mut table = HashMap::new();
    for stmt in stmts {
        if let Stmt::Assign {
            target: AssignTarget::Name(name),
            mutable: false,
            value: Expr::Lambda(lambda),
            ..
        } = stmt
        {
            if let Some(candidate) = is_candidate(lambda, list_threshold) {
                table.insert(name.clone(), candidate);
            }
        }
    }
    table
}

/// Deep-copies `body` substituting each parameter with its bound argument. Nested lambda
/// parameters shadow the outer substitution and are left untouched within their own scope.
fn substitute_args(body: Expr, bindings: &HashMap<String, Expr>) -> Expr {
    match body {
        Expr::Ident(ref ident) if ident.namespace.is_none() => {
            match bindings.get(&ident.name) {
                Some(value) => value.clone(),
                None => body,
            }
        }
        Expr::Lambda(lambda) => Expr::Lambda(substitute_args_lambda(lambda, bindings)),
        Expr::MultiLambda(lambdas) => Expr::MultiLambda(
            lambdas
                .into_iter()
                .map(|l| substitute_args_lambda(l, bindings))
                .collect(),
        ),
        other => map_children(other, &mut |e| substitute_args(e, bindings)),
    }
}

fn substitute_args_lambda(lambda: Lambda, bindings: &HashMap<String, Expr>) -> Lambda {
    let shadowed: HashMap<String, Expr> = bindings
        .iter()
        .filter(|(name, _)| !lambda.params.contains(name))
        .map(|(n, v)| (n.clone(), v.clone()))
        .collect();
    let body = match lambda.body {
        LambdaBody::Expr(e) => LambdaBody::Expr(Box::new(substitute_args(*e, &shadowed))),
        LambdaBody::Block(stmts) => LambdaBody::Block(
            stmts
                .into_iter()
                .map(|s| inline_stmt(s, &HashMap::new(), &shadowed))
                .collect(),
        ),
    };
    Lambda { body, ..lambda }
}

fn try_inline_call(expr: Expr, candidates: &HashMap<String, Candidate>) -> Expr {
    match &expr {
        Expr::Call {
            callee,
            args,
            indirect: false,
        } => {
            let name = match callee.as_ref() {
                Expr::Ident(ident) if ident.namespace.is_none() => ident.name.clone(),
                _ => return expr,
            };
            let Some(candidate) = candidates.get(&name) else {
                return expr;
            };
            if candidate.params.len() != args.len() {
                return expr;
            }
            let bindings: HashMap<String, Expr> = candidate
                .params
                .iter()
                .cloned()
                .zip(args.iter().cloned())
                .collect();
            substitute_args(candidate.body.clone(), &bindings)
        }
        _ => expr,
    }
}

fn inline_expr(expr: Expr, candidates: &HashMap<String, Candidate>) -> Expr {
    let rewritten = map_children(expr, &mut |e| inline_expr(e, candidates));
    try_inline_call(rewritten, candidates)
}

fn inline_stmt(
    stmt: Stmt,
    candidates: &HashMap<String, Candidate>,
    extra: &HashMap<String, Expr>,
) -> Stmt {
    let substituted = if extra.is_empty() {
        stmt
    } else {
        crate::walk::map_stmts(vec![stmt], &mut |e| substitute_args(e, extra))
            .into_iter()
            .next()
            .expect("single-element round trip")
    };
    crate::walk::map_stmts(vec![substituted], &mut |e| inline_expr(e, candidates))
        .into_iter()
        .next()
        .expect("single-element round trip")
}

fn called_candidate_names(expr: &Expr, candidates: &HashMap<String, Candidate>, out: &mut Vec<String>) {
    if let Expr::Call { callee, .. } = expr {
        if let Expr::Ident(ident) = callee.as_ref() {
            if candidates.contains_key(&ident.name) {
                out.push(ident.name.clone());
            }
        }
    }
    crate::walk::for_each_child(expr, |child| called_candidate_names(child, candidates, out));
}

/// Candidates only ever call other candidates through their own (already-simple) body, so the
/// call graph among them is small; a direct cycle (including a self-call) would make substitution
/// embed a call that itself still needs inlining forever if this ran to a fixed point, so it's
/// reported rather than looped.
fn find_cycle(candidates: &HashMap<String, Candidate>) -> Option<Vec<String>> {
    fn visit(
        name: &str,
        candidates: &HashMap<String, Candidate>,
        stack: &mut Vec<String>,
        done: &mut HashMap<String, bool>,
    ) -> Option<Vec<String>> {
        if let Some(&finished) = done.get(name) {
            if !finished {
                let start = stack.iter().position(|n| n == name).unwrap_or(0);
                return Some(stack[start..].to_vec());
            }
            return None;
        }
        let Some(candidate) = candidates.get(name) else {
            return None;
        };
        stack.push(name.to_string());
        done.insert(name.to_string(), false);
        let mut callees = Vec::new();
        called_candidate_names(&candidate.body, candidates, &mut callees);
        for callee in callees {
            if let Some(cycle) = visit(&callee, candidates, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.insert(name.to_string(), true);
        None
    }

    let mut done = HashMap::new();
    for name in candidates.keys() {
        if !done.contains_key(name) {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(name, candidates, &mut stack, &mut done) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Runs inlining (pass 5) then the post-inline fold (pass 6) over `program`.
pub fn inline_program(
    mut program: Program,
    options: &OptimizeOptions,
) -> Result<Program, OptimizeError> {
    let candidates = collect_candidates(&program.statements, options.inline_list_length_threshold);
    if let Some(cycle) = find_cycle(&candidates) {
        return Err(OptimizeError::InlineCycle(cycle));
    }
    program.statements = program
        .statements
        .into_iter()
        .map(|s| inline_stmt(s, &candidates, &HashMap::new()))
        .collect();
    program.statements = fold_stmts(program.statements);
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::{BinOp, Ident};

    #[test]
    fn inlines_simple_call() {
        let stmts = vec![
            Stmt::Assign {
                target: AssignTarget::Name("double".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: LambdaBody::Expr(Box::new(Expr::Binary {
                        op: BinOp::Mul,
                        lhs: Box::new(Expr::Ident(Ident::simple("x"))),
                        rhs: Box::new(Expr::Number(2.0)),
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
        let program = inline_program(
            Program {
                statements: stmts,
                ..Default::default()
            },
            &OptimizeOptions::default(),
        )
        .unwrap();
        match &program.statements[1] {
            Stmt::Assign { value, .. } => assert_eq!(*value, Expr::Number(42.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn does_not_inline_mutable_binding() {
        let stmts = vec![
            Stmt::Assign {
                target: AssignTarget::Name("f".to_string()),
                mutable: true,
                is_define: true,
                compound_op: None,
                value: Expr::Lambda(Lambda {
                    params: vec!["x".to_string()],
                    param_types: None,
                    variadic: None,
                    return_type: None,
                    body: LambdaBody::Expr(Box::new(Expr::Ident(Ident::simple("x")))),
                    is_pure: false,
                    captured_vars: Vec::new(),
                    is_nested_lambda: false,
                }),
            },
            Stmt::ExprStmt(Expr::Call {
                callee: Box::new(Expr::Ident(Ident::simple("f"))),
                args: vec![Expr::Number(1.0)],
                indirect: false,
            }),
        ];
        let program = inline_program(
            Program {
                statements: stmts,
                ..Default::default()
            },
            &OptimizeOptions::default(),
        )
        .unwrap();
        match &program.statements[1] {
            Stmt::ExprStmt(Expr::Call { .. }) => {}
            other => panic!("expected call left intact, got {other:?}"),
        }
    }
}
