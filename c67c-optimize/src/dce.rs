//! Dead code elimination — optimizer pass 3, disabled by default
//! ([`crate::OptimizeOptions::dead_code_elimination`]).
//!
//! A variable is live if it's referenced by a still-live statement, or if its own defining
//! expression has an observable side effect. A call is conservatively treated as side-effecting
//! since this pass has no interprocedural purity information at the point it runs (purity
//! analysis runs afterward, pass 4).

use std::collections::HashSet;

use c67c_ast::{AssignTarget, Expr, Stmt};

use crate::walk::for_each_child;

fn expr_has_call(expr: &Expr) -> bool {
    if matches!(expr, Expr::Call { .. }) {
        return true;
    }
    let mut found = false;
    for_each_child(expr, |child| found |= expr_has_call(child));
    found
}

fn collect_idents(expr: &Expr, out: &mut HashSet<String>) {
    if let Expr::Ident(ident) = expr {
        if ident.namespace.is_none() {
            out.insert(ident.name.clone());
        }
    }
    for_each_child(expr, |child| collect_idents(child, out));
}

/// Eliminates statements in `stmts` whose only effect is binding a name that nothing downstream
/// (in this same block) reads, working backward from the end. Side-effecting statements (calls,
/// mutation of an indexed/field target, anything other than a simple `:=`/`=` to a name) are
/// always kept. Nested bodies are recursed into independently.
pub fn eliminate_dead_code(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut live: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(stmts.len());
    for stmt in stmts.into_iter().rev() {
        let stmt = recurse_nested(stmt);
        let keep = match &stmt {
            Stmt::Assign {
                target: AssignTarget::Name(name),
                mutable,
                value,
                ..
            } => live.contains(name) || *mutable || expr_has_call(value),
            _ => true,
        };
        if keep {
            match &stmt {
                Stmt::Assign {
                    target: AssignTarget::Name(name),
                    ..
                } => {
                    live.remove(name);
                }
                _ => {}
            }
            let mut refs = HashSet::new();
            for e in crate::walk::stmt_exprs(&stmt) {
                collect_idents(e, &mut refs);
            }
            live.extend(refs);
            kept.push(stmt);
        }
    }
    kept.reverse();
    kept
}

fn recurse_nested(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Loop(mut l) => {
            l.body = eliminate_dead_code(l.body);
            Stmt::Loop(l)
        }
        Stmt::While { label, cond, body } => Stmt::While {
            label,
            cond,
            body: eliminate_dead_code(body),
        },
        Stmt::Arena(body) => Stmt::Arena(eliminate_dead_code(body)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::{BinOp, Ident};

    fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign {
            target: AssignTarget::Name(name.to_string()),
            mutable: false,
            is_define: true,
            compound_op: None,
            value,
        }
    }

    #[test]
    fn unused_binding_is_removed() {
        let stmts = vec![
            assign("unused", Expr::Number(1.0)),
            assign("result", Expr::Number(2.0)),
            Stmt::ExprStmt(Expr::Ident(Ident::simple("result"))),
        ];
        let out = eliminate_dead_code(stmts);
        assert_eq!(out.len(), 2);
        match &out[0] {
            Stmt::Assign { target, .. } => {
                assert_eq!(*target, AssignTarget::Name("result".to_string()))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn call_expression_is_kept_even_if_unused() {
        let stmts = vec![assign(
            "ignored",
            Expr::Call {
                callee: Box::new(Expr::Ident(Ident::simple("log"))),
                args: vec![],
                indirect: false,
            },
        )];
        let out = eliminate_dead_code(stmts);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn transitively_live_chain_is_kept() {
        let stmts = vec![
            assign("a", Expr::Number(1.0)),
            assign(
                "b",
                Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::Ident(Ident::simple("a"))),
                    rhs: Box::new(Expr::Number(1.0)),
                },
            ),
            Stmt::ExprStmt(Expr::Ident(Ident::simple("b"))),
        ];
        let out = eliminate_dead_code(stmts);
        assert_eq!(out.len(), 3);
    }
}
