//! Constant propagation — optimizer pass 2: a scope-sensitive name→literal table, substituting
//! identifiers bound to a literal and re-running fold + strength-reduction locally afterward.
//! Loops and lambdas get a fresh nested scope that can read outer bindings but never leaks its
//! own back out; a loop's own iterator binding is never tracked.

use std::collections::HashMap;

use c67c_ast::{AssignTarget, Expr, Ident, Lambda, LambdaBody, Loop, Program, Stmt};

use crate::fold::fold_expr;
use crate::strength::reduce_expr;
use crate::walk::map_children;

#[derive(Default, Clone)]
struct Scope {
    bindings: HashMap<String, f64>,
}

struct Env {
    scopes: Vec<Scope>,
}

impl Env {
    fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    fn child(&self) -> Env {
        let mut scopes = self.scopes.clone();
        scopes.push(Scope::default());
        Env { scopes }
    }

    fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<f64> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.bindings.get(name).copied())
    }

    fn bind(&mut self, name: &str, value: f64) {
        self.scopes
            .last_mut()
            .expect("at least one scope always present")
            .bindings
            .insert(name.to_string(), value);
    }

    fn evict(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.bindings.remove(name).is_some() {
                break;
            }
        }
    }
}

fn simplify(expr: Expr) -> Expr {
    reduce_expr(fold_expr(expr))
}

fn substitute(expr: Expr, env: &Env) -> Expr {
    match expr {
        Expr::Lambda(lambda) => Expr::Lambda(substitute_lambda(lambda, env)),
        Expr::MultiLambda(lambdas) => Expr::MultiLambda(
            lambdas
                .into_iter()
                .map(|l| substitute_lambda(l, env))
                .collect(),
        ),
        Expr::PatternLambda(arms) => {
            let nested = env.child();
            Expr::PatternLambda(
                arms.into_iter()
                    .map(|arm| c67c_ast::MatchArm {
                        pattern: arm.pattern,
                        guard: arm.guard.map(|g| simplify(substitute(g, &nested))),
                        body: simplify(substitute(arm.body, &nested)),
                    })
                    .collect(),
            )
        }
        other => {
            let mapped = map_children(other, &mut |e| substitute(e, env));
            match &mapped {
                Expr::Ident(Ident {
                    namespace: None,
                    name,
                }) => match env.lookup(name) {
                    Some(value) => Expr::Number(value),
                    None => mapped,
                },
                _ => mapped,
            }
        }
    }
}

fn substitute_lambda(lambda: Lambda, env: &Env) -> Lambda {
    let nested = env.child();
    let body = match lambda.body {
        LambdaBody::Expr(e) => LambdaBody::Expr(Box::new(simplify(substitute(*e, &nested)))),
        LambdaBody::Block(stmts) => {
            let mut nested = nested;
            LambdaBody::Block(propagate_stmts(stmts, &mut nested))
        }
    };
    Lambda { body, ..lambda }
}

fn propagate_stmts(stmts: Vec<Stmt>, env: &mut Env) -> Vec<Stmt> {
    stmts
        .into_iter()
        .map(|s| propagate_stmt(s, env))
        .collect()
}

fn propagate_target(target: AssignTarget, env: &Env) -> AssignTarget {
    match target {
        AssignTarget::Name(n) => AssignTarget::Name(n),
        AssignTarget::Index { base, index } => AssignTarget::Index {
            base: Box::new(simplify(substitute(*base, env))),
            index: Box::new(simplify(substitute(*index, env))),
        },
        AssignTarget::Field { base, name } => AssignTarget::Field {
            base: Box::new(simplify(substitute(*base, env))),
            name,
        },
    }
}

fn propagate_stmt(stmt: Stmt, env: &mut Env) -> Stmt {
    match stmt {
        Stmt::Assign {
            target,
            mutable,
            is_define,
            compound_op,
            value,
        } => {
            let value = simplify(substitute(value, env));
            let target = propagate_target(target, env);
            if let AssignTarget::Name(name) = &target {
                if mutable || compound_op.is_some() {
                    env.evict(name);
                } else if let Expr::Number(n) = &value {
                    env.bind(name, *n);
                } else {
                    env.evict(name);
                }
            }
            Stmt::Assign {
                target,
                mutable,
                is_define,
                compound_op,
                value,
            }
        }
        Stmt::ExprStmt(e) => Stmt::ExprStmt(simplify(substitute(e, env))),
        Stmt::Loop(l) => {
            let iterable = simplify(substitute(*l.iterable, env));
            let mut nested = env.child();
            nested.evict(&l.var);
            let body = propagate_stmts(l.body, &mut nested);
            Stmt::Loop(Loop {
                iterable: Box::new(iterable),
                body,
                ..l
            })
        }
        Stmt::While { label, cond, body } => {
            let cond = simplify(substitute(cond, env));
            let mut nested = env.child();
            let body = propagate_stmts(body, &mut nested);
            Stmt::While { label, cond, body }
        }
        Stmt::Arena(body) => {
            let mut nested = env.child();
            Stmt::Arena(propagate_stmts(body, &mut nested))
        }
        Stmt::Defer(e) => Stmt::Defer(simplify(substitute(e, env))),
        Stmt::Spawn(e) => Stmt::Spawn(simplify(substitute(e, env))),
        Stmt::RegisterAssign { register, value } => Stmt::RegisterAssign {
            register,
            value: simplify(substitute(value, env)),
        },
        Stmt::MemoryStore {
            address,
            value,
            width,
        } => Stmt::MemoryStore {
            address: simplify(substitute(address, env)),
            value: simplify(substitute(value, env)),
            width,
        },
        Stmt::Syscall { number, args } => Stmt::Syscall {
            number: simplify(substitute(number, env)),
            args: args
                .into_iter()
                .map(|a| simplify(substitute(a, env)))
                .collect(),
        },
        other @ (Stmt::Jump { .. } | Stmt::Import { .. }) => other,
    }
}

/// Runs propagation over an entire program from an empty top-level scope.
pub fn propagate_program(mut program: Program) -> Program {
    let mut env = Env::new();
    program.statements = propagate_stmts(program.statements, &mut env);
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::BinOp;

    #[test]
    fn propagates_literal_binding_into_later_use() {
        let stmts = vec![
            Stmt::Assign {
                target: AssignTarget::Name("x".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Number(5.0),
            },
            Stmt::Assign {
                target: AssignTarget::Name("y".to_string()),
                mutable: false,
                is_define: true,
                compound_op: None,
                value: Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::Ident(Ident::simple("x"))),
                    rhs: Box::new(Expr::Number(10.0)),
                },
            },
        ];
        let program = propagate_program(Program {
            statements: stmts,
            ..Default::default()
        });
        match &program.statements[1] {
            Stmt::Assign { value, .. } => assert_eq!(*value, Expr::Number(15.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn loop_iterator_is_never_propagated() {
        let loop_stmt = Stmt::Loop(Loop {
            label: 0,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(10.0)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body: vec![Stmt::ExprStmt(Expr::Ident(Ident::simple("i")))],
            num_threads: 0,
            vectorized: false,
            vector_width: 0,
        });
        let program = propagate_program(Program {
            statements: vec![loop_stmt],
            ..Default::default()
        });
        match &program.statements[0] {
            Stmt::Loop(l) => match &l.body[0] {
                Stmt::ExprStmt(e) => assert_eq!(*e, Expr::Ident(Ident::simple("i"))),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }
}
