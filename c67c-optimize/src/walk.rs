//! Generic tree-rewriting and tree-visiting helpers shared by every pass in this crate, so each
//! pass writes its own special cases once instead of re-deriving the same exhaustive `Expr`/
//! `Stmt` match.

use c67c_ast::{AssignTarget, ArchBody, Expr, Lambda, LambdaBody, Loop, MatchArm, Stmt, UnsafeBlock};

/// Rewrites every direct and indirect child of `expr` with `f` (post-order: children are mapped
/// before `f` sees the reconstructed node isn't itself re-visited — callers that want full
/// bottom-up folding call `f` recursively from within `f` itself, as `fold::fold_expr` does).
pub fn map_children(expr: Expr, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
    match expr {
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Address(_)
        | Expr::Ident(_)
        | Expr::LoopState(_)
        | Expr::RegisterLoad(_) => expr,
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op,
            lhs: Box::new(f(*lhs)),
            rhs: Box::new(f(*rhs)),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(f(*operand)),
        },
        Expr::Postfix { op, operand } => Expr::Postfix {
            op,
            operand: Box::new(f(*operand)),
        },
        Expr::Len(inner) => Expr::Len(Box::new(f(*inner))),
        Expr::Index { base, index } => Expr::Index {
            base: Box::new(f(*base)),
            index: Box::new(f(*index)),
        },
        Expr::Slice { base, start, end } => Expr::Slice {
            base: Box::new(f(*base)),
            start: start.map(|s| Box::new(f(*s))),
            end: end.map(|e| Box::new(f(*e))),
        },
        Expr::Field { base, name } => Expr::Field {
            base: Box::new(f(*base)),
            name,
        },
        Expr::Call {
            callee,
            args,
            indirect,
        } => Expr::Call {
            callee: Box::new(f(*callee)),
            args: args.into_iter().map(&mut *f).collect(),
            indirect,
        },
        Expr::Range {
            start,
            end,
            inclusive,
        } => Expr::Range {
            start: Box::new(f(*start)),
            end: Box::new(f(*end)),
            inclusive,
        },
        Expr::ListLit(items) => Expr::ListLit(items.into_iter().map(&mut *f).collect()),
        Expr::VectorLit(items) => Expr::VectorLit(items.into_iter().map(&mut *f).collect()),
        Expr::Parallel(items) => Expr::Parallel(items.into_iter().map(&mut *f).collect()),
        Expr::MapLit(pairs) => {
            Expr::MapLit(pairs.into_iter().map(|(k, v)| (f(k), f(v))).collect())
        }
        Expr::StructLit { name, fields } => Expr::StructLit {
            name,
            fields: fields.into_iter().map(|(n, v)| (n, f(v))).collect(),
        },
        Expr::Lambda(lambda) => Expr::Lambda(map_lambda(lambda, f)),
        Expr::MultiLambda(lambdas) => {
            Expr::MultiLambda(lambdas.into_iter().map(|l| map_lambda(l, f)).collect())
        }
        Expr::PatternLambda(arms) => Expr::PatternLambda(map_arms(arms, f)),
        Expr::Pipe(a, b) => Expr::Pipe(Box::new(f(*a)), Box::new(f(*b))),
        Expr::Compose(a, b) => Expr::Compose(Box::new(f(*a)), Box::new(f(*b))),
        Expr::Background(inner) => Expr::Background(Box::new(f(*inner))),
        Expr::Send { channel, value } => Expr::Send {
            channel: Box::new(f(*channel)),
            value: Box::new(f(*value)),
        },
        Expr::Receive(inner) => Expr::Receive(Box::new(f(*inner))),
        Expr::Match {
            scrutinee,
            arms,
            default,
        } => Expr::Match {
            scrutinee: Box::new(f(*scrutinee)),
            arms: map_arms(arms, f),
            default: default.map(|d| Box::new(f(*d))),
        },
        Expr::Cast { expr, kind } => Expr::Cast {
            expr: Box::new(f(*expr)),
            kind,
        },
        Expr::Fma {
            a,
            b,
            c,
            is_sub,
            is_neg_mul,
        } => Expr::Fma {
            a: Box::new(f(*a)),
            b: Box::new(f(*b)),
            c: Box::new(f(*c)),
            is_sub,
            is_neg_mul,
        },
        Expr::Unsafe(block) => Expr::Unsafe(UnsafeBlock {
            bodies: block
                .bodies
                .into_iter()
                .map(|b| ArchBody {
                    arch: b.arch,
                    body: map_stmts(b.body, f),
                })
                .collect(),
        }),
        Expr::MemoryLoad { address, width } => Expr::MemoryLoad {
            address: Box::new(f(*address)),
            width,
        },
        Expr::Arena(inner) => Expr::Arena(Box::new(f(*inner))),
    }
}

fn map_lambda(lambda: Lambda, f: &mut impl FnMut(Expr) -> Expr) -> Lambda {
    let body = match lambda.body {
        LambdaBody::Expr(e) => LambdaBody::Expr(Box::new(f(*e))),
        LambdaBody::Block(stmts) => LambdaBody::Block(map_stmts(stmts, f)),
    };
    Lambda { body, ..lambda }
}

fn map_arms(arms: Vec<MatchArm>, f: &mut impl FnMut(Expr) -> Expr) -> Vec<MatchArm> {
    arms.into_iter()
        .map(|arm| MatchArm {
            pattern: arm.pattern,
            guard: arm.guard.map(&mut *f),
            body: f(arm.body),
        })
        .collect()
}

/// Rewrites every expression reachable from `stmts` with `f`; statement shape and nested bodies
/// are preserved, only the `Expr` leaves/subtrees are replaced.
pub fn map_stmts(stmts: Vec<Stmt>, f: &mut impl FnMut(Expr) -> Expr) -> Vec<Stmt> {
    stmts.into_iter().map(|s| map_stmt(s, f)).collect()
}

fn map_stmt(stmt: Stmt, f: &mut impl FnMut(Expr) -> Expr) -> Stmt {
    match stmt {
        Stmt::Assign {
            target,
            mutable,
            is_define,
            compound_op,
            value,
        } => Stmt::Assign {
            target: map_target(target, f),
            mutable,
            is_define,
            compound_op,
            value: f(value),
        },
        Stmt::ExprStmt(e) => Stmt::ExprStmt(f(e)),
        Stmt::Loop(l) => Stmt::Loop(Loop {
            iterable: Box::new(f(*l.iterable)),
            body: map_stmts(l.body, f),
            ..l
        }),
        Stmt::While { label, cond, body } => Stmt::While {
            label,
            cond: f(cond),
            body: map_stmts(body, f),
        },
        Stmt::Jump { kind, label } => Stmt::Jump { kind, label },
        Stmt::Defer(e) => Stmt::Defer(f(e)),
        Stmt::Spawn(e) => Stmt::Spawn(f(e)),
        Stmt::Arena(body) => Stmt::Arena(map_stmts(body, f)),
        Stmt::RegisterAssign { register, value } => Stmt::RegisterAssign {
            register,
            value: f(value),
        },
        Stmt::MemoryStore {
            address,
            value,
            width,
        } => Stmt::MemoryStore {
            address: f(address),
            value: f(value),
            width,
        },
        Stmt::Syscall { number, args } => Stmt::Syscall {
            number: f(number),
            args: args.into_iter().map(&mut *f).collect(),
        },
        Stmt::Import { path, alias } => Stmt::Import { path, alias },
    }
}

fn map_target(target: AssignTarget, f: &mut impl FnMut(Expr) -> Expr) -> AssignTarget {
    match target {
        AssignTarget::Name(n) => AssignTarget::Name(n),
        AssignTarget::Index { base, index } => AssignTarget::Index {
            base: Box::new(f(*base)),
            index: Box::new(f(*index)),
        },
        AssignTarget::Field { base, name } => AssignTarget::Field {
            base: Box::new(f(*base)),
            name,
        },
    }
}

/// Calls `f` once for each direct child expression of `expr` (not recursive; compose with your
/// own recursion for a full-tree walk). Lambda bodies are treated as opaque — most analyses that
/// use this (call collection, free-variable scanning) special-case `Expr::Lambda` themselves
/// before falling back here.
pub fn for_each_child<'a>(expr: &'a Expr, mut f: impl FnMut(&'a Expr)) {
    match expr {
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Address(_)
        | Expr::Ident(_)
        | Expr::LoopState(_)
        | Expr::RegisterLoad(_)
        | Expr::Unsafe(_)
        | Expr::Lambda(_)
        | Expr::MultiLambda(_)
        | Expr::PatternLambda(_) => {}
        Expr::Binary { lhs, rhs, .. } => {
            f(lhs);
            f(rhs);
        }
        Expr::Unary { operand, .. } | Expr::Postfix { operand, .. } | Expr::Len(operand) => {
            f(operand)
        }
        Expr::Index { base, index } => {
            f(base);
            f(index);
        }
        Expr::Slice { base, start, end } => {
            f(base);
            if let Some(s) = start {
                f(s);
            }
            if let Some(e) = end {
                f(e);
            }
        }
        Expr::Field { base, .. } => f(base),
        Expr::Call { callee, args, .. } => {
            f(callee);
            for a in args {
                f(a);
            }
        }
        Expr::Range { start, end, .. } => {
            f(start);
            f(end);
        }
        Expr::ListLit(items) | Expr::VectorLit(items) | Expr::Parallel(items) => {
            for i in items {
                f(i);
            }
        }
        Expr::MapLit(pairs) => {
            for (k, v) in pairs {
                f(k);
                f(v);
            }
        }
        Expr::StructLit { fields, .. } => {
            for (_, v) in fields {
                f(v);
            }
        }
        Expr::Pipe(a, b) | Expr::Compose(a, b) => {
            f(a);
            f(b);
        }
        Expr::Background(inner) | Expr::Receive(inner) | Expr::Arena(inner) => f(inner),
        Expr::Send { channel, value } => {
            f(channel);
            f(value);
        }
        Expr::Match {
            scrutinee,
            arms,
            default,
        } => {
            f(scrutinee);
            for arm in arms {
                if let Some(g) = &arm.guard {
                    f(g);
                }
                f(&arm.body);
            }
            if let Some(d) = default {
                f(d);
            }
        }
        Expr::Cast { expr, .. } => f(expr),
        Expr::Fma { a, b, c, .. } => {
            f(a);
            f(b);
            f(c);
        }
        Expr::MemoryLoad { address, .. } => f(address),
    }
}

/// Visits every direct child expression of `expr` by mutable reference (not recursive). Like
/// [`for_each_child`], treats lambda bodies as opaque; callers that need to reach into them
/// special-case `Expr::Lambda`/`Expr::MultiLambda` before falling back to this.
pub fn for_each_child_mut(expr: &mut Expr, mut f: impl FnMut(&mut Expr)) {
    match expr {
        Expr::Number(_)
        | Expr::Str(_)
        | Expr::Address(_)
        | Expr::Ident(_)
        | Expr::LoopState(_)
        | Expr::RegisterLoad(_)
        | Expr::Unsafe(_)
        | Expr::Lambda(_)
        | Expr::MultiLambda(_)
        | Expr::PatternLambda(_) => {}
        Expr::Binary { lhs, rhs, .. } => {
            f(lhs);
            f(rhs);
        }
        Expr::Unary { operand, .. } | Expr::Postfix { operand, .. } | Expr::Len(operand) => {
            f(operand)
        }
        Expr::Index { base, index } => {
            f(base);
            f(index);
        }
        Expr::Slice { base, start, end } => {
            f(base);
            if let Some(s) = start {
                f(s);
            }
            if let Some(e) = end {
                f(e);
            }
        }
        Expr::Field { base, .. } => f(base),
        Expr::Call { callee, args, .. } => {
            f(callee);
            for a in args {
                f(a);
            }
        }
        Expr::Range { start, end, .. } => {
            f(start);
            f(end);
        }
        Expr::ListLit(items) | Expr::VectorLit(items) | Expr::Parallel(items) => {
            for i in items {
                f(i);
            }
        }
        Expr::MapLit(pairs) => {
            for (k, v) in pairs {
                f(k);
                f(v);
            }
        }
        Expr::StructLit { fields, .. } => {
            for (_, v) in fields {
                f(v);
            }
        }
        Expr::Pipe(a, b) | Expr::Compose(a, b) => {
            f(a);
            f(b);
        }
        Expr::Background(inner) | Expr::Receive(inner) | Expr::Arena(inner) => f(inner),
        Expr::Send { channel, value } => {
            f(channel);
            f(value);
        }
        Expr::Match {
            scrutinee,
            arms,
            default,
        } => {
            f(scrutinee);
            for arm in arms {
                if let Some(g) = &mut arm.guard {
                    f(g);
                }
                f(&mut arm.body);
            }
            if let Some(d) = default {
                f(d);
            }
        }
        Expr::Cast { expr, .. } => f(expr),
        Expr::Fma { a, b, c, .. } => {
            f(a);
            f(b);
            f(c);
        }
        Expr::MemoryLoad { address, .. } => f(address),
    }
}

/// The direct expression children of `stmt`, not recursing into nested statement bodies.
pub fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::Assign { value, target, .. } => {
            let mut v = vec![value];
            match target {
                AssignTarget::Index { base, index } => {
                    v.push(base);
                    v.push(index);
                }
                AssignTarget::Field { base, .. } => v.push(base),
                AssignTarget::Name(_) => {}
            }
            v
        }
        Stmt::ExprStmt(e) | Stmt::Defer(e) | Stmt::Spawn(e) => vec![e],
        Stmt::Loop(l) => vec![l.iterable.as_ref()],
        Stmt::While { cond, .. } => vec![cond],
        Stmt::RegisterAssign { value, .. } => vec![value],
        Stmt::MemoryStore { address, value, .. } => vec![address, value],
        Stmt::Syscall { number, args } => {
            let mut v = vec![number];
            v.extend(args.iter());
            v
        }
        Stmt::Jump { .. } | Stmt::Import { .. } | Stmt::Arena(_) => vec![],
    }
}

/// The nested statement bodies directly inside `stmt` (loop/while/arena bodies).
pub fn stmt_nested_bodies(stmt: &Stmt) -> Vec<&[Stmt]> {
    match stmt {
        Stmt::Loop(l) => vec![&l.body],
        Stmt::While { body, .. } => vec![body],
        Stmt::Arena(body) => vec![body],
        _ => vec![],
    }
}
