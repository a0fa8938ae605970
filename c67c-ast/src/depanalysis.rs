//! Loop-body dependency analysis and the SIMD vectorization gate.
//!
//! Separate from the optimizer: the optimizer's loop-vectorization-marking pass (pass 7, see
//! `c67c-optimize`) calls [`analyze_loop_dependencies`] and [`is_vectorizable`] and only sets the
//! `Loop::vectorized`/`vector_width` fields; this module owns the actual dependency reasoning,
//! the same separation of "what the loop body does" from "what the optimizer does about it" that
//! a `flowgraph`/`dominator_tree` analysis keeps from the passes that consume it (`licm`,
//! `postopt`, ...).

use std::collections::HashSet;

use crate::ast::{AssignTarget, BinOp, Expr, Loop, Stmt};

/// The kind of cross-iteration dependency a [`DependencyRecord`] reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DependencyKind {
    /// No dependency recorded for this variable.
    None,
    /// Read-after-write: a read follows a write to the same variable earlier in the body.
    /// Prevents vectorization.
    Flow,
    /// Write-after-read: a write follows a read of the same variable earlier in the body.
    /// Resolved by register renaming; does not prevent vectorization.
    Anti,
    /// Write-after-write: more than one write to the same variable in the body. May need
    /// renaming but does not prevent vectorization.
    Output,
    /// A dependency exists but its direction/kind could not be classified (e.g. the variable is
    /// reached only through an indirect memory access). Treated conservatively like `Flow`.
    Unknown,
}

/// One dependency finding for a single variable within a loop body.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRecord {
    /// The kind of dependency.
    pub kind: DependencyKind,
    /// The variable the dependency is about.
    pub variable: String,
    /// Iteration distance the dependency spans. `0` for dependencies entirely within one
    /// iteration's statement sequence, the only kind this analyzer currently detects — it never
    /// computes a cross-iteration distance greater than zero.
    pub distance: u32,
}

#[derive(Default)]
struct StmtAccess {
    reads: HashSet<String>,
    writes: HashSet<String>,
}

/// Collect every identifier `expr` reads, recursing into subexpressions. Does not know about
/// writes — that's the assignment statement's job.
fn collect_reads(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::Number(_) | Expr::Str(_) | Expr::Address(_) | Expr::LoopState(_) => {}
        Expr::Ident(ident) => {
            out.insert(ident.name.clone());
        }
        Expr::Binary { lhs, rhs, .. } => {
            collect_reads(lhs, out);
            collect_reads(rhs, out);
        }
        Expr::Unary { operand, .. } | Expr::Postfix { operand, .. } | Expr::Len(operand) => {
            collect_reads(operand, out);
        }
        Expr::Index { base, index } => {
            collect_reads(base, out);
            collect_reads(index, out);
        }
        Expr::Slice { base, start, end } => {
            collect_reads(base, out);
            if let Some(s) = start {
                collect_reads(s, out);
            }
            if let Some(e) = end {
                collect_reads(e, out);
            }
        }
        Expr::Field { base, .. } => collect_reads(base, out),
        Expr::Call { callee, args, .. } => {
            collect_reads(callee, out);
            for a in args {
                collect_reads(a, out);
            }
        }
        Expr::Range { start, end, .. } => {
            collect_reads(start, out);
            collect_reads(end, out);
        }
        Expr::ListLit(items) | Expr::VectorLit(items) | Expr::Parallel(items) => {
            for item in items {
                collect_reads(item, out);
            }
        }
        Expr::MapLit(pairs) => {
            for (k, v) in pairs {
                collect_reads(k, out);
                collect_reads(v, out);
            }
        }
        Expr::StructLit { fields, .. } => {
            for (_, v) in fields {
                collect_reads(v, out);
            }
        }
        Expr::Lambda(_) | Expr::MultiLambda(_) | Expr::PatternLambda(_) => {
            // Captured variables are resolved by closure analysis, not dependency analysis; a
            // lambda literal appearing in a loop body is treated as an opaque read-nothing value
            // until called.
        }
        Expr::Pipe(a, b) | Expr::Compose(a, b) => {
            collect_reads(a, out);
            collect_reads(b, out);
        }
        Expr::Background(inner) | Expr::Receive(inner) | Expr::Arena(inner) => {
            collect_reads(inner, out)
        }
        Expr::Send { channel, value } => {
            collect_reads(channel, out);
            collect_reads(value, out);
        }
        Expr::Match {
            scrutinee,
            arms,
            default,
        } => {
            collect_reads(scrutinee, out);
            for arm in arms {
                if let Some(guard) = &arm.guard {
                    collect_reads(guard, out);
                }
                collect_reads(&arm.body, out);
            }
            if let Some(d) = default {
                collect_reads(d, out);
            }
        }
        Expr::Cast { expr, .. } => collect_reads(expr, out),
        Expr::Fma { a, b, c, .. } => {
            collect_reads(a, out);
            collect_reads(b, out);
            collect_reads(c, out);
        }
        Expr::Unsafe(_) | Expr::RegisterLoad(_) => {}
        Expr::MemoryLoad { address, .. } => collect_reads(address, out),
    }
}

fn stmt_access(stmt: &Stmt) -> StmtAccess {
    let mut access = StmtAccess::default();
    match stmt {
        Stmt::Assign {
            target,
            compound_op,
            value,
            ..
        } => {
            collect_reads(value, &mut access.reads);
            match target {
                AssignTarget::Name(name) => {
                    // A compound assignment (`sum += i`) reads its own current value before
                    // writing it.
                    if compound_op.is_some() {
                        access.reads.insert(name.clone());
                    }
                    access.writes.insert(name.clone());
                }
                AssignTarget::Index { base, index } => {
                    collect_reads(base, &mut access.reads);
                    collect_reads(index, &mut access.reads);
                    if let Expr::Ident(ident) = base.as_ref() {
                        access.writes.insert(ident.name.clone());
                    }
                }
                AssignTarget::Field { base, .. } => {
                    collect_reads(base, &mut access.reads);
                    if let Expr::Ident(ident) = base.as_ref() {
                        access.writes.insert(ident.name.clone());
                    }
                }
            }
        }
        Stmt::ExprStmt(expr) => collect_reads(expr, &mut access.reads),
        Stmt::Loop(l) => collect_reads(&l.iterable, &mut access.reads),
        Stmt::While { cond, .. } => collect_reads(cond, &mut access.reads),
        Stmt::Jump { .. } | Stmt::Import { .. } => {}
        Stmt::Defer(e) | Stmt::Spawn(e) => collect_reads(e, &mut access.reads),
        Stmt::Arena(_) => {}
        Stmt::RegisterAssign { value, .. } => collect_reads(value, &mut access.reads),
        Stmt::MemoryStore { address, value, .. } => {
            collect_reads(address, &mut access.reads);
            collect_reads(value, &mut access.reads);
        }
        Stmt::Syscall { number, args } => {
            collect_reads(number, &mut access.reads);
            for a in args {
                collect_reads(a, &mut access.reads);
            }
        }
    }
    access
}

/// Analyze a loop body and produce one [`DependencyRecord`] per variable that is both read and
/// written (in either order) somewhere in the body.
///
/// A read at position R following a write at position W < R to the same variable is a
/// flow (RAW) dependency and prevents vectorization; a write following an earlier read is an
/// anti (WAR) dependency; more than one write to the same variable is an output (WAW)
/// dependency. Neither anti nor output dependencies block vectorization on their own.
pub fn analyze_loop_dependencies(body: &[Stmt]) -> Vec<DependencyRecord> {
    let accesses: Vec<StmtAccess> = body.iter().map(stmt_access).collect();

    // A compound assignment to a named scalar (`sum += i`) always reads the value the *previous*
    // iteration wrote, even when it's the only statement in the body and the position-based scan
    // below sees read and write land on the same statement. Track these separately so they're
    // never missed by the intra-body ordering check.
    let mut self_reducing: HashSet<String> = HashSet::new();
    for stmt in body {
        if let Stmt::Assign {
            target: AssignTarget::Name(name),
            compound_op: Some(_),
            ..
        } = stmt
        {
            self_reducing.insert(name.clone());
        }
    }

    let mut variables: Vec<String> = Vec::new();
    for access in &accesses {
        for v in access.reads.iter().chain(access.writes.iter()) {
            if !variables.contains(v) {
                variables.push(v.clone());
            }
        }
    }

    let mut records = Vec::new();
    for var in variables {
        let mut write_positions = Vec::new();
        let mut read_positions = Vec::new();
        for (pos, access) in accesses.iter().enumerate() {
            if access.writes.contains(&var) {
                write_positions.push(pos);
            }
            if access.reads.contains(&var) {
                read_positions.push(pos);
            }
        }

        let has_flow = self_reducing.contains(&var)
            || read_positions
                .iter()
                .any(|&r| write_positions.iter().any(|&w| w < r));
        let has_anti = !has_flow
            && write_positions
                .iter()
                .any(|&w| read_positions.iter().any(|&r| r < w));
        let has_output = write_positions.len() > 1;

        let kind = if has_flow {
            DependencyKind::Flow
        } else if has_output {
            DependencyKind::Output
        } else if has_anti {
            DependencyKind::Anti
        } else {
            continue;
        };

        records.push(DependencyRecord {
            kind,
            variable: var,
            distance: 0,
        });
    }
    records
}

/// Every operation a vectorizable loop body may use: the four arithmetic operators, every
/// comparison, and calls to `sqrt`, `abs`, `min`, `max`.
fn is_vectorizable_binop(op: BinOp) -> bool {
    matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div) || op.is_comparison()
}

const VECTORIZABLE_CALLS: &[&str] = &["sqrt", "abs", "min", "max"];

fn expr_is_vectorizable(expr: &Expr, iterator: &str) -> bool {
    match expr {
        Expr::Number(_) | Expr::Ident(_) | Expr::LoopState(_) => true,
        Expr::Binary { op, lhs, rhs } => {
            is_vectorizable_binop(*op)
                && expr_is_vectorizable(lhs, iterator)
                && expr_is_vectorizable(rhs, iterator)
        }
        Expr::Unary { operand, .. } => expr_is_vectorizable(operand, iterator),
        Expr::Call { callee, args, .. } => {
            let known = matches!(callee.as_ref(), Expr::Ident(i) if VECTORIZABLE_CALLS.contains(&i.name.as_str()));
            known && args.iter().all(|a| expr_is_vectorizable(a, iterator))
        }
        Expr::Index { base, index } => {
            expr_is_vectorizable(base, iterator) && index_mentions_iterator(index, iterator)
        }
        Expr::Fma { a, b, c, .. } => {
            expr_is_vectorizable(a, iterator)
                && expr_is_vectorizable(b, iterator)
                && expr_is_vectorizable(c, iterator)
        }
        _ => false,
    }
}

/// Approximates linear memory access by accepting any indexed write whose index expression
/// mentions the iterator, rather than real linearity analysis (e.g. rejecting `a[b[i]]`).
fn index_mentions_iterator(index: &Expr, iterator: &str) -> bool {
    let mut reads = HashSet::new();
    collect_reads(index, &mut reads);
    reads.contains(iterator)
}

fn stmt_is_vectorizable(stmt: &Stmt, iterator: &str) -> bool {
    match stmt {
        Stmt::Assign {
            target, value, ..
        } => {
            let target_ok = match target {
                AssignTarget::Name(_) => true,
                AssignTarget::Index { index, .. } => index_mentions_iterator(index, iterator),
                AssignTarget::Field { .. } => false,
            };
            target_ok && expr_is_vectorizable(value, iterator)
        }
        Stmt::ExprStmt(expr) => expr_is_vectorizable(expr, iterator),
        _ => false,
    }
}

/// The SIMD gate: a loop is vectorizable iff it reports no flow dependency, every statement in
/// the body uses only the vectorizable operation set, and indexed accesses are (approximately)
/// linear in the iterator. A loop already tagged parallel
/// (`num_threads != 0`) bypasses the gate unconditionally.
pub fn is_vectorizable(loop_: &Loop, records: &[DependencyRecord]) -> bool {
    if loop_.num_threads != 0 {
        return true;
    }
    if records.iter().any(|r| r.kind == DependencyKind::Flow) {
        return false;
    }
    loop_
        .body
        .iter()
        .all(|stmt| stmt_is_vectorizable(stmt, &loop_.var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Ident, MemWidth};

    fn ident(name: &str) -> Expr {
        Expr::Ident(Ident::simple(name))
    }

    fn assign_name(name: &str, value: Expr, compound: Option<BinOp>) -> Stmt {
        Stmt::Assign {
            target: AssignTarget::Name(name.to_string()),
            mutable: compound.is_some(),
            is_define: false,
            compound_op: compound,
            value,
        }
    }

    #[test]
    fn accumulator_pattern_has_flow_dependency() {
        // sum += i
        let body = vec![assign_name("sum", ident("i"), Some(BinOp::Add))];
        let records = analyze_loop_dependencies(&body);
        assert!(records
            .iter()
            .any(|r| r.variable == "sum" && r.kind == DependencyKind::Flow));

        let loop_ = Loop {
            label: 0,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(10.0)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body,
            num_threads: 0,
            vectorized: false,
            vector_width: 0,
        };
        assert!(!is_vectorizable(&loop_, &records));
    }

    #[test]
    fn elementwise_store_has_no_flow_dependency() {
        // result[i] <- a[i] + b[i]
        let body = vec![Stmt::Assign {
            target: AssignTarget::Index {
                base: Box::new(ident("result")),
                index: Box::new(ident("i")),
            },
            mutable: false,
            is_define: false,
            compound_op: None,
            value: Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Index {
                    base: Box::new(ident("a")),
                    index: Box::new(ident("i")),
                }),
                rhs: Box::new(Expr::Index {
                    base: Box::new(ident("b")),
                    index: Box::new(ident("i")),
                }),
            },
        }];
        let records = analyze_loop_dependencies(&body);
        assert!(!records.iter().any(|r| r.kind == DependencyKind::Flow));

        let loop_ = Loop {
            label: 0,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(8.0)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body,
            num_threads: 0,
            vectorized: false,
            vector_width: 0,
        };
        assert!(is_vectorizable(&loop_, &records));
    }

    #[test]
    fn parallel_loop_bypasses_gate_even_with_flow_dependency() {
        let body = vec![assign_name("sum", ident("i"), Some(BinOp::Add))];
        let records = analyze_loop_dependencies(&body);
        let loop_ = Loop {
            label: 0,
            iterable: Box::new(Expr::Range {
                start: Box::new(Expr::Number(0.0)),
                end: Box::new(Expr::Number(10.0)),
                inclusive: false,
            }),
            var: "i".to_string(),
            body,
            num_threads: 4,
            vectorized: false,
            vector_width: 0,
        };
        assert!(is_vectorizable(&loop_, &records));
    }

    #[test]
    fn unsafe_memory_store_is_not_a_variable_dependency() {
        let body = vec![Stmt::MemoryStore {
            address: ident("p"),
            value: Expr::Number(1.0),
            width: MemWidth::Qword,
        }];
        let records = analyze_loop_dependencies(&body);
        assert!(records.is_empty());
    }
}
