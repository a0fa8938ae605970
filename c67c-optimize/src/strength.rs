//! Strength reduction: algebraic identities applied once constant propagation has exposed new
//! literal operands, as part of the post-propagation local simplification pass.
//!
//! Integer power-of-two reduction (`*2^n -> <<n`, `/2^n -> >>n`, `%2^n -> &(2^n-1)`) is
//! deliberately not implemented here: see `OptimizeOptions::integer_strength_reduction` and
//! `DESIGN.md`.

use c67c_ast::{BinOp, Expr, Stmt, UnOp};

use crate::walk::{map_children, map_stmts};

fn as_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number(n) => Some(*n),
        _ => None,
    }
}

fn is_zero(expr: &Expr) -> bool {
    as_number(expr) == Some(0.0)
}

fn is_one(expr: &Expr) -> bool {
    as_number(expr) == Some(1.0)
}

fn is_truthy(expr: &Expr) -> Option<bool> {
    as_number(expr).map(|n| n != 0.0)
}

fn bool_literal(v: bool) -> Expr {
    Expr::Number(if v { 1.0 } else { 0.0 })
}

fn neg(expr: Expr) -> Expr {
    match as_number(&expr) {
        Some(n) => Expr::Number(-n),
        None => Expr::Unary {
            op: UnOp::Neg,
            operand: Box::new(expr),
        },
    }
}

fn reduce_and(lhs: Expr, rhs: Expr) -> Expr {
    if is_truthy(&lhs) == Some(false) || is_truthy(&rhs) == Some(false) {
        return bool_literal(false);
    }
    if is_truthy(&lhs) == Some(true) {
        return rhs;
    }
    if is_truthy(&rhs) == Some(true) {
        return lhs;
    }
    // De Morgan: (not x) and (not y) -> not(x or y). Deliberately not the dual (`(not x) or (not
    // y) -> not(x and y)`) — that direction would break `and`/`or` short-circuit evaluation order.
    match (lhs, rhs) {
        (
            Expr::Unary {
                op: UnOp::Not,
                operand: a,
            },
            Expr::Unary {
                op: UnOp::Not,
                operand: b,
            },
        ) => Expr::Unary {
            op: UnOp::Not,
            operand: Box::new(Expr::Binary {
                op: BinOp::Or,
                lhs: a,
                rhs: b,
            }),
        },
        (lhs, rhs) => Expr::Binary {
            op: BinOp::And,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

fn reduce_or(lhs: Expr, rhs: Expr) -> Expr {
    if is_truthy(&lhs) == Some(true) || is_truthy(&rhs) == Some(true) {
        return bool_literal(true);
    }
    if is_truthy(&lhs) == Some(false) {
        return rhs;
    }
    if is_truthy(&rhs) == Some(false) {
        return lhs;
    }
    Expr::Binary {
        op: BinOp::Or,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn reduce_binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    if op.is_comparison() && lhs == rhs {
        return match op {
            BinOp::Eq | BinOp::Le | BinOp::Ge => bool_literal(true),
            BinOp::Ne | BinOp::Lt | BinOp::Gt => bool_literal(false),
            _ => unreachable!("is_comparison() only true for these six"),
        };
    }
    match op {
        BinOp::Add if is_zero(&rhs) => lhs,
        BinOp::Add if is_zero(&lhs) => rhs,
        BinOp::Sub if is_zero(&rhs) => lhs,
        BinOp::Sub if is_zero(&lhs) => neg(rhs),
        BinOp::Mul if is_one(&rhs) => lhs,
        BinOp::Mul if is_one(&lhs) => rhs,
        BinOp::Mul if is_zero(&lhs) || is_zero(&rhs) => Expr::Number(0.0),
        BinOp::Mul if as_number(&rhs) == Some(-1.0) => neg(lhs),
        BinOp::Mul if as_number(&lhs) == Some(-1.0) => neg(rhs),
        BinOp::Div if is_one(&rhs) => lhs,
        BinOp::Div if as_number(&rhs) == Some(-1.0) => neg(lhs),
        BinOp::Mod if is_one(&rhs) || is_zero(&lhs) => Expr::Number(0.0),
        BinOp::BitOr if is_zero(&rhs) => lhs,
        BinOp::BitOr if is_zero(&lhs) => rhs,
        BinOp::BitXor if is_zero(&rhs) => lhs,
        BinOp::BitXor if is_zero(&lhs) => rhs,
        BinOp::BitAnd if is_zero(&lhs) || is_zero(&rhs) => Expr::Number(0.0),
        BinOp::Shl if is_zero(&rhs) => lhs,
        BinOp::Shr if is_zero(&rhs) => lhs,
        BinOp::And => reduce_and(lhs, rhs),
        BinOp::Or => reduce_or(lhs, rhs),
        _ => Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    }
}

fn reduce_unary(op: UnOp, operand: Expr) -> Expr {
    match op {
        UnOp::Not => match operand {
            Expr::Unary {
                op: UnOp::Not,
                operand: inner,
            } => Expr::Binary {
                op: BinOp::Ne,
                lhs: inner,
                rhs: Box::new(Expr::Number(0.0)),
            },
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => Expr::Binary {
                op: op.inverted().expect("comparison op always inverts"),
                lhs,
                rhs,
            },
            other => match as_number(&other) {
                Some(n) => bool_literal(n == 0.0),
                None => Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(other),
                },
            },
        },
        UnOp::Neg => match operand {
            Expr::Unary {
                op: UnOp::Neg,
                operand: inner,
            } => *inner,
            other => match as_number(&other) {
                Some(n) => Expr::Number(-n),
                None => Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(other),
                },
            },
        },
        UnOp::BitNot => Expr::Unary {
            op,
            operand: Box::new(operand),
        },
    }
}

fn reduce_once(expr: Expr) -> Expr {
    match expr {
        Expr::Binary { op, lhs, rhs } => reduce_binary(op, *lhs, *rhs),
        Expr::Unary { op, operand } => reduce_unary(op, *operand),
        other => other,
    }
}

/// Bottom-up applies every strength-reduction identity to `expr`.
pub fn reduce_expr(expr: Expr) -> Expr {
    let expr = map_children(expr, &mut reduce_expr);
    reduce_once(expr)
}

/// Applies strength reduction to every expression reachable from `stmts`.
pub fn reduce_stmts(stmts: Vec<Stmt>) -> Vec<Stmt> {
    map_stmts(stmts, &mut reduce_expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::Ident;

    fn ident(name: &str) -> Expr {
        Expr::Ident(Ident::simple(name))
    }

    #[test]
    fn additive_identity() {
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(ident("x")),
            rhs: Box::new(Expr::Number(0.0)),
        };
        assert_eq!(reduce_expr(expr), ident("x"));
    }

    #[test]
    fn double_negation_cancels() {
        let expr = Expr::Unary {
            op: UnOp::Neg,
            operand: Box::new(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(ident("x")),
            }),
        };
        assert_eq!(reduce_expr(expr), ident("x"));
    }

    #[test]
    fn self_compare_lt_is_false() {
        let expr = Expr::Binary {
            op: BinOp::Lt,
            lhs: Box::new(ident("x")),
            rhs: Box::new(ident("x")),
        };
        assert_eq!(reduce_expr(expr), Expr::Number(0.0));
    }

    #[test]
    fn de_morgan_not_and_not() {
        let expr = Expr::Binary {
            op: BinOp::And,
            lhs: Box::new(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(ident("x")),
            }),
            rhs: Box::new(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(ident("y")),
            }),
        };
        let expected = Expr::Unary {
            op: UnOp::Not,
            operand: Box::new(Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(ident("x")),
                rhs: Box::new(ident("y")),
            }),
        };
        assert_eq!(reduce_expr(expr), expected);
    }

    #[test]
    fn not_comparison_inverts() {
        let expr = Expr::Unary {
            op: UnOp::Not,
            operand: Box::new(Expr::Binary {
                op: BinOp::Lt,
                lhs: Box::new(ident("x")),
                rhs: Box::new(ident("y")),
            }),
        };
        let expected = Expr::Binary {
            op: BinOp::Ge,
            lhs: Box::new(ident("x")),
            rhs: Box::new(ident("y")),
        };
        assert_eq!(reduce_expr(expr), expected);
    }
}
