//! Constant folding and FMA synthesis — optimizer pass 1, and the local re-fold that pass 2
//! (propagation) and pass 6 (post-inline) each rerun once they've exposed new literals.

use c67c_ast::{BinOp, Expr, Program, Stmt, UnOp};

use crate::walk::{map_children, map_stmts};

fn as_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number(n) => Some(*n),
        _ => None,
    }
}

fn bool_literal(v: bool) -> Expr {
    Expr::Number(if v { 1.0 } else { 0.0 })
}

/// Folds one binary node whose operands are already folded. Division and modulo by a literal
/// zero are deliberately left unfolded: the runtime error path is the only place that's
/// observable, and constant-folding it away would hide the behavior scenario 6 depends on.
fn fold_binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    if let (Some(a), Some(b)) = (as_number(&lhs), as_number(&rhs)) {
        let div_like = matches!(op, BinOp::Div | BinOp::Mod);
        if !(div_like && b == 0.0) {
            return match op {
                BinOp::Add => Expr::Number(a + b),
                BinOp::Sub => Expr::Number(a - b),
                BinOp::Mul => Expr::Number(a * b),
                BinOp::Div => Expr::Number(a / b),
                BinOp::Mod => Expr::Number(a % b),
                BinOp::Eq => bool_literal(a == b),
                BinOp::Ne => bool_literal(a != b),
                BinOp::Lt => bool_literal(a < b),
                BinOp::Le => bool_literal(a <= b),
                BinOp::Gt => bool_literal(a > b),
                BinOp::Ge => bool_literal(a >= b),
                BinOp::And => bool_literal(a != 0.0 && b != 0.0),
                BinOp::Or => bool_literal(a != 0.0 || b != 0.0),
                BinOp::BitAnd => Expr::Number(((a as i64) & (b as i64)) as f64),
                BinOp::BitOr => Expr::Number(((a as i64) | (b as i64)) as f64),
                BinOp::BitXor => Expr::Number(((a as i64) ^ (b as i64)) as f64),
                BinOp::Shl => Expr::Number(((a as i64) << (b as i64)) as f64),
                BinOp::Shr => Expr::Number(((a as i64) >> (b as i64)) as f64),
            };
        }
    }
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Recognizes `A*B + C`, `C + A*B`, and `A*B - C` on an already-folded `Binary` node and
/// synthesizes the corresponding [`Expr::Fma`]. A fully-constant `A*B+C` never reaches here: it
/// folds straight to a number in [`fold_binary`] first.
fn synthesize_fma(expr: Expr) -> Expr {
    let is_mul = |e: &Expr| matches!(e, Expr::Binary { op: BinOp::Mul, .. });
    match expr {
        Expr::Binary { op, lhs, rhs }
            if matches!(op, BinOp::Add | BinOp::Sub) && is_mul(&lhs) =>
        {
            let (a, b) = match *lhs {
                Expr::Binary { lhs: a, rhs: b, .. } => (a, b),
                _ => unreachable!(),
            };
            Expr::Fma {
                a,
                b,
                c: rhs,
                is_sub: op == BinOp::Sub,
                is_neg_mul: false,
            }
        }
        Expr::Binary {
            op: BinOp::Add,
            lhs,
            rhs,
        } if is_mul(&rhs) => {
            let (a, b) = match *rhs {
                Expr::Binary { lhs: a, rhs: b, .. } => (a, b),
                _ => unreachable!(),
            };
            Expr::Fma {
                a,
                b,
                c: lhs,
                is_sub: false,
                is_neg_mul: false,
            }
        }
        other => other,
    }
}

fn fold_unary(op: UnOp, operand: Expr) -> Expr {
    match (op, as_number(&operand)) {
        (UnOp::Neg, Some(n)) => Expr::Number(-n),
        (UnOp::Not, Some(n)) => bool_literal(n == 0.0),
        (UnOp::BitNot, Some(n)) => Expr::Number(!(n as i64) as f64),
        _ => Expr::Unary {
            op,
            operand: Box::new(operand),
        },
    }
}

fn fold_once(expr: Expr) -> Expr {
    match expr {
        Expr::Binary { op, lhs, rhs } => synthesize_fma(fold_binary(op, *lhs, *rhs)),
        Expr::Unary { op, operand } => fold_unary(op, *operand),
        other => other,
    }
}

/// Bottom-up constant-folds `expr`, synthesizing FMA nodes along the way.
pub fn fold_expr(expr: Expr) -> Expr {
    let expr = map_children(expr, &mut fold_expr);
    fold_once(expr)
}

/// Folds every expression reachable from `stmts`.
pub fn fold_stmts(stmts: Vec<Stmt>) -> Vec<Stmt> {
    map_stmts(stmts, &mut fold_expr)
}

/// Folds an entire program in place.
pub fn fold_program(mut program: Program) -> Program {
    program.statements = fold_stmts(program.statements);
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use c67c_ast::Ident;

    #[test]
    fn folds_literal_arithmetic() {
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Number(2.0)),
            rhs: Box::new(Expr::Number(3.0)),
        };
        assert_eq!(fold_expr(expr), Expr::Number(5.0));
    }

    #[test]
    fn leaves_division_by_zero_unfolded() {
        let expr = Expr::Binary {
            op: BinOp::Div,
            lhs: Box::new(Expr::Number(10.0)),
            rhs: Box::new(Expr::Number(0.0)),
        };
        assert_eq!(expr.clone(), fold_expr(expr));
    }

    #[test]
    fn synthesizes_fma_from_mul_add() {
        // a * b + c, with a/b/c non-literal so the whole thing doesn't just fold to a number.
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Binary {
                op: BinOp::Mul,
                lhs: Box::new(Expr::Ident(Ident::simple("a"))),
                rhs: Box::new(Expr::Ident(Ident::simple("b"))),
            }),
            rhs: Box::new(Expr::Ident(Ident::simple("c"))),
        };
        match fold_expr(expr) {
            Expr::Fma { is_sub, is_neg_mul, .. } => {
                assert!(!is_sub);
                assert!(!is_neg_mul);
            }
            other => panic!("expected Fma, got {other:?}"),
        }
    }

    #[test]
    fn idempotent_on_already_folded_tree() {
        let expr = Expr::Binary {
            op: BinOp::Mul,
            lhs: Box::new(Expr::Number(2.0)),
            rhs: Box::new(Expr::Number(3.0)),
        };
        let once = fold_expr(expr);
        let twice = fold_expr(once.clone());
        assert_eq!(once, twice);
    }
}
