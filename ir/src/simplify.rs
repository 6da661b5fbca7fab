//! Local expression simplification.
//!
//! Constant folding, a handful of algebraic identities and affine
//! canonicalization of integer index arithmetic. The result is equivalent
//! to the input for every assignment of integer loop variables.

use crate::affine::Affine;
use crate::expr::Expr;
use crate::types::{BinaryOp, ConstValue, UnaryOp};

pub fn simplify(expr: &Expr) -> Expr {
    expr.rewrite(&mut simplify_node)
}

fn simplify_node(e: &Expr) -> Option<Expr> {
    match e {
        Expr::Unary(op, a) => match (op, a.as_ref()) {
            (UnaryOp::Neg, Expr::Const(ConstValue::Int(v))) => Some(Expr::int(-v)),
            (UnaryOp::Neg, Expr::Const(ConstValue::Float(v))) => Some(Expr::float(-v)),
            (UnaryOp::Not, Expr::Const(ConstValue::Bool(b))) => Some(Expr::bool(!b)),
            _ => None,
        },
        Expr::Binary(op, a, b) => {
            if let (Expr::Const(x), Expr::Const(y)) = (a.as_ref(), b.as_ref()) {
                return fold_binary(*op, *x, *y).map(Expr::Const);
            }
            simplify_binary(*op, a, b)
        }
        Expr::Select { cond, on_true, on_false } => match cond.as_ref() {
            Expr::Const(c) => Some(if c.is_truthy() { on_true.as_ref().clone() } else { on_false.as_ref().clone() }),
            _ if on_true == on_false => Some(on_true.as_ref().clone()),
            _ => None,
        },
        _ => None,
    }
}

fn simplify_binary(op: BinaryOp, a: &Expr, b: &Expr) -> Option<Expr> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            if let Some(affine) = Affine::of(&Expr::binary(op, a.clone(), b.clone())) {
                return Some(affine.to_expr());
            }
            match (op, a.as_int(), b.as_int()) {
                (BinaryOp::Add, Some(0), _) | (BinaryOp::Mul, Some(1), _) => Some(b.clone()),
                (BinaryOp::Add | BinaryOp::Sub, _, Some(0)) | (BinaryOp::Mul, _, Some(1)) => Some(a.clone()),
                _ => None,
            }
        }
        BinaryOp::Div => {
            let k = b.as_int()?;
            if k == 1 {
                return Some(a.clone());
            }
            let affine = Affine::of(a)?;
            if affine.divisible_by(k) {
                let terms = affine.terms.iter().map(|(v, c)| (v.clone(), c / k)).collect();
                return Some(Affine { terms, constant: affine.constant / k }.to_expr());
            }
            None
        }
        BinaryOp::Mod => {
            let k = b.as_int()?;
            if k == 1 {
                return Some(Expr::int(0));
            }
            let affine = Affine::of(a)?;
            let (divisible, rest): (Vec<_>, Vec<_>) = affine.terms.iter().cloned().partition(|(_, c)| c % k == 0);
            let constant = affine.constant.rem_euclid(k);
            if divisible.is_empty() && constant == affine.constant {
                return None;
            }
            let remainder = Affine { terms: rest, constant };
            match remainder.as_constant() {
                Some(c) => Some(Expr::int(c.rem_euclid(k))),
                None => Some(Expr::binary(BinaryOp::Mod, remainder.to_expr(), Expr::int(k))),
            }
        }
        BinaryOp::Min | BinaryOp::Max if a == b => Some(a.clone()),
        _ => None,
    }
}

/// Evaluate a binary operator on constants; `None` for division by zero.
pub fn fold_binary(op: BinaryOp, x: ConstValue, y: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    if let (Some(a), Some(b)) = (int_of(x), int_of(y)) {
        return Some(match op {
            BinaryOp::Add => Int(a.wrapping_add(b)),
            BinaryOp::Sub => Int(a.wrapping_sub(b)),
            BinaryOp::Mul => Int(a.wrapping_mul(b)),
            BinaryOp::Div if b == 0 => return None,
            BinaryOp::Div => Int(a.div_euclid(b)),
            BinaryOp::Mod if b == 0 => return None,
            BinaryOp::Mod => Int(a.rem_euclid(b)),
            BinaryOp::Min => Int(a.min(b)),
            BinaryOp::Max => Int(a.max(b)),
            BinaryOp::Lt => Bool(a < b),
            BinaryOp::Le => Bool(a <= b),
            BinaryOp::Eq => Bool(a == b),
            BinaryOp::Ne => Bool(a != b),
            BinaryOp::And => Bool(a != 0 && b != 0),
            BinaryOp::Or => Bool(a != 0 || b != 0),
        });
    }
    let (a, b) = (x.as_f64(), y.as_f64());
    Some(match op {
        BinaryOp::Add => Float(a + b),
        BinaryOp::Sub => Float(a - b),
        BinaryOp::Mul => Float(a * b),
        BinaryOp::Div => Float(a / b),
        BinaryOp::Mod => Float(a.rem_euclid(b)),
        BinaryOp::Min => Float(a.min(b)),
        BinaryOp::Max => Float(a.max(b)),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::And => Bool(a != 0.0 && b != 0.0),
        BinaryOp::Or => Bool(a != 0.0 || b != 0.0),
    })
}

fn int_of(c: ConstValue) -> Option<i64> {
    match c {
        ConstValue::Int(v) => Some(v),
        ConstValue::Bool(b) => Some(b as i64),
        ConstValue::Float(_) => None,
    }
}
