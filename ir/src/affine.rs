//! Affine view of integer index expressions.
//!
//! An index is affine when it is a sum of `coeff * var` terms and a constant.
//! Schedules use this to reason about loop footprints; everything else
//! (division, modulo, min/max, loads) is treated as opaque.

use crate::expr::{Expr, Var};
use crate::types::{BinaryOp, UnaryOp};

/// `sum(coeff * var) + constant`, terms in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Affine {
    pub terms: Vec<(Var, i64)>,
    pub constant: i64,
}

impl Affine {
    pub fn constant(c: i64) -> Self {
        Self { terms: Vec::new(), constant: c }
    }

    pub fn var(v: &Var) -> Self {
        Self { terms: vec![(v.clone(), 1)], constant: 0 }
    }

    /// Affine decomposition of `expr`, or `None` if it is not affine.
    pub fn of(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Const(c) => c.as_i64().map(Self::constant),
            Expr::Var(v) => Some(Self::var(v)),
            Expr::Unary(UnaryOp::Neg, a) => Some(Self::of(a)?.scaled(-1)),
            Expr::Binary(BinaryOp::Add, a, b) => Some(Self::of(a)?.plus(&Self::of(b)?, 1)),
            Expr::Binary(BinaryOp::Sub, a, b) => Some(Self::of(a)?.plus(&Self::of(b)?, -1)),
            Expr::Binary(BinaryOp::Mul, a, b) => {
                let (a, b) = (Self::of(a)?, Self::of(b)?);
                match (a.as_constant(), b.as_constant()) {
                    (Some(c), _) => Some(b.scaled(c)),
                    (_, Some(c)) => Some(a.scaled(c)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<i64> {
        self.terms.is_empty().then_some(self.constant)
    }

    pub fn coeff(&self, var: &Var) -> i64 {
        self.terms.iter().find(|(v, _)| v == var).map_or(0, |(_, c)| *c)
    }

    /// `self + sign * other`.
    pub fn plus(&self, other: &Self, sign: i64) -> Self {
        let mut out = self.clone();
        for (v, c) in &other.terms {
            match out.terms.iter_mut().find(|(w, _)| w == v) {
                Some((_, existing)) => *existing += sign * c,
                None => out.terms.push((v.clone(), sign * c)),
            }
        }
        out.constant += sign * other.constant;
        out.terms.retain(|(_, c)| *c != 0);
        out
    }

    pub fn scaled(&self, k: i64) -> Self {
        if k == 0 {
            return Self::constant(0);
        }
        Self { terms: self.terms.iter().map(|(v, c)| (v.clone(), c * k)).collect(), constant: self.constant * k }
    }

    /// Split into the part over `keep` variables and the rest.
    pub fn partition(&self, keep: impl Fn(&Var) -> bool) -> (Self, Self) {
        let (kept, rest): (Vec<_>, Vec<_>) = self.terms.iter().cloned().partition(|(v, _)| keep(v));
        (Self { terms: kept, constant: self.constant }, Self { terms: rest, constant: 0 })
    }

    /// Whether every coefficient and the constant are multiples of `k`.
    pub fn divisible_by(&self, k: i64) -> bool {
        k != 0 && self.constant % k == 0 && self.terms.iter().all(|(_, c)| c % k == 0)
    }

    /// Canonical expression: `v0*c0 + v1*c1 + .. + constant`.
    pub fn to_expr(&self) -> Expr {
        let mut acc: Option<Expr> = None;
        for (v, c) in &self.terms {
            let magnitude = if c.abs() == 1 { Expr::var(v) } else { Expr::var(v) * c.abs() };
            acc = Some(match (acc, *c < 0) {
                (None, false) => magnitude,
                (None, true) if *c == -1 => -Expr::var(v),
                (None, true) => Expr::var(v) * *c,
                (Some(a), false) => a + magnitude,
                (Some(a), true) => a - magnitude,
            });
        }
        match acc {
            None => Expr::int(self.constant),
            Some(a) if self.constant > 0 => a + self.constant,
            Some(a) if self.constant < 0 => a - (-self.constant),
            Some(a) => a,
        }
    }
}
