//! Scalar expressions.
//!
//! [`Expr`] is a closed sum type. Children are reference counted so a rewrite
//! only copies the path it changes. Index arithmetic is built with the usual
//! operators (`a * 4 + b`) and the comparison/min/max helpers below.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};
use std::sync::Arc;

use crate::tensor::Tensor;
use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// A named scalar variable (loop variable or block iteration variable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(Arc<str>);

impl Var {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(ConstValue),
    Var(Var),
    Unary(UnaryOp, Arc<Expr>),
    Binary(BinaryOp, Arc<Expr>, Arc<Expr>),
    Select { cond: Arc<Expr>, on_true: Arc<Expr>, on_false: Arc<Expr> },
    Load { tensor: Tensor, indices: Vec<Expr> },
}

impl Expr {
    pub const fn int(v: i64) -> Self {
        Self::Const(ConstValue::Int(v))
    }

    pub const fn float(v: f64) -> Self {
        Self::Const(ConstValue::Float(v))
    }

    pub const fn bool(v: bool) -> Self {
        Self::Const(ConstValue::Bool(v))
    }

    pub fn var(var: &Var) -> Self {
        Self::Var(var.clone())
    }

    pub fn load(tensor: &Tensor, indices: impl IntoIterator<Item = Expr>) -> Self {
        Self::Load { tensor: tensor.clone(), indices: indices.into_iter().collect() }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::Unary(op, Arc::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary(op, Arc::new(lhs), Arc::new(rhs))
    }

    pub fn select(cond: Expr, on_true: Expr, on_false: Expr) -> Self {
        Self::Select { cond: Arc::new(cond), on_true: Arc::new(on_true), on_false: Arc::new(on_false) }
    }

    pub fn min(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Min, self, other.into())
    }

    pub fn max(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Max, self, other.into())
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Lt, self, other.into())
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Le, self, other.into())
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Le, other.into(), self)
    }

    pub fn eq_(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Eq, self, other.into())
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::And, self, other.into())
    }

    pub fn exp(self) -> Self {
        Self::unary(UnaryOp::Exp, self)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Const(c) => c.as_i64(),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Self::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_int() == Some(0)
    }

    /// Visit this expression and all sub-expressions in pre-order.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Self::Const(_) | Self::Var(_) => {}
            Self::Unary(_, a) => a.visit(f),
            Self::Binary(_, a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Self::Select { cond, on_true, on_false } => {
                cond.visit(f);
                on_true.visit(f);
                on_false.visit(f);
            }
            Self::Load { indices, .. } => indices.iter().for_each(|i| i.visit(f)),
        }
    }

    /// Free variables, ordered by name.
    pub fn vars(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        self.visit(&mut |e| {
            if let Self::Var(v) = e {
                vars.insert(v.clone());
            }
        });
        vars
    }

    pub fn uses_var(&self, var: &Var) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Self::Var(v) if v == var));
        found
    }

    /// All loads in pre-order.
    pub fn loads(&self) -> Vec<(&Tensor, &[Expr])> {
        let mut loads = Vec::new();
        self.visit(&mut |e| {
            if let Self::Load { tensor, indices } = e {
                loads.push((tensor, indices.as_slice()));
            }
        });
        loads
    }

    // =========================================================================
    // Rewriting
    // =========================================================================

    /// Replace variables simultaneously.
    pub fn substitute(&self, map: &HashMap<Var, Expr>) -> Expr {
        if map.is_empty() {
            return self.clone();
        }
        self.rewrite(&mut |e| match e {
            Self::Var(v) => map.get(v).cloned(),
            _ => None,
        })
    }

    /// Rewrite every load, innermost first.
    ///
    /// `f` receives the load with already rewritten indices and returns the
    /// replacement, or `None` to keep it.
    pub fn map_loads(&self, f: &mut impl FnMut(&Tensor, &[Expr]) -> Option<Expr>) -> Expr {
        self.rewrite(&mut |e| match e {
            Self::Load { tensor, indices } => f(tensor, indices),
            _ => None,
        })
    }

    /// Bottom-up rewrite: children first, then `f` on the rebuilt node.
    pub fn rewrite(&self, f: &mut impl FnMut(&Expr) -> Option<Expr>) -> Expr {
        let rebuilt = match self {
            Self::Const(_) | Self::Var(_) => self.clone(),
            Self::Unary(op, a) => Self::unary(*op, a.rewrite(f)),
            Self::Binary(op, a, b) => Self::binary(*op, a.rewrite(f), b.rewrite(f)),
            Self::Select { cond, on_true, on_false } => {
                Self::select(cond.rewrite(f), on_true.rewrite(f), on_false.rewrite(f))
            }
            Self::Load { tensor, indices } => {
                Self::Load { tensor: tensor.clone(), indices: indices.iter().map(|i| i.rewrite(f)).collect() }
            }
        };
        f(&rebuilt).unwrap_or(rebuilt)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Self::bool(v)
    }
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        Self::Var(v)
    }
}

impl From<&Var> for Expr {
    fn from(v: &Var) -> Self {
        Self::Var(v.clone())
    }
}

impl From<ConstValue> for Expr {
    fn from(v: ConstValue) -> Self {
        Self::Const(v)
    }
}

macro_rules! impl_binary_ops {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<T: Into<Expr>> $trait<T> for Expr {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    Expr::binary(BinaryOp::$op, self, rhs.into())
                }
            }
        )*
    };
}

impl_binary_ops! {
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Mod,
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}
