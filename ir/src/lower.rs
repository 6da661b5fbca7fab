//! Canonical unscheduled loop nests.
//!
//! Builds the nest an operator lowering hands to the scheduler: one serial
//! loop per iteration variable (spatial first, then reduce) around a single
//! schedule block named after the tensor it writes.

use std::sync::Arc;

use strata_dtype::DType;

use crate::expr::{Expr, Var};
use crate::stmt::{For, IterVar, ScheduleBlock, Stmt};
use crate::tensor::Tensor;
use crate::types::{BinaryOp, MemoryScope};

/// Reduction combiner of a lowered reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReduceKind {
    Sum,
    Product,
    Min,
    Max,
}

impl ReduceKind {
    pub fn combiner(self) -> BinaryOp {
        match self {
            Self::Sum => BinaryOp::Add,
            Self::Product => BinaryOp::Mul,
            Self::Min => BinaryOp::Min,
            Self::Max => BinaryOp::Max,
        }
    }

    pub fn from_combiner(op: BinaryOp) -> Option<Self> {
        Some(match op {
            BinaryOp::Add => Self::Sum,
            BinaryOp::Mul => Self::Product,
            BinaryOp::Min => Self::Min,
            BinaryOp::Max => Self::Max,
            _ => return None,
        })
    }

    /// Neutral element of the combiner.
    pub fn identity(self) -> Expr {
        match self {
            Self::Sum => Expr::float(0.0),
            Self::Product => Expr::float(1.0),
            Self::Min => Expr::float(f64::INFINITY),
            Self::Max => Expr::float(f64::NEG_INFINITY),
        }
    }
}

/// A lowered operator: the tensor it defines and its loop nest.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub tensor: Tensor,
    pub stmt: Arc<Stmt>,
}

/// `name[i..] = body(i..)` over `shape`.
pub fn compute(name: &str, shape: &[i64], dtype: DType, body: impl Fn(&[Expr]) -> Expr) -> Lowered {
    let tensor = Tensor::new(name, shape.iter().copied(), dtype);
    let iter_vars: Vec<IterVar> =
        shape.iter().enumerate().map(|(k, &e)| IterVar::spatial(Var::new(format!("i{k}")), e)).collect();
    let idx: Vec<Expr> = iter_vars.iter().map(|iv| Expr::var(&iv.var)).collect();
    let store = Stmt::store(&tensor, idx.iter().cloned(), body(&idx));
    let stmt = nest(name, &tensor, iter_vars, None, store);
    Lowered { tensor, stmt }
}

/// `name[i..] = combine over r.. of body(i.., r..)`, starting from the
/// combiner's identity.
pub fn reduce(
    name: &str,
    shape: &[i64],
    reduce_extents: &[i64],
    kind: ReduceKind,
    dtype: DType,
    body: impl Fn(&[Expr], &[Expr]) -> Expr,
) -> Lowered {
    let tensor = Tensor::new(name, shape.iter().copied(), dtype);
    let spatial: Vec<IterVar> =
        shape.iter().enumerate().map(|(k, &e)| IterVar::spatial(Var::new(format!("i{k}")), e)).collect();
    let reduce: Vec<IterVar> =
        reduce_extents.iter().enumerate().map(|(k, &e)| IterVar::reduce(Var::new(format!("r{k}")), e)).collect();
    let idx: Vec<Expr> = spatial.iter().map(|iv| Expr::var(&iv.var)).collect();
    let ridx: Vec<Expr> = reduce.iter().map(|iv| Expr::var(&iv.var)).collect();

    let acc = Expr::load(&tensor, idx.iter().cloned());
    let update = Stmt::store(&tensor, idx.iter().cloned(), Expr::binary(kind.combiner(), acc, body(&idx, &ridx)));
    let init = Stmt::store(&tensor, idx.iter().cloned(), kind.identity());

    let iter_vars = spatial.into_iter().chain(reduce).collect();
    let stmt = nest(name, &tensor, iter_vars, Some(init), update);
    Lowered { tensor, stmt }
}

fn nest(name: &str, tensor: &Tensor, iter_vars: Vec<IterVar>, init: Option<Arc<Stmt>>, body: Arc<Stmt>) -> Arc<Stmt> {
    let loop_vars: Vec<(Var, i64)> = iter_vars
        .iter()
        .map(|iv| {
            let prefix = if iv.is_reduce() { "r" } else { "i" };
            let k = iv.var.name().trim_start_matches(prefix);
            (Var::new(format!("{name}_{prefix}{k}")), iv.extent)
        })
        .collect();
    let block = Arc::new(Stmt::ScheduleBlock(ScheduleBlock {
        name: name.into(),
        iter_values: loop_vars.iter().map(|(v, _)| Expr::var(v)).collect(),
        iter_vars,
        write: tensor.clone(),
        init,
        body,
        scope: MemoryScope::Global,
    }));
    loop_vars.into_iter().rev().fold(block, |body, (var, extent)| Arc::new(Stmt::For(For::new(var, extent, body))))
}
