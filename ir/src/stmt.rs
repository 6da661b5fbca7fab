//! Loop-nest statements.
//!
//! [`Stmt`] is the closed set of node kinds a schedule rewrites:
//!
//! - [`For`]: a loop with a stable [`LoopId`], bounds and an execution kind
//! - `Block`: an ordered sequence of statements
//! - `IfThenElse`: a guarded statement
//! - [`ScheduleBlock`]: a named computation step writing one tensor
//! - `Store`: a single element write
//!
//! Schedule blocks are leaves of the loop structure. Their `init` and `body`
//! contain only stores, sequences and guards, and refer to the block's own
//! iteration variables; enclosing loop variables reach a block only through
//! its `iter_values`.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::expr::{Expr, Var};
use crate::simplify::simplify;
use crate::tensor::Tensor;
use crate::types::{BinaryOp, ForKind, IterVarKind, LoopId, MemoryScope};

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    For(For),
    Block(Vec<Arc<Stmt>>),
    IfThenElse { cond: Expr, then_case: Arc<Stmt>, else_case: Option<Arc<Stmt>> },
    ScheduleBlock(ScheduleBlock),
    Store { tensor: Tensor, indices: Vec<Expr>, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub id: LoopId,
    pub var: Var,
    pub min: Expr,
    pub extent: Expr,
    pub kind: ForKind,
    pub body: Arc<Stmt>,
}

impl For {
    /// A fresh serial loop `var in [0, extent)`.
    pub fn new(var: Var, extent: impl Into<Expr>, body: Arc<Stmt>) -> Self {
        Self { id: LoopId::fresh(), var, min: Expr::int(0), extent: extent.into(), kind: ForKind::Serial, body }
    }

    pub fn const_extent(&self) -> Option<i64> {
        self.extent.as_int()
    }

    /// Upper bound of the trip count.
    ///
    /// Equal to `const_extent` for constant loops; for the clipped inner loop
    /// of a non-divisible split (`min(f, ..)`) this is `f`.
    pub fn max_extent(&self) -> Option<i64> {
        fn bound(e: &Expr) -> Option<i64> {
            match e {
                Expr::Const(c) => c.as_i64(),
                Expr::Binary(BinaryOp::Min, a, b) => match (bound(a), bound(b)) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                },
                _ => None,
            }
        }
        bound(&self.extent)
    }

    pub fn with_body(&self, body: Arc<Stmt>) -> Self {
        Self { body, ..self.clone() }
    }

    pub fn with_kind(&self, kind: ForKind) -> Self {
        Self { kind, ..self.clone() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterVar {
    pub var: Var,
    pub extent: i64,
    pub kind: IterVarKind,
}

impl IterVar {
    pub fn spatial(var: Var, extent: i64) -> Self {
        Self { var, extent, kind: IterVarKind::Spatial }
    }

    pub fn reduce(var: Var, extent: i64) -> Self {
        Self { var, extent, kind: IterVarKind::Reduce }
    }

    pub fn is_reduce(&self) -> bool {
        self.kind == IterVarKind::Reduce
    }
}

/// A named computation step.
///
/// `iter_values[k]` binds `iter_vars[k]` in terms of enclosing loop
/// variables. `init` is present exactly for reductions and runs before the
/// body whenever every reduce iteration variable evaluates to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleBlock {
    pub name: Arc<str>,
    pub iter_vars: Vec<IterVar>,
    pub iter_values: Vec<Expr>,
    pub write: Tensor,
    pub init: Option<Arc<Stmt>>,
    pub body: Arc<Stmt>,
    pub scope: MemoryScope,
}

impl ScheduleBlock {
    pub fn is_reduction(&self) -> bool {
        self.iter_vars.iter().any(IterVar::is_reduce)
    }

    /// Tensors read by the body, in order of first appearance.
    ///
    /// For a reduction the accumulator self-read comes first.
    pub fn reads(&self) -> Vec<Tensor> {
        let mut reads: Vec<Tensor> = Vec::new();
        self.body.visit_exprs(&mut |e| {
            for (tensor, _) in e.loads() {
                if !reads.iter().any(|t| t.name() == tensor.name()) {
                    reads.push(tensor.clone());
                }
            }
        });
        reads
    }

    pub fn reads_tensor(&self, name: &str) -> bool {
        self.reads().iter().any(|t| t.name() == name)
    }

    /// Variables of enclosing loops that feed this block's bindings of `kind`.
    pub fn binding_vars(&self, kind: IterVarKind) -> Vec<Var> {
        let mut vars: Vec<Var> = Vec::new();
        for (iv, value) in self.iter_vars.iter().zip(&self.iter_values) {
            if iv.kind != kind {
                continue;
            }
            for v in value.vars() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        vars
    }

    /// Map from iteration variable to its binding.
    pub fn binding_map(&self) -> HashMap<Var, Expr> {
        self.iter_vars.iter().map(|iv| iv.var.clone()).zip(self.iter_values.iter().cloned()).collect()
    }

    /// Rewrite every load in `init` and `body`.
    pub fn map_loads(&self, f: &mut impl FnMut(&Tensor, &[Expr]) -> Option<Expr>) -> Self {
        Self {
            init: self.init.as_ref().map(|s| s.map_exprs(&mut |e| e.map_loads(&mut *f))),
            body: self.body.map_exprs(&mut |e| e.map_loads(&mut *f)),
            ..self.clone()
        }
    }

    /// Redirect stores to `from` (and reads of it) to `to`.
    pub fn retarget(&self, from: &str, to: &Tensor) -> Self {
        let remap = |s: &Arc<Stmt>| {
            s.transform(&mut |node| match node.as_ref() {
                Stmt::Store { tensor, indices, value } => Some(Arc::new(Stmt::Store {
                    tensor: if tensor.name() == from { to.clone() } else { tensor.clone() },
                    indices: indices.clone(),
                    value: value
                        .map_loads(&mut |t, idx| (t.name() == from).then(|| Expr::load(to, idx.iter().cloned()))),
                })),
                _ => None,
            })
        };
        let write = if self.write.name() == from { to.clone() } else { self.write.clone() };
        Self { init: self.init.as_ref().map(remap), body: remap(&self.body), write, ..self.clone() }
    }
}

impl Stmt {
    pub fn block(stmts: impl IntoIterator<Item = Arc<Stmt>>) -> Arc<Self> {
        Arc::new(Self::Block(stmts.into_iter().collect()))
    }

    pub fn store(tensor: &Tensor, indices: impl IntoIterator<Item = Expr>, value: Expr) -> Arc<Self> {
        Arc::new(Self::Store { tensor: tensor.clone(), indices: indices.into_iter().collect(), value })
    }

    pub fn as_for(&self) -> Option<&For> {
        match self {
            Self::For(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_schedule_block(&self) -> Option<&ScheduleBlock> {
        match self {
            Self::ScheduleBlock(b) => Some(b),
            _ => None,
        }
    }

    /// Structural children: schedule block bodies are not descended into.
    pub fn children(&self) -> SmallVec<[&Arc<Stmt>; 2]> {
        match self {
            Self::For(f) => smallvec::smallvec![&f.body],
            Self::Block(stmts) => stmts.iter().collect(),
            Self::IfThenElse { then_case, else_case, .. } => {
                let mut children = smallvec::smallvec![then_case];
                children.extend(else_case.iter());
                children
            }
            Self::ScheduleBlock(_) | Self::Store { .. } => SmallVec::new(),
        }
    }

    /// Rebuild with new structural children (same arity as [`Stmt::children`]).
    pub fn with_children(&self, mut children: Vec<Arc<Stmt>>) -> Stmt {
        match self {
            Self::For(f) => match children.pop() {
                Some(body) => Self::For(f.with_body(body)),
                None => self.clone(),
            },
            Self::Block(_) => Self::Block(children),
            Self::IfThenElse { cond, else_case, .. } => {
                let else_new = if else_case.is_some() { children.pop() } else { None };
                match children.pop() {
                    Some(then_case) => Self::IfThenElse { cond: cond.clone(), then_case, else_case: else_new },
                    None => self.clone(),
                }
            }
            Self::ScheduleBlock(_) | Self::Store { .. } => self.clone(),
        }
    }

    /// Bottom-up structural rewrite.
    ///
    /// `f` sees each node after its children were rewritten and returns a
    /// replacement or `None`. Unchanged subtrees keep their `Arc` identity.
    pub fn transform(self: &Arc<Self>, f: &mut impl FnMut(&Arc<Stmt>) -> Option<Arc<Stmt>>) -> Arc<Stmt> {
        let children = self.children();
        let node = if children.is_empty() {
            self.clone()
        } else {
            let new_children: Vec<Arc<Stmt>> = children.iter().map(|c| c.transform(f)).collect();
            if new_children.iter().zip(children.iter()).all(|(n, o)| Arc::ptr_eq(n, o)) {
                self.clone()
            } else {
                Arc::new(self.with_children(new_children))
            }
        };
        f(&node).unwrap_or(node)
    }

    /// Map every expression of a block body (store indices and values, guards).
    pub fn map_exprs(self: &Arc<Self>, f: &mut impl FnMut(&Expr) -> Expr) -> Arc<Stmt> {
        self.transform(&mut |node| match node.as_ref() {
            Stmt::Store { tensor, indices, value } => Some(Arc::new(Stmt::Store {
                tensor: tensor.clone(),
                indices: indices.iter().map(&mut *f).collect(),
                value: f(value),
            })),
            Stmt::IfThenElse { cond, then_case, else_case } => Some(Arc::new(Stmt::IfThenElse {
                cond: f(cond),
                then_case: then_case.clone(),
                else_case: else_case.clone(),
            })),
            _ => None,
        })
    }

    /// Visit every expression of a block body.
    pub fn visit_exprs(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Self::Store { indices, value, .. } => {
                indices.iter().for_each(&mut *f);
                f(value);
            }
            Self::IfThenElse { cond, .. } => f(cond),
            _ => {}
        }
        for child in self.children() {
            child.visit_exprs(f);
        }
    }

    /// All stores of a block body, in order.
    pub fn stores(&self) -> Vec<(&Tensor, &[Expr], &Expr)> {
        let mut stores = Vec::new();
        self.collect_stores(&mut stores);
        stores
    }

    fn collect_stores<'a>(&'a self, out: &mut Vec<(&'a Tensor, &'a [Expr], &'a Expr)>) {
        if let Self::Store { tensor, indices, value } = self {
            out.push((tensor, indices, value));
        }
        for child in self.children() {
            child.collect_stores(out);
        }
    }

    /// Substitute enclosing loop variables.
    ///
    /// Rewrites loop bounds, guard conditions and schedule block bindings.
    /// Block bodies never mention loop variables and are left alone.
    pub fn substitute_loop_vars(self: &Arc<Self>, map: &HashMap<Var, Expr>) -> Arc<Stmt> {
        if map.is_empty() {
            return self.clone();
        }
        self.transform(&mut |node| match node.as_ref() {
            Stmt::For(f) => Some(Arc::new(Stmt::For(For {
                min: simplify(&f.min.substitute(map)),
                extent: simplify(&f.extent.substitute(map)),
                ..f.clone()
            }))),
            Stmt::IfThenElse { cond, then_case, else_case } => Some(Arc::new(Stmt::IfThenElse {
                cond: simplify(&cond.substitute(map)),
                then_case: then_case.clone(),
                else_case: else_case.clone(),
            })),
            Stmt::ScheduleBlock(b) => Some(Arc::new(Stmt::ScheduleBlock(ScheduleBlock {
                iter_values: b.iter_values.iter().map(|v| simplify(&v.substitute(map))).collect(),
                ..b.clone()
            }))),
            _ => None,
        })
    }

    /// Drop empty sequences and loops whose body became empty.
    ///
    /// Returns `None` when the whole statement is empty.
    pub fn prune(self: &Arc<Self>) -> Option<Arc<Stmt>> {
        match self.as_ref() {
            Self::Block(stmts) => {
                let kept: Vec<Arc<Stmt>> = stmts.iter().filter_map(|s| s.prune()).collect();
                if kept.is_empty() {
                    None
                } else if kept.len() == stmts.len() && kept.iter().zip(stmts).all(|(a, b)| Arc::ptr_eq(a, b)) {
                    Some(self.clone())
                } else {
                    Some(Stmt::block(kept))
                }
            }
            Self::For(f) => {
                let body = f.body.prune()?;
                if Arc::ptr_eq(&body, &f.body) { Some(self.clone()) } else { Some(Arc::new(Self::For(f.with_body(body)))) }
            }
            Self::IfThenElse { cond, then_case, else_case } => {
                let then_new = then_case.prune();
                let else_new = else_case.as_ref().and_then(|e| e.prune());
                match (then_new, else_new) {
                    (None, None) => None,
                    (then_new, else_new) => Some(Arc::new(Self::IfThenElse {
                        cond: cond.clone(),
                        then_case: then_new.unwrap_or_else(|| Stmt::block([])),
                        else_case: else_new,
                    })),
                }
            }
            Self::ScheduleBlock(_) | Self::Store { .. } => Some(self.clone()),
        }
    }

    /// Skip single-statement sequence wrappers.
    pub fn unwrap_single(self: &Arc<Self>) -> &Arc<Stmt> {
        match self.as_ref() {
            Self::Block(stmts) if stmts.len() == 1 => stmts[0].unwrap_single(),
            _ => self,
        }
    }

    /// Loop ids in this subtree, pre-order.
    pub fn loop_ids(&self) -> Vec<LoopId> {
        let mut ids = Vec::new();
        self.walk(&mut |s| {
            if let Self::For(f) = s {
                ids.push(f.id);
            }
        });
        ids
    }

    /// Schedule blocks in this subtree, depth-first in program order.
    pub fn schedule_blocks(&self) -> Vec<&ScheduleBlock> {
        let mut blocks = Vec::new();
        self.walk(&mut |s| {
            if let Self::ScheduleBlock(b) = s {
                blocks.push(b);
            }
        });
        blocks
    }

    /// Pre-order structural walk.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}
