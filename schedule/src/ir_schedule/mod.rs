//! Schedule session over a loop-nest module.
//!
//! [`IrSchedule`] owns a [`ModuleExpr`] and the [`Target`] it is scheduled
//! for, and exposes the primitive rewrites. Every primitive takes node handles
//! (`Arc<Stmt>` snapshots obtained from `get_block`/`get_loops` or returned by
//! an earlier primitive), re-resolves them against the current tree (loops by
//! id, blocks by name), rewrites, and leaves the module semantically
//! equivalent to before. A failing primitive leaves the module untouched.
//!
//! # Primitives
//!
//! | Group | Primitives |
//! |-------|------------|
//! | Loop structure | `split`, `fuse`, `reorder` |
//! | Loop annotation | `bind`, `parallel`, `vectorize`, `unroll` |
//! | Compute location | `compute_at`, `simple_compute_at`, `compute_inline` |
//! | Storage | `cache_read`, `cache_write`, `set_buffer` |
//! | Reduction | `rfactor` |
//! | Module | `merge_exprs` |

mod annotate;
mod cache;
mod compute_location;
mod loop_transform;
mod rfactor;

use std::str::FromStr;
use std::sync::Arc;

use snafu::ensure;
use strata_ir::{Expr, For, IterVar, LoopId, MemoryScope, ModuleExpr, NameGen, NodePath, ScheduleBlock, Stmt, Tensor};
use tracing::trace;

use crate::error::*;
use crate::target::Target;

#[derive(Debug, Clone)]
pub struct IrSchedule {
    module: ModuleExpr,
    target: Target,
}

impl IrSchedule {
    pub fn new(module: ModuleExpr, target: Target) -> Self {
        Self { module, target }
    }

    pub fn module(&self) -> &ModuleExpr {
        &self.module
    }

    pub fn into_module(self) -> ModuleExpr {
        self.module
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get_all_blocks(&self) -> Vec<Arc<Stmt>> {
        self.module.get_all_blocks()
    }

    pub fn get_block(&self, name: &str) -> Result<Arc<Stmt>> {
        Ok(self.module.get_block(name)?)
    }

    /// Enclosing loops of `block`, outer to inner.
    pub fn get_loops(&self, block: &Arc<Stmt>) -> Result<Vec<Arc<Stmt>>> {
        let (_, b) = self.resolve_block(block)?;
        Ok(self.module.get_loops(&b.name)?)
    }

    pub fn get_loops_by_name(&self, name: &str) -> Result<Vec<Arc<Stmt>>> {
        Ok(self.module.get_loops(name)?)
    }

    /// The module root that contains `node`.
    pub fn get_root_block(&self, node: &Arc<Stmt>) -> Result<Arc<Stmt>> {
        Ok(self.module.root_of(node)?)
    }

    /// Flatten all module roots into a single sequence root. Idempotent.
    pub fn merge_exprs(&mut self) {
        let exprs = self.module.exprs();
        if exprs.len() == 1 && matches!(exprs[0].as_ref(), Stmt::Block(_)) {
            return;
        }
        let mut merged = Vec::new();
        for expr in exprs {
            match expr.as_ref() {
                Stmt::Block(stmts) => merged.extend(stmts.iter().cloned()),
                _ => merged.push(expr.clone()),
            }
        }
        self.module.set_exprs(vec![Stmt::block(merged)]);
        trace!(module.tree = %self.module.tree(), "merge_exprs complete");
    }

    // =========================================================================
    // Resolution helpers
    // =========================================================================

    fn resolve_loop(&self, handle: &Arc<Stmt>) -> Result<(NodePath, For)> {
        let Stmt::For(f) = handle.as_ref() else {
            return Err(strata_ir::Error::UnexpectedNode { expected: "loop", found: node_kind(handle) }.into());
        };
        let path = self.module.loop_path(f.id)?;
        let current = path.target().as_for().cloned().ok_or_else(|| {
            ScheduleError::from(strata_ir::Error::LoopNotFound { id: f.id })
        })?;
        Ok((path, current))
    }

    fn resolve_block(&self, handle: &Arc<Stmt>) -> Result<(NodePath, ScheduleBlock)> {
        let Stmt::ScheduleBlock(b) = handle.as_ref() else {
            return Err(strata_ir::Error::UnexpectedNode { expected: "schedule block", found: node_kind(handle) }.into());
        };
        let path = self.module.block_path(&b.name)?;
        let current = path.target().as_schedule_block().cloned().ok_or_else(|| {
            ScheduleError::from(strata_ir::Error::BlockNotFound { name: b.name.to_string() })
        })?;
        Ok((path, current))
    }

    fn loop_handle(&self, id: LoopId) -> Result<Arc<Stmt>> {
        Ok(self.module.get_loop(id)?)
    }

    fn parse_scope(&self, op: &'static str, scope: &str) -> Result<MemoryScope> {
        let scope = MemoryScope::from_str(scope).map_err(|_| InvalidScopeSnafu { scope }.build())?;
        ensure!(self.target.supports_scope(scope), UnsupportedScopeSnafu { op, scope });
        Ok(scope)
    }
}

fn node_kind(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::For(_) => "loop",
        Stmt::Block(_) => "sequence",
        Stmt::IfThenElse { .. } => "if",
        Stmt::ScheduleBlock(_) => "schedule block",
        Stmt::Store { .. } => "store",
    }
}

/// A full-shape copy `dst[v..] = src[v..]` wrapped in a fresh loop nest.
fn copy_nest(names: &mut NameGen, block_name: &str, dst: &Tensor, src: &Tensor, scope: MemoryScope) -> Arc<Stmt> {
    let iter_vars: Vec<IterVar> = dst
        .shape()
        .iter()
        .enumerate()
        .map(|(k, &e)| IterVar::spatial(strata_ir::Var::new(format!("v{k}")), e))
        .collect();
    let idx: Vec<Expr> = iter_vars.iter().map(|iv| Expr::var(&iv.var)).collect();
    let loop_vars: Vec<strata_ir::Var> =
        (0..dst.rank()).map(|k| names.var(&format!("{block_name}_ax{k}"))).collect();
    let block = Arc::new(Stmt::ScheduleBlock(ScheduleBlock {
        name: block_name.into(),
        iter_vars,
        iter_values: loop_vars.iter().map(Expr::var).collect(),
        write: dst.clone(),
        init: None,
        body: Stmt::store(dst, idx.iter().cloned(), Expr::load(src, idx.iter().cloned())),
        scope,
    }));
    wrap_loops(block, loop_vars.into_iter().zip(dst.shape().iter().copied()))
}

/// Nest `body` in fresh serial loops, the first pair outermost.
fn wrap_loops(body: Arc<Stmt>, loops: impl DoubleEndedIterator<Item = (strata_ir::Var, i64)>) -> Arc<Stmt> {
    loops.rev().fold(body, |body, (var, extent)| Arc::new(Stmt::For(For::new(var, extent, body))))
}

/// Prepend `stmt` to the body of loop `f`.
fn prepend_to_body(f: &For, stmt: Arc<Stmt>) -> Stmt {
    let body = match f.body.as_ref() {
        Stmt::Block(stmts) => Stmt::block(std::iter::once(stmt).chain(stmts.iter().cloned())),
        _ => Stmt::block([stmt, f.body.clone()]),
    };
    Stmt::For(f.with_body(body))
}
