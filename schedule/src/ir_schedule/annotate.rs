//! Loop kind and buffer annotations.

use std::str::FromStr;
use std::sync::Arc;

use snafu::ensure;
use strata_ir::{BindAxis, ForKind, ScheduleBlock, Stmt};
use tracing::trace;

use super::IrSchedule;
use crate::error::*;

impl IrSchedule {
    /// Bind `loop` to a GPU launch axis (`threadIdx.x` .. `blockIdx.z`).
    ///
    /// Fails when another loop on the same nest path (an ancestor or a
    /// descendant) is already bound to the axis. Only that path is checked:
    /// sibling nests of one kernel may both bind the same axis, so this is
    /// looser than a one-loop-per-axis rule over the whole kernel. Rebinding
    /// a loop replaces its previous binding.
    pub fn bind(&mut self, loop_: &Arc<Stmt>, axis: &str) -> Result<()> {
        let axis = BindAxis::from_str(axis).map_err(|_| InvalidBindAxisSnafu { axis }.build())?;
        let (path, f) = self.resolve_loop(loop_)?;

        let bound_here = |s: &Stmt| matches!(s, Stmt::For(other) if other.id != f.id && other.kind == ForKind::Bound(axis));
        let mut collision = path.nodes.iter().any(|n| bound_here(n.as_ref()));
        f.body.walk(&mut |s| collision |= bound_here(s));
        ensure!(!collision, BindCollisionSnafu { axis: axis.to_string(), id: f.id });

        self.set_kind(&path, &f, ForKind::Bound(axis))?;
        trace!(loop.id = %f.id, %axis, "bind complete");
        Ok(())
    }

    pub fn parallel(&mut self, loop_: &Arc<Stmt>) -> Result<()> {
        self.mutate_for_kind(loop_, ForKind::Parallel)
    }

    /// Mark `loop` vectorized; its extent must be a constant multiple of `factor`.
    pub fn vectorize(&mut self, loop_: &Arc<Stmt>, factor: usize) -> Result<()> {
        ensure!(factor > 0, InvalidArgumentSnafu { op: "vectorize", reason: "factor must be positive" });
        let (_, f) = self.resolve_loop(loop_)?;
        let extent = f.const_extent().ok_or_else(|| NonConstantExtentSnafu { op: "vectorize", id: f.id }.build())?;
        ensure!(extent % factor as i64 == 0, VectorizeFactorMismatchSnafu { id: f.id, extent, factor });
        self.mutate_for_kind(loop_, ForKind::Vectorized { factor })
    }

    pub fn unroll(&mut self, loop_: &Arc<Stmt>) -> Result<()> {
        let (_, f) = self.resolve_loop(loop_)?;
        ensure!(f.const_extent().is_some(), NonConstantExtentSnafu { op: "unroll", id: f.id });
        self.mutate_for_kind(loop_, ForKind::Unrolled)
    }

    /// Set the execution kind of `loop`, keeping its id and body.
    pub fn mutate_for_kind(&mut self, loop_: &Arc<Stmt>, kind: ForKind) -> Result<()> {
        let (path, f) = self.resolve_loop(loop_)?;
        self.set_kind(&path, &f, kind)?;
        trace!(loop.id = %f.id, %kind, "loop kind changed");
        Ok(())
    }

    /// Annotate the storage scope of the buffer `block` writes.
    pub fn set_buffer(&mut self, block: &Arc<Stmt>, scope: &str) -> Result<()> {
        let scope = self.parse_scope("set_buffer", scope)?;
        let (path, b) = self.resolve_block(block)?;
        self.module.replace(path.target(), Arc::new(Stmt::ScheduleBlock(ScheduleBlock { scope, ..b.clone() })))?;
        trace!(block = %b.name, %scope, "set_buffer complete");
        Ok(())
    }

    fn set_kind(&mut self, path: &strata_ir::NodePath, f: &strata_ir::For, kind: ForKind) -> Result<()> {
        Ok(self.module.replace(path.target(), Arc::new(Stmt::For(f.with_kind(kind))))?)
    }
}
