//! Loop structure primitives: split, fuse, reorder, and replaying one
//! block's loop nest onto another.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use snafu::ensure;
use strata_ir::{Expr, For, ForKind, LoopId, ScheduleBlock, Stmt, Var, simplify};
use tracing::trace;

use super::IrSchedule;
use crate::error::*;

impl IrSchedule {
    /// Split `loop` into `factors.len()` nested loops, outermost first.
    ///
    /// At most one factor may be `-1`; it is inferred by ceiling division.
    /// When the factors over-cover the extent, the innermost new loop is
    /// clipped to `min(f, extent - offset)` so no index past the original
    /// extent is visited. Returns the new loops.
    pub fn split(&mut self, loop_: &Arc<Stmt>, factors: &[i64]) -> Result<Vec<Arc<Stmt>>> {
        let (path, f) = self.resolve_loop(loop_)?;
        let extent = f.const_extent().ok_or_else(|| NonConstantExtentSnafu { op: "split", id: f.id }.build())?;
        let factors = infer_factors(factors, extent)?;

        let mut names = self.module.name_gen();
        let vars: Vec<Var> = (0..factors.len()).map(|k| names.var(&format!("{}_{k}", f.var))).collect();

        // index = min + sum(v_k * stride_k), stride_k = prod(factors[k+1..])
        let mut strides = vec![1i64; factors.len()];
        for k in (0..factors.len().saturating_sub(1)).rev() {
            strides[k] = strides[k + 1] * factors[k + 1];
        }
        let term = |k: usize| Expr::var(&vars[k]) * strides[k];
        let outer_offset =
            (0..factors.len() - 1).fold(Expr::int(0), |acc, k| acc + term(k));
        let index = simplify(&(f.min.clone() + outer_offset.clone() + Expr::var(&vars[factors.len() - 1])));

        let body = f.body.substitute_loop_vars(&HashMap::from([(f.var.clone(), index)]));

        let covered: i64 = factors.iter().product();
        let mut extents: Vec<Expr> = factors.iter().map(|&x| Expr::int(x)).collect();
        if covered != extent {
            let last = factors.len() - 1;
            extents[last] = simplify(&Expr::int(factors[last]).min(Expr::int(extent) - outer_offset));
        }

        let ids: Vec<LoopId> = (0..factors.len()).map(|_| LoopId::fresh()).collect();
        let new_nest = vars.iter().zip(&extents).zip(&ids).rev().fold(body, |body, ((var, extent), id)| {
            Arc::new(Stmt::For(For {
                id: *id,
                var: var.clone(),
                min: Expr::int(0),
                extent: extent.clone(),
                kind: ForKind::Serial,
                body,
            }))
        });

        self.module.replace(path.target(), new_nest)?;
        trace!(loop.id = %f.id, ?factors, module.tree = %self.module.tree(), "split complete");
        ids.into_iter().map(|id| self.loop_handle(id)).collect()
    }

    /// Split the `loop_index`-th enclosing loop of block `block_name`.
    pub fn split_at(&mut self, block_name: &str, loop_index: usize, factors: &[i64]) -> Result<Vec<Arc<Stmt>>> {
        let loop_ = self.nth_loop(block_name, loop_index)?;
        self.split(&loop_, factors)
    }

    /// Fuse a perfectly nested chain of loops (outer to inner) into one.
    ///
    /// The fused variable decomposes back as
    /// `v_k = min_k + (fused / prod(extents[k+1..])) % extent_k`.
    pub fn fuse(&mut self, loops: &[Arc<Stmt>]) -> Result<Arc<Stmt>> {
        ensure!(!loops.is_empty(), InvalidArgumentSnafu { op: "fuse", reason: "no loops given" });
        let (path, outer) = self.resolve_loop(&loops[0])?;
        if loops.len() == 1 {
            return Ok(path.target().clone());
        }

        let mut chain = vec![outer];
        for handle in &loops[1..] {
            let Stmt::For(next) = handle.as_ref() else {
                return InvalidArgumentSnafu { op: "fuse", reason: "handle is not a loop" }.fail();
            };
            let prev = &chain[chain.len() - 1];
            match prev.body.unwrap_single().as_ref() {
                Stmt::For(inner) if inner.id == next.id => chain.push(inner.clone()),
                _ => return NotPerfectlyNestedSnafu { op: "fuse" }.fail(),
            }
        }

        let mut extents = Vec::with_capacity(chain.len());
        for l in &chain {
            let e = l.const_extent().ok_or_else(|| NonConstantExtentSnafu { op: "fuse", id: l.id }.build())?;
            extents.push(e);
        }

        let mut names = self.module.name_gen();
        let joined: Vec<&str> = chain.iter().map(|l| l.var.name()).collect();
        let fused = names.var(&format!("{}_fused", joined.join("_")));

        let mut map = HashMap::new();
        let mut stride = 1i64;
        for (k, l) in chain.iter().enumerate().rev() {
            let quotient = if stride == 1 { Expr::var(&fused) } else { Expr::var(&fused) / stride };
            let value = if k == 0 { quotient } else { quotient % extents[k] };
            map.insert(l.var.clone(), simplify(&(l.min.clone() + value)));
            stride *= extents[k];
        }

        let innermost = &chain[chain.len() - 1];
        let body = innermost.body.substitute_loop_vars(&map);
        let fused_loop = For::new(fused, stride, body);
        let id = fused_loop.id;

        self.module.replace(path.target(), Arc::new(Stmt::For(fused_loop)))?;
        trace!(loop.id = %id, extent = stride, module.tree = %self.module.tree(), "fuse complete");
        self.loop_handle(id)
    }

    /// Fuse the enclosing loops of `block_name` at `loop_indices`.
    pub fn fuse_at(&mut self, block_name: &str, loop_indices: &[usize]) -> Result<Arc<Stmt>> {
        let loops = self.nth_loops(block_name, loop_indices)?;
        self.fuse(&loops)
    }

    /// Reorder loops of one perfectly nested chain.
    ///
    /// The given loops are assigned, in order, to the chain positions they
    /// occupy (sorted outer to inner); loops of the chain that are not given
    /// keep their position. Loop ids and kinds travel with the loops.
    ///
    /// This rewrite trusts the caller: it does not check that the new order
    /// respects data dependencies between iterations.
    pub fn reorder(&mut self, loops: &[Arc<Stmt>]) -> Result<()> {
        if loops.len() <= 1 {
            return Ok(());
        }
        let mut ids = Vec::with_capacity(loops.len());
        for handle in loops {
            let (_, f) = self.resolve_loop(handle)?;
            ids.push(f.id);
        }
        let unique: HashSet<LoopId> = ids.iter().copied().collect();
        ensure!(unique.len() == ids.len(), InvalidArgumentSnafu { op: "reorder", reason: "duplicate loops" });

        // The deepest loop's path must contain all others.
        let mut deepest = self.module.loop_path(ids[0])?;
        for &id in &ids[1..] {
            let p = self.module.loop_path(id)?;
            if p.nodes.len() > deepest.nodes.len() {
                deepest = p;
            }
        }
        ensure!(ids.iter().all(|&id| deepest.contains_loop(id)), NotPerfectlyNestedSnafu { op: "reorder" });

        let chain: Vec<&Arc<Stmt>> = deepest.nodes.iter().filter(|n| n.as_for().is_some()).collect();
        let is_selected = |s: &Arc<Stmt>| s.as_for().is_some_and(|f| unique.contains(&f.id));
        let first = chain.iter().position(|s| is_selected(*s)).unwrap_or(0);
        let last = chain.iter().rposition(|s| is_selected(*s)).unwrap_or(0);
        let segment: Vec<For> = chain[first..=last].iter().filter_map(|s| s.as_for().cloned()).collect();
        for pair in segment.windows(2) {
            let nested = matches!(pair[0].body.unwrap_single().as_ref(), Stmt::For(inner) if inner.id == pair[1].id);
            ensure!(nested, NotPerfectlyNestedSnafu { op: "reorder" });
        }

        let by_id: HashMap<LoopId, &For> = segment.iter().map(|f| (f.id, f)).collect();
        let mut given = ids.iter();
        let order: Vec<&For> = segment
            .iter()
            .map(|f| if unique.contains(&f.id) { given.next().and_then(|id| by_id.get(id).copied()).unwrap_or(f) } else { f })
            .collect();

        // Bounds may only mention loops that stay outside them.
        let mut defined: HashSet<Var> = HashSet::new();
        let segment_vars: HashSet<Var> = segment.iter().map(|f| f.var.clone()).collect();
        for f in &order {
            let uses = f.min.vars().into_iter().chain(f.extent.vars());
            for v in uses {
                ensure!(
                    !segment_vars.contains(&v) || defined.contains(&v),
                    InvalidArgumentSnafu { op: "reorder", reason: format!("bounds of {} depend on inner loop {v}", f.var) }
                );
            }
            defined.insert(f.var.clone());
        }

        let innermost_body = segment[segment.len() - 1].body.clone();
        let rebuilt = order.iter().rev().fold(innermost_body, |body, f| Arc::new(Stmt::For(f.with_body(body))));

        self.module.replace(chain[first], rebuilt)?;
        trace!(?ids, module.tree = %self.module.tree(), "reorder complete");
        Ok(())
    }

    /// Reorder the enclosing loops of `block_name` at `loop_indices`.
    pub fn reorder_at(&mut self, block_name: &str, loop_indices: &[usize]) -> Result<()> {
        let loops = self.nth_loops(block_name, loop_indices)?;
        self.reorder(&loops)
    }

    /// Give `block` the loop nest `block_target` ended up with.
    ///
    /// Both blocks must iterate the same domain. The target's loops that
    /// feed its bindings are copied outer to inner with fresh variables,
    /// keeping bounds and kinds, and replace the own nest of `block`, which
    /// takes the target's bindings.
    pub fn copy_transform_and_loop_info(&mut self, block: &Arc<Stmt>, block_target: &Arc<Stmt>) -> Result<()> {
        let (path, source) = self.resolve_block(block)?;
        let (target_path, target) = self.resolve_block(block_target)?;
        let name = source.name.to_string();
        let unsupported =
            |reason: String| UnsupportedBlockSnafu { op: "copy_transform_and_loop_info", block: &name, reason }.build();
        ensure!(
            source.name != target.name,
            InvalidArgumentSnafu { op: "copy_transform_and_loop_info", reason: format!("{name} is its own target") }
        );
        let domain = |b: &ScheduleBlock| b.iter_vars.iter().map(|iv| (iv.kind, iv.extent)).collect::<Vec<_>>();
        if domain(&source) != domain(&target) {
            return Err(unsupported(format!("iteration domain differs from {}", target.name)));
        }

        let own = path.own_depth();
        let bound: HashSet<Var> = source.iter_values.iter().flat_map(Expr::vars).collect();
        if let Some(shared) = path.nodes[..own].iter().filter_map(|n| n.as_for()).find(|f| bound.contains(&f.var)) {
            return Err(unsupported(format!("bound by loop {} shared with other blocks", shared.id)));
        }

        let used: HashSet<Var> = target.iter_values.iter().flat_map(Expr::vars).collect();
        let mut names = self.module.name_gen();
        let mut rename: HashMap<Var, Expr> = HashMap::new();
        let mut nest: Vec<For> = Vec::new();
        for f in target_path.loops().iter().filter_map(|l| l.as_for()).filter(|f| used.contains(&f.var)) {
            if let Some(v) = f.min.vars().into_iter().chain(f.extent.vars()).find(|v| !rename.contains_key(v)) {
                return Err(unsupported(format!("bounds of {} depend on {v}, which binds nothing", f.var)));
            }
            let base = match f.var.name().strip_prefix(&*target.name) {
                Some(rest) => format!("{name}{rest}"),
                None => format!("{name}_{}", f.var),
            };
            let var = names.var(&base);
            nest.push(For {
                id: LoopId::fresh(),
                var: var.clone(),
                min: simplify(&f.min.substitute(&rename)),
                extent: simplify(&f.extent.substitute(&rename)),
                kind: f.kind,
                body: Stmt::block([]),
            });
            rename.insert(f.var.clone(), Expr::var(&var));
        }

        let iter_values = target.iter_values.iter().map(|v| simplify(&v.substitute(&rename))).collect();
        let moved = Arc::new(Stmt::ScheduleBlock(ScheduleBlock { iter_values, ..source }));
        let rebuilt = nest.iter().rev().fold(moved, |body, f| Arc::new(Stmt::For(f.with_body(body))));

        self.module.replace(&path.nodes[own], rebuilt)?;
        trace!(block = %name, target = %target.name, loops = nest.len(), module.tree = %self.module.tree(), "copy_transform_and_loop_info complete");
        Ok(())
    }

    pub fn copy_transform_and_loop_info_by_name(&mut self, block_name: &str, target_name: &str) -> Result<()> {
        let block = self.get_block(block_name)?;
        let target = self.get_block(target_name)?;
        self.copy_transform_and_loop_info(&block, &target)
    }

    pub(crate) fn nth_loop(&self, block_name: &str, index: usize) -> Result<Arc<Stmt>> {
        let loops = self.get_loops_by_name(block_name)?;
        let count = loops.len();
        loops.into_iter().nth(index).ok_or_else(|| {
            InvalidArgumentSnafu { op: "get_loops", reason: format!("block {block_name} has {count} loops, index {index}") }
                .build()
        })
    }

    fn nth_loops(&self, block_name: &str, indices: &[usize]) -> Result<Vec<Arc<Stmt>>> {
        indices.iter().map(|&i| self.nth_loop(block_name, i)).collect()
    }
}

/// Validate split factors against `extent` and resolve a `-1` entry.
fn infer_factors(factors: &[i64], extent: i64) -> Result<Vec<i64>> {
    let invalid = || InvalidSplitFactorsSnafu { factors: factors.to_vec(), extent }.build();
    let inferred = factors.iter().filter(|&&f| f == -1).count();
    if factors.is_empty() || inferred > 1 || factors.iter().any(|&f| f == 0 || f < -1) {
        return Err(invalid());
    }
    let known: i64 = factors.iter().filter(|&&f| f != -1).product();
    if inferred == 1 {
        let missing = (extent + known - 1) / known;
        return Ok(factors.iter().map(|&f| if f == -1 { missing.max(1) } else { f }).collect());
    }
    if known < extent {
        return Err(invalid());
    }
    Ok(factors.to_vec())
}
