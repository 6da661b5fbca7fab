//! Compute location primitives: compute_at, simple_compute_at, compute_inline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use snafu::ensure;
use strata_ir::{Affine, Expr, For, IterVar, ScheduleBlock, Stmt, Var, simplify};
use tracing::trace;

use super::{IrSchedule, prepend_to_body};
use crate::error::*;

/// Footprint of one tensor dimension as seen from a loop.
#[derive(Debug, Clone, PartialEq)]
enum Region {
    /// The whole dimension.
    Full,
    /// `base + [lo, hi]`, where `base` only mentions loops at or above the
    /// compute location.
    Window { base: Affine, lo: i64, hi: i64 },
    /// A single index fixed by the loops at or above the compute location.
    Point(Expr),
}

impl Region {
    fn union(self, other: Region) -> Region {
        match (self, other) {
            (Region::Window { base: a, lo: lo_a, hi: hi_a }, Region::Window { base: b, lo: lo_b, hi: hi_b }) if a == b => {
                Region::Window { base: a, lo: lo_a.min(lo_b), hi: hi_a.max(hi_b) }
            }
            (Region::Point(a), Region::Point(b)) if a == b => Region::Point(a),
            _ => Region::Full,
        }
    }
}

impl IrSchedule {
    /// Move `block` under `loop`, computing only what the consumers below
    /// `loop` read in one of its iterations.
    ///
    /// The footprint is derived from an affine analysis of the consumers'
    /// load indices; a dimension that cannot be bounded that way is
    /// recomputed in full. Reduce iteration variables of the producer get
    /// loops over their full extent. Fails when no block under `loop` reads
    /// the produced tensor, when a reader lives outside `loop`, or when the
    /// producer reads something those consumers write.
    pub fn compute_at(&mut self, block: &Arc<Stmt>, loop_: &Arc<Stmt>) -> Result<()> {
        let (bpath, producer) = self.resolve_block(block)?;
        let (lpath, target) = self.resolve_loop(loop_)?;
        let name = producer.name.to_string();
        ensure!(
            !bpath.contains_loop(target.id),
            InvalidArgumentSnafu { op: "compute_at", reason: format!("block {name} is already under loop {}", target.id) }
        );

        let spatial: Vec<&IterVar> = producer.iter_vars.iter().filter(|iv| !iv.is_reduce()).collect();
        check_canonical_stores(&producer, &spatial, "compute_at")?;

        let tensor = producer.write.name().to_string();
        let consumers: Vec<ScheduleBlock> =
            target.body.schedule_blocks().into_iter().filter(|b| b.reads_tensor(&tensor)).cloned().collect();
        ensure!(
            !consumers.is_empty(),
            DependencyViolationSnafu { op: "compute_at", block: &name, reason: format!("no reader of {tensor} under loop {}", target.id) }
        );
        let readers_total = self
            .get_all_blocks()
            .iter()
            .filter_map(|b| b.as_schedule_block())
            .filter(|b| b.name != producer.name && b.reads_tensor(&tensor))
            .count();
        ensure!(
            readers_total == consumers.len(),
            DependencyViolationSnafu { op: "compute_at", block: &name, reason: format!("{tensor} is also read outside loop {}", target.id) }
        );
        let consumer_writes: HashSet<&str> = consumers.iter().map(|c| c.write.name()).collect();
        if let Some(t) = producer.reads().iter().find(|t| consumer_writes.contains(t.name())) {
            return DependencyViolationSnafu {
                op: "compute_at",
                block: &name,
                reason: format!("producer reads {} written by a consumer", t.name()),
            }
            .fail();
        }

        let mut chain: HashSet<Var> = lpath.loops().iter().filter_map(|l| l.as_for().map(|f| f.var.clone())).collect();
        chain.insert(target.var.clone());

        let shape = producer.write.shape().to_vec();
        let mut regions: Vec<Option<Region>> = vec![None; shape.len()];
        for consumer in &consumers {
            let inner = self.inner_ranges(&consumer.name, &target, &chain)?;
            let bindings = consumer.binding_map();
            let mut accesses: Vec<Vec<Expr>> = Vec::new();
            let mut collect = |e: &Expr| {
                for (t, idx) in e.loads() {
                    if t.name() == tensor {
                        accesses.push(idx.iter().map(|i| simplify(&i.substitute(&bindings))).collect());
                    }
                }
            };
            consumer.body.visit_exprs(&mut collect);
            if let Some(init) = &consumer.init {
                init.visit_exprs(&mut collect);
            }
            for idx in accesses {
                for (dim, index) in idx.iter().enumerate().take(shape.len()) {
                    let region = footprint(index, &chain, &inner);
                    regions[dim] = Some(match regions[dim].take() {
                        Some(r) => r.union(region),
                        None => region,
                    });
                }
            }
        }

        let mut names = self.module.name_gen();
        let mut loops: Vec<(Var, i64)> = Vec::new();
        let mut spatial_values = Vec::with_capacity(spatial.len());
        for (dim, &extent) in shape.iter().enumerate() {
            let (base, len) = match regions[dim].clone().unwrap_or(Region::Full) {
                Region::Window { base, lo, hi } if hi - lo + 1 < extent => {
                    (base.plus(&Affine::constant(lo), 1).to_expr(), hi - lo + 1)
                }
                Region::Point(index) => (index, 1),
                _ => (Expr::int(0), extent),
            };
            if len == 1 {
                spatial_values.push(simplify(&base));
            } else {
                let v = names.var(&format!("{name}_ax{dim}"));
                spatial_values.push(simplify(&(base + Expr::var(&v))));
                loops.push((v, len));
            }
        }
        let mut spatial_values = spatial_values.into_iter();
        let mut iter_values = Vec::with_capacity(producer.iter_vars.len());
        for (k, iv) in producer.iter_vars.iter().enumerate() {
            if iv.is_reduce() {
                let v = names.var(&format!("{name}_r{k}"));
                iter_values.push(Expr::var(&v));
                loops.push((v, iv.extent));
            } else {
                iter_values.push(spatial_values.next().unwrap_or_else(|| Expr::int(0)));
            }
        }

        let moved = Arc::new(Stmt::ScheduleBlock(ScheduleBlock { iter_values, ..producer.clone() }));
        let nest = super::wrap_loops(moved, loops.into_iter());

        let mut module = self.module.clone();
        module.remove(bpath.target())?;
        let target_now = module.loop_path(target.id)?;
        let Some(f) = target_now.target().as_for() else {
            return Err(strata_ir::Error::LoopNotFound { id: target.id }.into());
        };
        module.replace(target_now.target(), Arc::new(prepend_to_body(f, nest)))?;
        self.module = module;

        trace!(block = %name, loop.id = %target.id, module.tree = %self.module.tree(), "compute_at complete");
        Ok(())
    }

    /// Move `block` under `loop` by identifying the producer's outer loops
    /// with the loop chain ending at `loop`.
    ///
    /// The producer's first `depth + 1` own loops must be perfectly nested
    /// and match the bounds of the target chain; everything below them moves
    /// along. No dependency check is done.
    pub fn simple_compute_at(&mut self, block: &Arc<Stmt>, loop_: &Arc<Stmt>) -> Result<()> {
        let (bpath, producer) = self.resolve_block(block)?;
        let (lpath, target) = self.resolve_loop(loop_)?;
        let name = producer.name.to_string();
        ensure!(
            !bpath.contains_loop(target.id),
            InvalidArgumentSnafu { op: "simple_compute_at", reason: format!("block {name} is already under loop {}", target.id) }
        );

        let shared: HashSet<_> = lpath.loops().iter().filter_map(|l| l.as_for().map(|f| f.id)).collect();
        let own: Vec<For> =
            bpath.loops().iter().filter_map(|l| l.as_for().cloned()).filter(|f| !shared.contains(&f.id)).collect();
        let mut chain: Vec<For> =
            lpath.loops().iter().filter_map(|l| l.as_for().cloned()).filter(|f| !bpath.contains_loop(f.id)).collect();
        chain.push(target.clone());

        ensure!(
            own.len() >= chain.len(),
            UnsupportedBlockSnafu {
                op: "simple_compute_at",
                block: &name,
                reason: format!("block has {} own loops, target depth is {}", own.len(), chain.len()),
            }
        );
        // Bounds match once the producer's loop variables are renamed to the
        // target chain's, which also accepts identically clipped split loops.
        let mut map = HashMap::new();
        for (p, l) in own.iter().zip(&chain) {
            let same_min = simplify(&p.min.substitute(&map)) == simplify(&l.min);
            let same_extent = simplify(&p.extent.substitute(&map)) == simplify(&l.extent);
            ensure!(
                same_min && same_extent,
                UnsupportedBlockSnafu {
                    op: "simple_compute_at",
                    block: &name,
                    reason: format!("bounds of {} do not match {}", p.var, l.var),
                }
            );
            map.insert(p.var.clone(), Expr::var(&l.var));
        }

        let depth = chain.len() - 1;
        for pair in own[..=depth].windows(2) {
            let nested = pair[0].body.unwrap_single().as_for().is_some_and(|inner| inner.id == pair[1].id);
            ensure!(nested, NotPerfectlyNestedSnafu { op: "simple_compute_at" });
        }
        let outer_stmt = self.module.get_loop(own[0].id)?;
        let moved = own[depth].body.substitute_loop_vars(&map);

        let mut module = self.module.clone();
        module.remove(&outer_stmt)?;
        let target_now = module.loop_path(target.id)?;
        let Some(f) = target_now.target().as_for() else {
            return Err(strata_ir::Error::LoopNotFound { id: target.id }.into());
        };
        module.replace(target_now.target(), Arc::new(prepend_to_body(f, moved)))?;
        self.module = module;

        trace!(block = %name, loop.id = %target.id, module.tree = %self.module.tree(), "simple_compute_at complete");
        Ok(())
    }

    /// Replace every read of the tensor `block` writes by its defining
    /// expression and remove the block.
    ///
    /// The block must be a non-reduction with a single store indexed by its
    /// iteration variables (each exactly once), must not read its own output,
    /// and must be the only writer of that tensor.
    pub fn compute_inline(&mut self, block: &Arc<Stmt>) -> Result<()> {
        let (bpath, producer) = self.resolve_block(block)?;
        let name = producer.name.to_string();
        let unsupported = |reason: &str| UnsupportedBlockSnafu { op: "compute_inline", block: &name, reason }.build();

        if producer.is_reduction() {
            return Err(unsupported("reduction blocks cannot be inlined"));
        }
        let stores = producer.body.stores();
        let [(tensor, indices, value)] = stores.as_slice() else {
            return Err(unsupported("block must contain exactly one store"));
        };
        let params: Vec<Var> = indices.iter().filter_map(|i| i.as_var().cloned()).collect();
        let distinct: HashSet<&Var> = params.iter().collect();
        let iter_vars: HashSet<&Var> = producer.iter_vars.iter().map(|iv| &iv.var).collect();
        if params.len() != indices.len() || distinct.len() != params.len() || distinct != iter_vars {
            return Err(unsupported("store indices must be the block's iteration variables"));
        }
        let target = tensor.name().to_string();
        if value.loads().iter().any(|(t, _)| t.name() == target) {
            return Err(unsupported("block reads its own output"));
        }

        let others: Vec<ScheduleBlock> = self
            .get_all_blocks()
            .iter()
            .filter_map(|b| b.as_schedule_block().cloned())
            .filter(|b| b.name != producer.name)
            .collect();
        if others.iter().any(|b| b.write.name() == target) {
            return Err(unsupported("tensor has another writer"));
        }
        let consumers: Vec<&ScheduleBlock> = others.iter().filter(|b| b.reads_tensor(&target)).collect();
        if consumers.is_empty() {
            return Err(unsupported("tensor has no reader"));
        }

        let value = (*value).clone();
        let mut module = self.module.clone();
        module.remove(bpath.target())?;
        for consumer in consumers {
            let rewritten = consumer.map_loads(&mut |t, idx| {
                (t.name() == target).then(|| {
                    let map: HashMap<Var, Expr> = params.iter().cloned().zip(idx.iter().cloned()).collect();
                    simplify(&value.substitute(&map))
                })
            });
            let path = module.block_path(&consumer.name)?;
            module.replace(path.target(), Arc::new(Stmt::ScheduleBlock(rewritten)))?;
        }
        self.module = module;

        trace!(block = %name, module.tree = %self.module.tree(), "compute_inline complete");
        Ok(())
    }

    /// Constant ranges of the loops between `target` and the block `name`.
    ///
    /// Loops whose bounds are not constant are left out, which makes any
    /// index mentioning them fall back to the full dimension.
    fn inner_ranges(&self, name: &str, target: &For, chain: &HashSet<Var>) -> Result<HashMap<Var, (i64, i64)>> {
        let path = self.module.block_path(name)?;
        let below = path.nodes.iter().skip_while(|n| !n.as_for().is_some_and(|f| f.id == target.id)).skip(1);
        let mut ranges = HashMap::new();
        for node in below {
            if let Stmt::For(f) = node.as_ref()
                && !chain.contains(&f.var)
                && let (Some(min), Some(extent)) = (f.min.as_int(), f.const_extent())
                && extent > 0
            {
                ranges.insert(f.var.clone(), (min, min + extent - 1));
            }
        }
        Ok(ranges)
    }
}

/// Require every store to write the block's tensor at its spatial iteration
/// variables, in order.
pub(super) fn check_canonical_stores(block: &ScheduleBlock, spatial: &[&IterVar], op: &'static str) -> Result<()> {
    let canonical = |indices: &[Expr]| {
        indices.len() == spatial.len() && indices.iter().zip(spatial).all(|(i, iv)| i.as_var() == Some(&iv.var))
    };
    let stmts = block.init.iter().chain(std::iter::once(&block.body));
    for stmt in stmts {
        for (tensor, indices, _) in stmt.stores() {
            ensure!(
                tensor.name() == block.write.name() && canonical(indices),
                UnsupportedBlockSnafu {
                    op,
                    block: block.name.to_string(),
                    reason: "stores must write the block tensor at its spatial iteration variables",
                }
            );
        }
    }
    Ok(())
}

/// Region of one index expression: chain variables stay symbolic, inner
/// loops contribute their constant range.
fn footprint(index: &Expr, chain: &HashSet<Var>, inner: &HashMap<Var, (i64, i64)>) -> Region {
    let Some(affine) = Affine::of(index) else {
        let fixed = index.loads().is_empty() && index.vars().iter().all(|v| chain.contains(v));
        return if fixed { Region::Point(index.clone()) } else { Region::Full };
    };
    let (mut base, rest) = affine.partition(|v| chain.contains(v));
    let (mut lo, mut hi) = (0i64, 0i64);
    for (v, c) in &rest.terms {
        let Some(&(min, max)) = inner.get(v) else {
            return Region::Full;
        };
        let (a, b) = (c * min, c * max);
        lo += a.min(b);
        hi += a.max(b);
    }
    base.terms.sort_by(|x, y| x.0.cmp(&y.0));
    Region::Window { base, lo, hi }
}
