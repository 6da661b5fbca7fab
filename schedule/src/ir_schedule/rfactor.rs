//! Reduction factorization.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use snafu::ensure;
use strata_ir::{Expr, For, IterVar, IterVarKind, ReduceKind, ScheduleBlock, Stmt, Tensor, Var, simplify};
use tracing::trace;

use super::compute_location::check_canonical_stores;
use super::{IrSchedule, wrap_loops};
use crate::error::*;

impl IrSchedule {
    /// Factor the reduction fed by `loop` into a partial and a final pass.
    ///
    /// The partial block `<tensor>_rf` keeps the loop nest and turns `loop`
    /// into a spatial dimension inserted at `rf_axis` of the partial tensor;
    /// every other loop feeding the reduction stays a reduction. A final
    /// block, keeping the original block name, reduces the partial tensor
    /// over the new axis in a fresh nest placed right after the partial
    /// block's own loop nest.
    /// Returns the partial block.
    pub fn rfactor(&mut self, loop_: &Arc<Stmt>, rf_axis: usize) -> Result<Arc<Stmt>> {
        let (_, target) = self.resolve_loop(loop_)?;
        let fed: Vec<ScheduleBlock> = target
            .body
            .schedule_blocks()
            .into_iter()
            .filter(|b| b.binding_vars(IterVarKind::Reduce).contains(&target.var))
            .cloned()
            .collect();
        let [block] = fed.as_slice() else {
            return InvalidArgumentSnafu {
                op: "rfactor",
                reason: format!("loop {} feeds {} reductions, expected one", target.id, fed.len()),
            }
            .fail();
        };
        let name = block.name.to_string();
        let unsupported = |reason: String| UnsupportedBlockSnafu { op: "rfactor", block: &name, reason }.build();

        let output = block.write.clone();
        ensure!(
            rf_axis <= output.rank(),
            InvalidArgumentSnafu { op: "rfactor", reason: format!("axis {rf_axis} is out of range for rank {}", output.rank() + 1) }
        );
        let extent = target.const_extent().ok_or_else(|| NonConstantExtentSnafu { op: "rfactor", id: target.id }.build())?;

        let spatial: Vec<&IterVar> = block.iter_vars.iter().filter(|iv| !iv.is_reduce()).collect();
        check_canonical_stores(block, &spatial, "rfactor")?;
        let (kind, rhs) = combiner_update(block).ok_or_else(|| unsupported("body is not a single combiner update".into()))?;

        let contributing = block.binding_vars(IterVarKind::Reduce);
        let spatial_vars: HashSet<Var> = block.binding_vars(IterVarKind::Spatial).into_iter().collect();
        if let Some(v) = contributing.iter().find(|v| spatial_vars.contains(*v)) {
            return Err(unsupported(format!("loop variable {v} feeds both spatial and reduce bindings")));
        }

        let path = self.module.block_path(&name)?;
        let loops: HashMap<Var, For> =
            path.loops().iter().filter_map(|l| l.as_for()).map(|f| (f.var.clone(), f.clone())).collect();

        // Partial block iteration domain: original spatial vars, the factored
        // axis, one reduce var per remaining contributing loop.
        let mut taken: HashSet<String> = block.iter_vars.iter().map(|iv| iv.var.name().to_string()).collect();
        let mut fresh_iter = |base: &str| {
            let mut candidate = base.to_string();
            let mut n = 0;
            while taken.contains(&candidate) {
                n += 1;
                candidate = format!("{base}_{n}");
            }
            taken.insert(candidate.clone());
            Var::new(candidate)
        };

        let rf_var = fresh_iter("rf");
        let mut loop_to_iter: HashMap<Var, Expr> =
            HashMap::from([(target.var.clone(), simplify(&(Expr::var(&rf_var) + target.min.clone())))]);
        let mut iter_vars: Vec<IterVar> = spatial.iter().map(|iv| (*iv).clone()).collect();
        let mut iter_values: Vec<Expr> = block
            .iter_vars
            .iter()
            .zip(&block.iter_values)
            .filter(|(iv, _)| !iv.is_reduce())
            .map(|(_, value)| value.clone())
            .collect();
        iter_vars.push(IterVar::spatial(rf_var.clone(), extent));
        iter_values.push(simplify(&(Expr::var(&target.var) - target.min.clone())));

        for v in contributing.iter().filter(|v| **v != target.var) {
            let f = loops.get(v).ok_or_else(|| unsupported(format!("{v} is not an enclosing loop")))?;
            let e = f.max_extent().ok_or_else(|| NonConstantExtentSnafu { op: "rfactor", id: f.id }.build())?;
            let iv = fresh_iter(&format!("{v}_r"));
            loop_to_iter.insert(v.clone(), Expr::var(&iv));
            iter_vars.push(IterVar::reduce(iv, e));
            iter_values.push(Expr::var(v));
        }

        let reduce_map: HashMap<Var, Expr> = block
            .iter_vars
            .iter()
            .zip(&block.iter_values)
            .filter(|(iv, _)| iv.is_reduce())
            .map(|(iv, value)| (iv.var.clone(), simplify(&value.substitute(&loop_to_iter))))
            .collect();
        let rhs = simplify(&rhs.substitute(&reduce_map));

        let mut names = self.module.name_gen();
        let rf_name = names.block_and_tensor(&format!("{}_rf", output.name()));
        let mut rf_shape = output.shape().to_vec();
        rf_shape.insert(rf_axis, extent);
        let rf_tensor = output.renamed(rf_name.as_str()).with_shape(rf_shape);

        let mut rf_index: Vec<Expr> = spatial.iter().map(|iv| Expr::var(&iv.var)).collect();
        rf_index.insert(rf_axis, Expr::var(&rf_var));
        let still_reducing = iter_vars.iter().any(IterVar::is_reduce);
        let (init, body) = if still_reducing {
            let acc = Expr::load(&rf_tensor, rf_index.iter().cloned());
            (
                Some(Stmt::store(&rf_tensor, rf_index.iter().cloned(), kind.identity())),
                Stmt::store(&rf_tensor, rf_index.iter().cloned(), Expr::binary(kind.combiner(), acc, rhs)),
            )
        } else {
            (None, Stmt::store(&rf_tensor, rf_index.iter().cloned(), rhs))
        };
        let partial = ScheduleBlock {
            name: rf_name.as_str().into(),
            iter_vars,
            iter_values,
            write: rf_tensor.clone(),
            init,
            body,
            scope: block.scope,
        };

        let final_nest = final_block(&mut names, block, &spatial, &rf_tensor, rf_axis, extent, kind);

        let mut module = self.module.clone();
        module.replace(path.target(), Arc::new(Stmt::ScheduleBlock(partial)))?;
        let anchor = module.block_path(&rf_name)?;
        module.insert_beside(&anchor, final_nest, true)?;
        self.module = module;

        trace!(block = %name, loop.id = %target.id, rf_axis, module.tree = %self.module.tree(), "rfactor complete");
        Ok(self.module.get_block(&rf_name)?)
    }
}

/// `T[i] = op(T[i], rhs)` with a reduction combiner: returns the kind and `rhs`.
fn combiner_update(block: &ScheduleBlock) -> Option<(ReduceKind, Expr)> {
    let stores = block.body.stores();
    let [(tensor, indices, value)] = stores.as_slice() else {
        return None;
    };
    let Expr::Binary(op, lhs, rhs) = value else {
        return None;
    };
    let kind = ReduceKind::from_combiner(*op)?;
    let is_acc = |e: &Expr| matches!(e, Expr::Load { tensor: t, indices: idx } if t.name() == tensor.name() && idx.as_slice() == *indices);
    let reads_output = |e: &Expr| e.loads().iter().any(|(t, _)| t.name() == tensor.name());
    if is_acc(lhs.as_ref()) && !reads_output(rhs.as_ref()) {
        Some((kind, (**rhs).clone()))
    } else if is_acc(rhs.as_ref()) && !reads_output(lhs.as_ref()) && op.is_commutative() {
        Some((kind, (**lhs).clone()))
    } else {
        None
    }
}

/// `T[v..] = op(T[v..], T_rf[v.., rf, ..])` over the output shape, starting
/// from the original block's init.
fn final_block(
    names: &mut strata_ir::NameGen,
    block: &ScheduleBlock,
    spatial: &[&IterVar],
    rf_tensor: &Tensor,
    rf_axis: usize,
    extent: i64,
    kind: ReduceKind,
) -> Arc<Stmt> {
    let output = &block.write;
    let taken: HashSet<&str> = spatial.iter().map(|iv| iv.var.name()).collect();
    let mut rf_name = String::from("rf");
    while taken.contains(rf_name.as_str()) {
        rf_name.push('_');
    }
    let rf = Var::new(rf_name);

    let idx: Vec<Expr> = spatial.iter().map(|iv| Expr::var(&iv.var)).collect();
    let mut partial_idx = idx.clone();
    partial_idx.insert(rf_axis, Expr::var(&rf));
    let update = Stmt::store(
        output,
        idx.iter().cloned(),
        Expr::binary(kind.combiner(), Expr::load(output, idx.iter().cloned()), Expr::load(rf_tensor, partial_idx)),
    );

    let mut loops: Vec<(Var, i64)> = spatial
        .iter()
        .enumerate()
        .map(|(k, iv)| (names.var(&format!("{}_i{k}", block.name)), iv.extent))
        .collect();
    loops.push((names.var(&format!("{}_rf", block.name)), extent));

    let mut iter_vars: Vec<IterVar> = spatial.iter().map(|iv| (*iv).clone()).collect();
    iter_vars.push(IterVar::reduce(rf, extent));

    let combined = ScheduleBlock {
        name: block.name.clone(),
        iter_vars,
        iter_values: loops.iter().map(|(v, _)| Expr::var(v)).collect(),
        write: output.clone(),
        init: block.init.clone(),
        body: update,
        scope: block.scope,
    };
    wrap_loops(Arc::new(Stmt::ScheduleBlock(combined)), loops.into_iter())
}
