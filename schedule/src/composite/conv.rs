//! Direct convolution schedule for GPU targets.
//!
//! Expects the lowered `[pad, conv]` blocks, where `conv` reduces
//! `pad[n, rc, y + ry, x + rx] * weights[f, rc, ry, rx]` over `(rc, ry, rx)`
//! into an `[n, f, y, x]` output. Shapes with a tuned entry in the
//! [`ScheduleParams`] table get the tiled recipe with shared-memory staging
//! of both operands; every other shape gets a heuristic thread mapping.

use std::collections::HashSet;
use std::sync::Arc;

use snafu::ensure;
use strata_ir::{LoopId, Stmt, Tensor};
use tracing::{debug, info};

use super::heuristics::{inner_splitter, split_even};
use super::{expect_blocks, loop_of_iter_var, read_tensor, written_tensor};
use crate::error::*;
use crate::ir_schedule::IrSchedule;
use crate::params::{ParamEntry, ScheduleParams, conv_key};

/// Threads one GPU block may hold.
const MAX_THREADS: i64 = 1024;

/// Iteration variable indices of the reduction axes `(rc, ry, rx)`.
const REDUCE_AXES: [usize; 3] = [4, 5, 6];

#[tracing::instrument(skip_all)]
pub fn schedule_conv_gpu(sch: &mut IrSchedule, params: &ScheduleParams) -> Result<()> {
    let names = expect_blocks(sch, "schedule_conv_gpu", 2)?;
    let (pad_name, conv_name) = (names[0].as_str(), names[1].as_str());

    let pad = written_tensor(sch, pad_name)?;
    let output = written_tensor(sch, conv_name)?;
    let weights = read_tensor(sch, conv_name, 2)?;
    let input = read_tensor(sch, conv_name, 1)?;
    ensure!(
        input.name() == pad.name() && output.rank() == 4 && pad.rank() == 4 && weights.rank() == 4,
        InvalidArgumentSnafu {
            op: "schedule_conv_gpu",
            reason: format!("{conv_name} is not a 4-d convolution over {pad_name}"),
        }
    );

    let key = conv_key(pad.shape(), weights.shape(), output.shape());
    match params.get(&key) {
        Some(entry) => {
            debug!(%key, "found saved param");
            schedule_tuned(sch, pad_name, conv_name, entry)
        }
        None => {
            info!(%key, "didn't find saved param");
            schedule_fallback(sch, pad_name, conv_name, &pad, &output)
        }
    }
}

/// Heuristic mapping: filters over `blockIdx.z`/`threadIdx.z`, rows over
/// `blockIdx.y` and columns over `threadIdx.x`, accumulating in local memory.
fn schedule_fallback(sch: &mut IrSchedule, pad_name: &str, conv_name: &str, pad: &Tensor, output: &Tensor) -> Result<()> {
    let (c, h, w) = (output.shape()[1], output.shape()[2], output.shape()[3]);
    let rc = pad.shape()[1];

    let block = sch.get_block(pad_name)?;
    sch.compute_inline(&block)?;

    let mut f_inner = inner_splitter(c, h);
    let block_z = split_even(c / f_inner);
    let mut thread_z = c / f_inner / block_z;
    let rc_factor = split_even(rc);
    while w * thread_z > MAX_THREADS && thread_z % 2 == 0 {
        thread_z /= 2;
        f_inner *= 2;
    }
    ensure!(
        w * thread_z <= MAX_THREADS,
        InvalidArgumentSnafu {
            op: "schedule_conv_gpu",
            reason: format!("{w} columns times {thread_z} filter threads exceed one block"),
        }
    );

    let block = sch.get_block(conv_name)?;
    let local = sch.cache_write(&block, 0, "local")?;
    let local_name = block_name(&local)?;

    sch.split_at(conv_name, 1, &[-1, thread_z, f_inner])?;
    sch.reorder_at(conv_name, &[1, 4, 2, 5, 3])?;
    let loops = sch.get_loops_by_name(conv_name)?;
    sch.bind(&loops[1], "blockIdx.z")?;
    sch.bind(&loops[2], "blockIdx.y")?;
    sch.bind(&loops[3], "threadIdx.z")?;
    sch.bind(&loops[4], "threadIdx.x")?;
    sch.compute_at(&local, &loops[4])?;

    let rc_loop = loop_of_iter_var(sch, &local_name, REDUCE_AXES[0])?;
    sch.split(&rc_loop, &[-1, rc_factor])?;
    Ok(())
}

/// Tiled mapping driven by the `f`, `y`, `x` (four-way) and `rc`, `ry`,
/// `rx` (two-way) split factors of a tuned entry.
fn schedule_tuned(sch: &mut IrSchedule, pad_name: &str, conv_name: &str, entry: &ParamEntry) -> Result<()> {
    let (f, y, x) = (factors(entry, "f", 4)?, factors(entry, "y", 4)?, factors(entry, "x", 4)?);
    let (rc, ry, rx) = (factors(entry, "rc", 2)?, factors(entry, "ry", 2)?, factors(entry, "rx", 2)?);

    let block = sch.get_block(conv_name)?;
    let pad_shared = sch.cache_read(&block, 1, "shared")?;
    let pad_shared = block_name(&pad_shared)?;
    let weights_shared = sch.cache_read(&block, 2, "shared")?;
    let weights_shared = block_name(&weights_shared)?;
    let local = sch.cache_write(&block, 0, "local")?;
    let local_name = block_name(&local)?;
    let block = sch.get_block(pad_name)?;
    sch.compute_inline(&block)?;

    // Inner dimensions first so the outer loop indices stay put.
    for (index, factors) in [(3, x), (2, y), (1, f)] {
        sch.split_at(conv_name, index, &[-1, factors[1], factors[2], factors[3]])?;
    }
    sch.reorder_at(conv_name, &[0, 1, 5, 9, 2, 6, 10, 3, 7, 11, 4, 8, 12])?;

    let loops = sch.get_loops_by_name(conv_name)?;
    for (index, axis) in [(1, "blockIdx.z"), (2, "blockIdx.y"), (3, "blockIdx.x")] {
        sch.bind(&loops[index], axis)?;
    }
    for (index, axis) in [(7, "threadIdx.z"), (8, "threadIdx.y"), (9, "threadIdx.x")] {
        sch.bind(&loops[index], axis)?;
    }
    for tile in &loops[10..13] {
        sch.unroll(tile)?;
    }
    sch.compute_at(&local, &loops[9])?;

    let mut outer = Vec::with_capacity(3);
    let mut inner = Vec::with_capacity(3);
    let mut split_ids = Vec::with_capacity(6);
    for (axis, factors) in REDUCE_AXES.into_iter().zip([rc, ry, rx]) {
        let loop_ = loop_of_iter_var(sch, &local_name, axis)?;
        let split = sch.split(&loop_, &[-1, factors[1]])?;
        split_ids.extend(split.iter().filter_map(|l| l.as_for().map(|f| f.id)));
        outer.push(split[0].clone());
        inner.push(split[1].clone());
    }

    // Footprint loops of the local accumulator go below the reduction tiles.
    let shared: HashSet<LoopId> = loops.iter().filter_map(|l| l.as_for().map(|f| f.id)).collect();
    let footprint: Vec<Arc<Stmt>> = sch
        .get_loops_by_name(&local_name)?
        .into_iter()
        .filter(|l| l.as_for().is_some_and(|f| !shared.contains(&f.id) && !split_ids.contains(&f.id)))
        .collect();
    let order: Vec<Arc<Stmt>> = outer.iter().chain(&inner).chain(&footprint).cloned().collect();
    sch.reorder(&order)?;

    let rx_outer = &outer[2];
    for name in [pad_shared, weights_shared] {
        let block = sch.get_block(&name)?;
        sch.compute_at(&block, rx_outer)?;
    }
    Ok(())
}

fn factors<'a>(entry: &'a ParamEntry, role: &str, len: usize) -> Result<&'a [i64]> {
    entry.get(role).map(Vec::as_slice).filter(|f| f.len() == len).ok_or_else(|| {
        InvalidArgumentSnafu { op: "schedule_conv_gpu", reason: format!("param '{role}' needs {len} factors") }.build()
    })
}

fn block_name(block: &Arc<Stmt>) -> Result<String> {
    block.as_schedule_block().map(|b| b.name.to_string()).ok_or_else(|| {
        InvalidArgumentSnafu { op: "schedule_conv_gpu", reason: "handle is not a schedule block" }.build()
    })
}
