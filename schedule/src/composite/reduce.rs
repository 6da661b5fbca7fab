//! GPU reduction schedules.
//!
//! The block-reduce family schedules a reduction that has already been split
//! by the lowering into a per-thread stage and a combining stage: temporary
//! stages are kept in fast memory and computed inside the loop that drives
//! the final output, so one GPU block owns one output row.

use snafu::ensure;
use strata_ir::Tensor;

use super::{block_names, expect_blocks, loop_extent};
use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Largest thread block the reduction schedules emit.
const MAX_BLOCK_SIZE: i64 = 1024;

/// Reduction over the last `last_dimension_num` output dimensions.
///
/// Those dimensions are fused and spread over `threadIdx.x` (capped at 1024
/// threads with a serial outer loop); the leading dimensions are fused onto
/// `blockIdx.x`.
#[tracing::instrument(skip_all, fields(shape = ?output_shape, last_dimension_num))]
pub fn schedule_reduce_gpu(sch: &mut IrSchedule, output_shape: &[i64], last_dimension_num: usize) -> Result<()> {
    let rank = output_shape.len();
    ensure!(
        (1..=rank).contains(&last_dimension_num),
        InvalidArgumentSnafu {
            op: "schedule_reduce_gpu",
            reason: format!("{last_dimension_num} trailing dimensions of a rank {rank} output"),
        }
    );
    let Some(name) = block_names(sch).pop() else {
        return InvalidArgumentSnafu { op: "schedule_reduce_gpu", reason: "module has no blocks" }.fail();
    };

    let index = rank - last_dimension_num;
    let parallel_threads: i64 = output_shape[index..].iter().product();
    for _ in index..rank - 1 {
        sch.fuse_at(&name, &[index, index + 1])?;
    }

    if parallel_threads > MAX_BLOCK_SIZE {
        let split = sch.split_at(&name, index, &[-1, MAX_BLOCK_SIZE])?;
        sch.bind(&split[1], "threadIdx.x")?;
    } else {
        let threads = sch.nth_loop(&name, index)?;
        sch.bind(&threads, "threadIdx.x")?;
    }

    for _ in 0..index.saturating_sub(1) {
        sch.fuse_at(&name, &[0, 1])?;
    }
    if index > 0 {
        let blocks = sch.nth_loop(&name, 0)?;
        sch.bind(&blocks, "blockIdx.x")?;
    }
    Ok(())
}

/// Two-stage block reduction: `tmp_out` holds per-thread partials, `out`
/// combines them.
#[tracing::instrument(skip_all, fields(tmp = %tmp_out.name(), out = %out.name()))]
pub fn schedule_block_reduce_internal_gpu(sch: &mut IrSchedule, tmp_out: &Tensor, out: &Tensor) -> Result<()> {
    sch.merge_exprs();
    expect_blocks(sch, "schedule_block_reduce_internal_gpu", 2)?;
    let (tmp, out) = (tmp_out.name(), out.name());

    for _ in 0..tmp_out.rank().saturating_sub(2) {
        sch.fuse_at(tmp, &[0, 1])?;
        sch.fuse_at(out, &[0, 1])?;
    }

    if tmp_out.rank() == 1 {
        let loop_ = sch.nth_loop(tmp, 0)?;
        sch.bind(&loop_, "threadIdx.x")?;
        let block = sch.get_block(tmp)?;
        sch.set_buffer(&block, "local")?;
        let loop_ = sch.nth_loop(out, 0)?;
        sch.bind(&loop_, "threadIdx.x")?;
    } else {
        let block = sch.get_block(tmp)?;
        sch.set_buffer(&block, "local")?;
        let row = sch.nth_loop(out, 0)?;
        sch.simple_compute_at(&block, &row)?;
        sch.bind(&row, "blockIdx.x")?;
        let lane = sch.nth_loop(tmp, 1)?;
        sch.bind(&lane, "threadIdx.x")?;
    }
    Ok(())
}

/// Three-stage block reduction: `reduce_tmp_out` reduces inside each
/// thread, `tmp_out` across the block and `out` writes the result.
#[tracing::instrument(skip_all, fields(reduce_tmp = %reduce_tmp_out.name(), tmp = %tmp_out.name(), out = %out.name()))]
pub fn schedule_block_reduce_gpu(
    sch: &mut IrSchedule,
    reduce_tmp_out: &Tensor,
    tmp_out: &Tensor,
    out: &Tensor,
) -> Result<()> {
    sch.merge_exprs();
    expect_blocks(sch, "schedule_block_reduce_gpu", 3)?;
    let names = [reduce_tmp_out.name(), tmp_out.name(), out.name()];
    let [first, second, last] = names;

    // Fuse the trailing parallel dimensions of the first stage.
    let kept = tmp_out.rank().saturating_sub(1);
    for _ in 0..reduce_tmp_out.rank().saturating_sub(tmp_out.rank()) {
        sch.fuse_at(first, &[kept, kept + 1])?;
    }
    for _ in 0..kept.saturating_sub(1) {
        for name in names {
            sch.fuse_at(name, &[0, 1])?;
        }
    }

    if tmp_out.rank() == 1 {
        for name in names {
            let loop_ = sch.nth_loop(name, 0)?;
            sch.bind(&loop_, "threadIdx.x")?;
        }
        let block = sch.get_block(first)?;
        sch.set_buffer(&block, "local")?;
        let block = sch.get_block(second)?;
        sch.set_buffer(&block, "local")?;
    } else {
        for name in [first, second] {
            let lane = sch.nth_loop(name, 1)?;
            sch.bind(&lane, "threadIdx.x")?;
            let block = sch.get_block(name)?;
            sch.set_buffer(&block, "local")?;
        }
        let row = sch.nth_loop(second, 0)?;
        let block = sch.get_block(first)?;
        sch.simple_compute_at(&block, &row)?;

        let row = sch.nth_loop(last, 0)?;
        let lane = sch.nth_loop(last, 1)?;
        sch.bind(&row, "blockIdx.x")?;
        sch.bind(&lane, "threadIdx.x")?;
        let block = sch.get_block(second)?;
        sch.simple_compute_at(&block, &row)?;
    }
    Ok(())
}

/// Block reduction through shared memory: `reshape` is inlined, `internal`
/// reduces into shared memory and `out` finishes each row.
#[tracing::instrument(skip_all, fields(reshape = %reshape.name(), internal = %internal.name(), out = %out.name()))]
pub fn schedule_block_shuffle_reduce_gpu(
    sch: &mut IrSchedule,
    reshape: &Tensor,
    internal: &Tensor,
    out: &Tensor,
) -> Result<()> {
    let (reshape, internal_name, out_name) = (reshape.name(), internal.name(), out.name());
    let at_least = |sch: &IrSchedule, name: &str, count: usize| -> Result<()> {
        let found = sch.get_loops_by_name(name)?.len();
        ensure!(
            found >= count,
            InvalidArgumentSnafu {
                op: "schedule_block_shuffle_reduce_gpu",
                reason: format!("{name} has {found} loops, need {count}"),
            }
        );
        Ok(())
    };

    for _ in 0..internal.rank().saturating_sub(2) {
        at_least(sch, internal_name, 2)?;
        sch.fuse_at(internal_name, &[0, 1])?;
        at_least(sch, out_name, 2)?;
        sch.fuse_at(out_name, &[0, 1])?;
    }
    for _ in 0..out.rank().saturating_sub(internal.rank()) {
        if internal.rank() == 1 {
            at_least(sch, out_name, 2)?;
            sch.fuse_at(out_name, &[0, 1])?;
        } else {
            at_least(sch, out_name, 3)?;
            sch.fuse_at(out_name, &[1, 2])?;
        }
    }

    // A single output loop is split into a unit outer loop so both stages
    // have a block and a thread dimension.
    if sch.get_loops_by_name(out_name)?.len() == 1 {
        for name in [internal_name, out_name] {
            let loop_ = sch.nth_loop(name, 0)?;
            let extent = loop_extent(&loop_)?;
            sch.split(&loop_, &[-1, extent])?;
        }
    }

    let block = sch.get_block(reshape)?;
    sch.compute_inline(&block)?;
    let block = sch.get_block(internal_name)?;
    sch.set_buffer(&block, "shared")?;

    for name in [internal_name, out_name] {
        at_least(sch, name, 2)?;
        let loops = sch.get_loops_by_name(name)?;
        sch.bind(&loops[0], "blockIdx.x")?;
        sch.bind(&loops[1], "threadIdx.x")?;
    }
    let row = sch.nth_loop(out_name, 0)?;
    let block = sch.get_block(internal_name)?;
    sch.simple_compute_at(&block, &row)?;
    Ok(())
}
