use tracing::trace;

use super::heuristics::{basic_vector_factor, vectorize_factor};
use super::{block_names, loop_extent, written_tensor};
use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Maximum grid size along `blockIdx.x` the injective GPU schedule targets.
const MAX_BLOCKS: i64 = 1024;

/// Elementwise schedule for CPU targets.
///
/// Fuses the leading loops into one parallel loop (three for rank >= 5, two
/// for rank >= 3) and, when `vectorizable`, vectorizes the innermost loop by
/// the largest power of two dividing it that fits a SIMD register.
#[tracing::instrument(skip_all, fields(shape = ?output_shape, vectorizable))]
pub fn schedule_injective_cpu(sch: &mut IrSchedule, output_shape: &[i64], vectorizable: bool) -> Result<()> {
    let Some(name) = block_names(sch).into_iter().next() else {
        return Ok(());
    };
    let loops = sch.get_loops_by_name(&name)?;
    if loops.is_empty() {
        return Ok(());
    }

    let mut dims = output_shape.len().min(loops.len());
    let fused = if dims >= 5 {
        dims -= 2;
        sch.fuse(&loops[..3])?
    } else if dims >= 3 {
        dims -= 1;
        sch.fuse(&loops[..2])?
    } else {
        loops[0].clone()
    };
    sch.parallel(&fused)?;

    if vectorizable && dims > 0 {
        let dtype = written_tensor(sch, &name)?.dtype();
        let limit = basic_vector_factor(dtype, sch.target());
        let loops = sch.get_loops_by_name(&name)?;
        let last = &loops[dims - 1];
        let factor = vectorize_factor(loop_extent(last)?, limit);
        if factor > 1 {
            let split = sch.split(last, &[-1, factor])?;
            sch.vectorize(&split[1], factor as usize)?;
            if dims == 1 {
                sch.parallel(&split[0])?;
            }
        }
        trace!(factor, "vectorized innermost loop");
    }
    Ok(())
}

/// Elementwise schedule for GPU targets.
///
/// Fuses the whole nest and distributes it over `blockIdx.x` and
/// `threadIdx.x`; outputs larger than a full grid keep a serial inner loop.
#[tracing::instrument(skip_all, fields(shape = ?output_shape))]
pub fn schedule_injective_gpu(sch: &mut IrSchedule, output_shape: &[i64]) -> Result<()> {
    let Some(name) = block_names(sch).into_iter().next() else {
        return Ok(());
    };
    let loops = sch.get_loops_by_name(&name)?;
    if loops.is_empty() {
        return Ok(());
    }
    let fused = sch.fuse(&loops)?;

    let threads = sch.target().max_num_threads;
    let prod: i64 = output_shape.iter().product();
    if prod > threads * MAX_BLOCKS {
        let split = sch.split(&fused, &[MAX_BLOCKS, threads, -1])?;
        sch.bind(&split[0], "blockIdx.x")?;
        sch.bind(&split[1], "threadIdx.x")?;
    } else if prod > threads {
        let split = sch.split(&fused, &[-1, threads])?;
        sch.bind(&split[0], "blockIdx.x")?;
        sch.bind(&split[1], "threadIdx.x")?;
    } else {
        sch.bind(&fused, "threadIdx.x")?;
    }
    Ok(())
}
