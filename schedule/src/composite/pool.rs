use super::expect_blocks;
use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Pooling schedule for GPU targets: the four output dimensions are fused
/// and spread over `blockIdx.x`/`threadIdx.x` in blocks of 1024 threads.
#[tracing::instrument(skip_all)]
pub fn schedule_pool_gpu(sch: &mut IrSchedule) -> Result<()> {
    let names = expect_blocks(sch, "schedule_pool_gpu", 1)?;
    let fused = sch.fuse_at(&names[0], &[0, 1, 2, 3])?;
    let split = sch.split(&fused, &[-1, 1024])?;
    sch.bind(&split[0], "blockIdx.x")?;
    sch.bind(&split[1], "threadIdx.x")?;
    Ok(())
}

/// Global pooling schedule for GPU targets.
///
/// Expects a partial-reduction block followed by the final reduction. Both
/// fuse their batch and channel loops and split them by 32. The final block
/// maps the result over `blockIdx.x`/`threadIdx.y`. The partial block is
/// computed per channel inside it, in local memory, with its lanes on
/// `threadIdx.x`.
#[tracing::instrument(skip_all)]
pub fn schedule_global_pool_gpu(sch: &mut IrSchedule) -> Result<()> {
    let names = expect_blocks(sch, "schedule_global_pool_gpu", 2)?;
    let (partial, out) = (&names[0], &names[1]);

    let fused = sch.fuse_at(partial, &[0, 1])?;
    sch.split(&fused, &[-1, 32])?;
    let fused = sch.fuse_at(out, &[0, 1])?;
    let split = sch.split(&fused, &[-1, 32])?;
    sch.bind(&split[0], "blockIdx.x")?;
    sch.bind(&split[1], "threadIdx.y")?;

    let block = sch.get_block(partial)?;
    sch.simple_compute_at(&block, &split[1])?;
    sch.set_buffer(&block, "local")?;
    let lane = sch.nth_loop(partial, 2)?;
    sch.bind(&lane, "threadIdx.x")?;
    Ok(())
}
