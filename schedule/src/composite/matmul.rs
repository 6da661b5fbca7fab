use snafu::ensure;

use super::block_names;
use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Matmul schedule for GPU targets: rows over `blockIdx.x`, pairs of
/// columns over `threadIdx.x`.
#[tracing::instrument(skip_all)]
pub fn schedule_mul_gpu(sch: &mut IrSchedule) -> Result<()> {
    let name = last_block(sch, "schedule_mul_gpu")?;
    let loops = sch.get_loops_by_name(&name)?;
    ensure!(
        loops.len() >= 2,
        InvalidArgumentSnafu { op: "schedule_mul_gpu", reason: format!("{name} has {} loops, need 2", loops.len()) }
    );
    sch.split(&loops[1], &[-1, 2])?;

    let loops = sch.get_loops_by_name(&name)?;
    sch.bind(&loops[0], "blockIdx.x")?;
    sch.bind(&loops[1], "threadIdx.x")?;
    Ok(())
}

/// Matmul schedule for CPU targets.
///
/// Merges the lowered statements and unrolls the innermost loop of the final
/// block when the reduced dimension of the first operand is not trivial.
#[tracing::instrument(skip_all, fields(shape = ?reduce_first_shape))]
pub fn schedule_mul_cpu(sch: &mut IrSchedule, reduce_first_shape: &[i64]) -> Result<()> {
    sch.merge_exprs();
    let name = last_block(sch, "schedule_mul_cpu")?;
    let loops = sch.get_loops_by_name(&name)?;
    if reduce_first_shape.last().is_some_and(|&k| k > 1)
        && let Some(innermost) = loops.last()
    {
        sch.unroll(innermost)?;
    }
    Ok(())
}

fn last_block(sch: &IrSchedule, op: &'static str) -> Result<String> {
    block_names(sch).pop().ok_or_else(|| InvalidArgumentSnafu { op, reason: "module has no blocks" }.build())
}
