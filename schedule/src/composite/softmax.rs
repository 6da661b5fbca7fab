use snafu::ensure;

use super::{expect_blocks, written_tensor};
use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Softmax schedule for CPU targets.
///
/// Expects the lowered `[exp, sum, out]` blocks. The output loops in front
/// of `axis` are fused into one and the normalizing sum is computed inside
/// it, so each row is reduced right before it is divided. `axis == -1`
/// selects the last dimension.
#[tracing::instrument(skip_all, fields(axis))]
pub fn schedule_softmax_cpu(sch: &mut IrSchedule, axis: i64) -> Result<()> {
    sch.merge_exprs();
    let names = expect_blocks(sch, "schedule_softmax_cpu", 3)?;
    let (sum, out) = (&names[1], &names[2]);

    let rank = written_tensor(sch, out)?.rank() as i64;
    let axis = if axis == -1 { rank - 1 } else { axis };
    ensure!(
        (0..rank).contains(&axis),
        InvalidArgumentSnafu { op: "schedule_softmax_cpu", reason: format!("axis {axis} is out of range for rank {rank}") }
    );

    for _ in 1..axis {
        sch.fuse_at(out, &[0, 1])?;
    }
    let row = sch.nth_loop(out, 0)?;
    let block = sch.get_block(sum)?;
    sch.compute_at(&block, &row)
}
