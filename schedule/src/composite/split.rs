use snafu::ensure;

use super::block_names;
use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Schedule for an operator that splits one tensor into several along `axis`.
///
/// Every output block gets the split axis innermost and the other axes fused
/// into one loop; all outputs are then computed inside the last output's
/// fused loop. On GPU targets the fused loop is spread over
/// `blockIdx.x`/`threadIdx.x` when it exceeds one block of threads.
#[tracing::instrument(skip_all, fields(outputs = output_shapes.len(), axis))]
pub fn schedule_split(sch: &mut IrSchedule, output_shapes: &[Vec<i64>], axis: usize) -> Result<()> {
    sch.merge_exprs();
    let Some(shape) = output_shapes.first() else {
        return InvalidArgumentSnafu { op: "schedule_split", reason: "no output shapes" }.fail();
    };
    let dims = shape.len();
    ensure!(
        axis < dims,
        InvalidArgumentSnafu { op: "schedule_split", reason: format!("axis {axis} is out of range for rank {dims}") }
    );

    let names = block_names(sch);
    let Some((last, others)) = names.split_last() else {
        return InvalidArgumentSnafu { op: "schedule_split", reason: "module has no blocks" }.fail();
    };

    let mut order: Vec<usize> = (0..dims).filter(|&d| d != axis).collect();
    order.push(axis);
    for name in &names {
        sch.reorder_at(name, &order)?;
    }
    if dims > 1 {
        let leading: Vec<usize> = (0..dims - 1).collect();
        for name in &names {
            sch.fuse_at(name, &leading)?;
        }
    }
    let fused_shape: i64 = shape.iter().enumerate().filter(|&(d, _)| d != axis).map(|(_, &e)| e).product();

    if sch.target().is_gpu() {
        let threads = sch.target().max_num_threads;
        let wide = fused_shape > threads;
        let level = if wide {
            let split = sch.split_at(last, 0, &[-1, threads])?;
            sch.bind(&split[0], "blockIdx.x")?;
            sch.bind(&split[1], "threadIdx.x")?;
            1
        } else {
            let outer = sch.nth_loop(last, 0)?;
            sch.bind(&outer, "threadIdx.x")?;
            0
        };
        if wide {
            for name in others {
                sch.split_at(name, 0, &[-1, threads])?;
                let block = sch.get_block(name)?;
                let anchor = sch.nth_loop(last, level)?;
                sch.simple_compute_at(&block, &anchor)?;
            }
        }
    } else if dims > 1 {
        for name in others {
            let block = sch.get_block(name)?;
            let anchor = sch.nth_loop(last, 0)?;
            sch.simple_compute_at(&block, &anchor)?;
        }
    }
    Ok(())
}
