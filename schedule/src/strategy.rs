//! Target dispatch: picks the composite schedule for an operator pattern.
//!
//! The operator strategy layer describes what it lowered with an
//! [`OpPattern`] and calls [`apply_schedule`]; the architecture of the
//! session's [`Target`](crate::Target) selects the CPU or GPU recipe.

use strata_ir::Tensor;
use tracing::debug;

use crate::composite;
use crate::error::*;
use crate::ir_schedule::IrSchedule;
use crate::params::ScheduleParams;
use crate::target::Arch;

/// Operator patterns with a composite schedule, with the arguments their
/// recipes take.
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OpPattern {
    /// Elementwise and broadcast operators.
    Injective { output_shape: Vec<i64>, vectorizable: bool },
    /// Reduction over the trailing output dimensions.
    Reduce { output_shape: Vec<i64>, last_dimension_num: usize },
    BlockReduceInternal { tmp_out: Tensor, out: Tensor },
    BlockReduce { reduce_tmp_out: Tensor, tmp_out: Tensor, out: Tensor },
    BlockShuffleReduce { reshape: Tensor, internal: Tensor, out: Tensor },
    /// `axis == -1` selects the last dimension.
    Softmax { axis: i64 },
    Pool,
    GlobalPool,
    /// Direct 2-D convolution over a padded input.
    Conv2d,
    Matmul { reduce_first_shape: Vec<i64> },
    /// One input split into several outputs along `axis`.
    Split { output_shapes: Vec<Vec<i64>>, axis: usize },
}

/// Schedule `sch` with the recipe for `pattern` on the session's target.
///
/// Returns `false` when the pattern has no recipe for the architecture; the
/// module is then left unscheduled.
pub fn apply_schedule(sch: &mut IrSchedule, pattern: &OpPattern, params: &ScheduleParams) -> Result<bool> {
    let arch = sch.target().arch;
    let name: &'static str = pattern.into();
    match (pattern, arch) {
        (OpPattern::Injective { output_shape, vectorizable }, Arch::X86) => {
            composite::schedule_injective_cpu(sch, output_shape, *vectorizable)?
        }
        (OpPattern::Injective { output_shape, .. }, Arch::NvGpu) => composite::schedule_injective_gpu(sch, output_shape)?,
        (OpPattern::Reduce { output_shape, last_dimension_num }, Arch::NvGpu) => {
            composite::schedule_reduce_gpu(sch, output_shape, *last_dimension_num)?
        }
        (OpPattern::BlockReduceInternal { tmp_out, out }, Arch::NvGpu) => {
            composite::schedule_block_reduce_internal_gpu(sch, tmp_out, out)?
        }
        (OpPattern::BlockReduce { reduce_tmp_out, tmp_out, out }, Arch::NvGpu) => {
            composite::schedule_block_reduce_gpu(sch, reduce_tmp_out, tmp_out, out)?
        }
        (OpPattern::BlockShuffleReduce { reshape, internal, out }, Arch::NvGpu) => {
            composite::schedule_block_shuffle_reduce_gpu(sch, reshape, internal, out)?
        }
        (OpPattern::Softmax { axis }, Arch::X86) => composite::schedule_softmax_cpu(sch, *axis)?,
        (OpPattern::Pool, Arch::NvGpu) => composite::schedule_pool_gpu(sch)?,
        (OpPattern::GlobalPool, Arch::NvGpu) => composite::schedule_global_pool_gpu(sch)?,
        (OpPattern::Conv2d, Arch::NvGpu) => composite::schedule_conv_gpu(sch, params)?,
        (OpPattern::Matmul { reduce_first_shape }, Arch::X86) => composite::schedule_mul_cpu(sch, reduce_first_shape)?,
        (OpPattern::Matmul { .. }, Arch::NvGpu) => composite::schedule_mul_gpu(sch)?,
        (OpPattern::Split { output_shapes, axis }, _) => composite::schedule_split(sch, output_shapes, *axis)?,
        _ => {
            debug!(pattern = name, %arch, "no schedule for pattern on target, leaving it unscheduled");
            return Ok(false);
        }
    }
    debug!(pattern = name, %arch, module.tree = %sch.module().tree(), "schedule applied");
    Ok(true)
}
