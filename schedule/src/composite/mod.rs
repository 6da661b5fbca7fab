//! Composite schedules.
//!
//! Each function here is a fixed recipe of primitive calls for one operator
//! pattern and target family. Recipes re-fetch blocks and loops after every
//! mutating call and address blocks by name, so block moves made by earlier
//! steps never shift later ones. Any primitive failure aborts the recipe.
//!
//! | Pattern | CPU | GPU |
//! |---------|-----|-----|
//! | Injective | [`schedule_injective_cpu`] | [`schedule_injective_gpu`] |
//! | Reduction | | [`schedule_reduce_gpu`], [`schedule_block_reduce_internal_gpu`], [`schedule_block_reduce_gpu`], [`schedule_block_shuffle_reduce_gpu`] |
//! | Softmax | [`schedule_softmax_cpu`] | |
//! | Pooling | | [`schedule_pool_gpu`], [`schedule_global_pool_gpu`] |
//! | Convolution | | [`schedule_conv_gpu`] |
//! | Matmul | [`schedule_mul_cpu`] | [`schedule_mul_gpu`] |
//! | Split | [`schedule_split`] | [`schedule_split`] |

mod conv;
pub mod heuristics;
mod injective;
mod matmul;
mod pool;
mod reduce;
mod softmax;
mod split;

use std::sync::Arc;

use strata_ir::{Stmt, Tensor};

pub use conv::schedule_conv_gpu;
pub use heuristics::{basic_vector_factor, inner_splitter, split_even, vectorize_factor};
pub use injective::{schedule_injective_cpu, schedule_injective_gpu};
pub use matmul::{schedule_mul_cpu, schedule_mul_gpu};
pub use pool::{schedule_global_pool_gpu, schedule_pool_gpu};
pub use reduce::{
    schedule_block_reduce_gpu, schedule_block_reduce_internal_gpu, schedule_block_shuffle_reduce_gpu,
    schedule_reduce_gpu,
};
pub use softmax::schedule_softmax_cpu;
pub use split::schedule_split;

use crate::error::*;
use crate::ir_schedule::IrSchedule;

/// Names of all blocks, in program order.
fn block_names(sch: &IrSchedule) -> Vec<String> {
    sch.get_all_blocks().iter().filter_map(|b| b.as_schedule_block().map(|b| b.name.to_string())).collect()
}

/// The tensor written by block `name`.
fn written_tensor(sch: &IrSchedule, name: &str) -> Result<Tensor> {
    let block = sch.get_block(name)?;
    block.as_schedule_block().map(|b| b.write.clone()).ok_or_else(|| {
        InvalidArgumentSnafu { op: "composite", reason: format!("{name} is not a schedule block") }.build()
    })
}

/// The `index`-th tensor read by block `name`.
fn read_tensor(sch: &IrSchedule, name: &str, index: usize) -> Result<Tensor> {
    let block = sch.get_block(name)?;
    let reads = block.as_schedule_block().map(|b| b.reads()).unwrap_or_default();
    let count = reads.len();
    reads.into_iter().nth(index).ok_or_else(|| ReadIndexOutOfRangeSnafu { block: name, index, count }.build())
}

/// Constant extent of a loop handle.
fn loop_extent(loop_: &Arc<Stmt>) -> Result<i64> {
    let Some(f) = loop_.as_for() else {
        return InvalidArgumentSnafu { op: "composite", reason: "handle is not a loop" }.fail();
    };
    f.const_extent().ok_or_else(|| NonConstantExtentSnafu { op: "composite", id: f.id }.build())
}

/// The loop that drives iteration variable `iter_index` of block `name`.
///
/// Resolves a loop by its role in the block instead of its position, which
/// shifts when unit loops are not materialised.
fn loop_of_iter_var(sch: &IrSchedule, name: &str, iter_index: usize) -> Result<Arc<Stmt>> {
    let block = sch.get_block(name)?;
    let var = block
        .as_schedule_block()
        .and_then(|b| b.iter_values.get(iter_index))
        .and_then(|value| value.as_var().cloned())
        .ok_or_else(|| {
            InvalidArgumentSnafu {
                op: "composite",
                reason: format!("iteration variable {iter_index} of {name} is not bound to a single loop"),
            }
            .build()
        })?;
    sch.get_loops_by_name(name)?
        .into_iter()
        .find(|l| l.as_for().is_some_and(|f| f.var == var))
        .ok_or_else(|| InvalidArgumentSnafu { op: "composite", reason: format!("no loop drives {var} of {name}") }.build())
}

/// Check a recipe precondition on the module layout.
fn expect_blocks(sch: &IrSchedule, op: &'static str, count: usize) -> Result<Vec<String>> {
    let names = block_names(sch);
    snafu::ensure!(
        names.len() == count,
        InvalidArgumentSnafu { op, reason: format!("expected {count} blocks, found {}", names.len()) }
    );
    Ok(names)
}
