//! GPU launch dimensions of a scheduled module.
//!
//! After a GPU schedule the grid and block sizes are implicit in the loops
//! bound to `blockIdx.*`/`threadIdx.*`. [`cuda_axis_info`] collects them so
//! the backend can size the kernel launch:
//!
//! ```text
//! for (C_i0_i1_fused_0, 0, 4)   bind[blockIdx.x]   → grid  = [4, 1, 1]
//!   for (C_i0_i1_fused_1, 0, min(1024, ..)) bind[threadIdx.x] → block = [1024, 1, 1]
//! ```

use std::fmt;

use strata_ir::{ModuleExpr, Stmt};
use tracing::debug;

use crate::error::*;

/// Grid and block extents along x, y, z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CudaAxisInfo {
    pub grid_dims: [i64; 3],
    pub block_dims: [i64; 3],
}

impl Default for CudaAxisInfo {
    fn default() -> Self {
        Self { grid_dims: [1; 3], block_dims: [1; 3] }
    }
}

impl CudaAxisInfo {
    pub fn num_threads(&self) -> i64 {
        self.block_dims.iter().product()
    }

    pub fn num_blocks(&self) -> i64 {
        self.grid_dims.iter().product()
    }
}

impl fmt::Display for CudaAxisInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [gx, gy, gz] = self.grid_dims;
        let [bx, by, bz] = self.block_dims;
        write!(f, "grid({gx}, {gy}, {gz}) block({bx}, {by}, {bz})")
    }
}

/// Launch dimensions implied by the bound loops of `module`.
///
/// Each axis takes the largest extent bound to it anywhere in the module;
/// clipped loops contribute their upper bound. Unbound axes stay 1.
pub fn cuda_axis_info(module: &ModuleExpr) -> Result<CudaAxisInfo> {
    let mut info = CudaAxisInfo::default();
    let mut failed = None;
    for root in module.exprs() {
        root.walk(&mut |s| {
            let Stmt::For(f) = s else { return };
            let Some(axis) = f.kind.bind_axis() else { return };
            let Some(extent) = f.max_extent() else {
                failed.get_or_insert(f.id);
                return;
            };
            let dims = if axis.is_block() { &mut info.grid_dims } else { &mut info.block_dims };
            dims[axis.dim()] = dims[axis.dim()].max(extent);
        });
    }
    if let Some(id) = failed {
        return NonConstantExtentSnafu { op: "cuda_axis_info", id }.fail();
    }
    debug!(%info, "collected launch dimensions");
    Ok(info)
}
