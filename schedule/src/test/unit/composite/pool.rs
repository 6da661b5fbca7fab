use strata_ir::{BindAxis, ForKind, MemoryScope};

use super::{global_pool_module, max_pool_module};
use crate::composite::{schedule_global_pool_gpu, schedule_pool_gpu};
use crate::cuda_axis_info;
use crate::test::helpers::*;

#[test]
fn test_pool_fuses_output() {
    let module = max_pool_module();
    let mut sch = gpu(module.clone());
    schedule_pool_gpu(&mut sch).unwrap();

    let kinds = loop_kinds(&sch, "P");
    assert_eq!(kinds[..2], [ForKind::Bound(BindAxis::BlockX), ForKind::Bound(BindAxis::ThreadX)]);
    assert_eq!(kinds.len(), 4);
    let info = cuda_axis_info(sch.module()).unwrap();
    assert_eq!(info.grid_dims, [1, 1, 1]);
    assert_eq!(info.block_dims, [1024, 1, 1]);
    assert_equivalent(&module, sch.module(), &["P"]);
}

#[test]
fn test_global_pool() {
    let module = global_pool_module();
    let mut sch = gpu(module.clone());
    schedule_global_pool_gpu(&mut sch).unwrap();

    let info = cuda_axis_info(sch.module()).unwrap();
    assert_eq!(info.grid_dims, [2, 1, 1]);
    assert_eq!(info.block_dims, [4, 32, 1]);

    let block = sch.get_block("P").unwrap();
    assert_eq!(block.as_schedule_block().unwrap().scope, MemoryScope::Local);
    assert_eq!(loop_kinds(&sch, "P")[2], ForKind::Bound(BindAxis::ThreadX));
    assert_equivalent(&module, sch.module(), &["O"]);
}

#[test]
fn test_pool_expects_one_block() {
    let mut sch = gpu(global_pool_module());
    assert!(schedule_pool_gpu(&mut sch).is_err());
}
