use strata_ir::{BindAxis, ForKind};

use crate::composite::{schedule_mul_cpu, schedule_mul_gpu};
use crate::test::helpers::*;

#[test]
fn test_gpu_rows_on_blocks() {
    let module = matmul_module(4, 8, 4);
    let mut sch = gpu(module.clone());
    schedule_mul_gpu(&mut sch).unwrap();

    let loops = sch.get_loops_by_name("C").unwrap();
    assert_eq!(const_extents(&loops), [Some(4), Some(4), Some(2), Some(4)]);
    assert_eq!(
        loop_kinds(&sch, "C"),
        [ForKind::Bound(BindAxis::BlockX), ForKind::Bound(BindAxis::ThreadX), ForKind::Serial, ForKind::Serial]
    );
    assert_equivalent(&module, sch.module(), &["C"]);
}

#[test]
fn test_cpu_unrolls_reduction() {
    let module = matmul_module(4, 8, 4);
    let mut sch = cpu(module.clone());
    schedule_mul_cpu(&mut sch, &[4, 4]).unwrap();

    assert_eq!(loop_kinds(&sch, "C"), [ForKind::Serial, ForKind::Serial, ForKind::Unrolled]);
    assert_eq!(sch.module().exprs().len(), 1);
    assert_equivalent(&module, sch.module(), &["C"]);
}

#[test]
fn test_cpu_trivial_reduction_is_left_alone() {
    let mut sch = cpu(matmul_module(4, 8, 1));
    schedule_mul_cpu(&mut sch, &[4, 1]).unwrap();

    assert!(loop_kinds(&sch, "C").iter().all(|k| *k == ForKind::Serial));
}
