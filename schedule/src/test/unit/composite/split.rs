use strata_ir::{BindAxis, ForKind};

use super::split_module;
use crate::composite::schedule_split;
use crate::test::helpers::*;

#[test]
fn test_cpu_shares_row_loop() {
    let module = split_module(4, [2, 4]);
    let mut sch = cpu(module.clone());
    schedule_split(&mut sch, &[vec![4, 2], vec![4, 4]], 1).unwrap();

    let y0 = sch.get_loops_by_name("Y0").unwrap();
    let y1 = sch.get_loops_by_name("Y1").unwrap();
    assert_eq!(y0[0].as_for().unwrap().id, y1[0].as_for().unwrap().id);
    assert_equivalent(&module, sch.module(), &["Y0", "Y1"]);
}

#[test]
fn test_cpu_leading_axis() {
    // Splitting along rows moves the split axis innermost.
    let x = tensor("X", &[6, 4]);
    let y0 = strata_ir::lower::compute("Y0", &[2, 4], strata_dtype::DType::Float32, |i| {
        strata_ir::Expr::load(&x, i.to_vec())
    });
    let y1 = strata_ir::lower::compute("Y1", &[4, 4], strata_dtype::DType::Float32, |i| {
        strata_ir::Expr::load(&x, [i[0].clone() + 2, i[1].clone()])
    });
    let module = strata_ir::ModuleExpr::new([y0.stmt, y1.stmt]);
    let mut sch = cpu(module.clone());
    schedule_split(&mut sch, &[vec![2, 4], vec![4, 4]], 0).unwrap();

    assert_eq!(loop_vars(&sch, "Y1"), ["Y1_i1", "Y1_i0"]);
    assert_equivalent(&module, sch.module(), &["Y0", "Y1"]);
}

#[test]
fn test_gpu_narrow_binds_threads() {
    let module = split_module(4, [2, 4]);
    let mut sch = gpu(module.clone());
    schedule_split(&mut sch, &[vec![4, 2], vec![4, 4]], 1).unwrap();

    assert_eq!(loop_kinds(&sch, "Y1")[0], ForKind::Bound(BindAxis::ThreadX));
    assert_equivalent(&module, sch.module(), &["Y0", "Y1"]);
}

#[test]
fn test_gpu_wide_computes_outputs_together() {
    let module = split_module(2048, [1, 2]);
    let mut sch = gpu(module.clone());
    schedule_split(&mut sch, &[vec![2048, 1], vec![2048, 2]], 1).unwrap();

    assert_eq!(
        loop_kinds(&sch, "Y1")[..2],
        [ForKind::Bound(BindAxis::BlockX), ForKind::Bound(BindAxis::ThreadX)]
    );
    let y0 = sch.get_loops_by_name("Y0").unwrap();
    let y1 = sch.get_loops_by_name("Y1").unwrap();
    assert_eq!(y0[1].as_for().unwrap().id, y1[1].as_for().unwrap().id);
    assert_equivalent(&module, sch.module(), &["Y0", "Y1"]);
}

#[test]
fn test_axis_out_of_range() {
    let mut sch = cpu(split_module(4, [2, 4]));
    let err = schedule_split(&mut sch, &[vec![4, 2], vec![4, 4]], 2).unwrap_err();
    assert!(matches!(err, crate::ScheduleError::InvalidArgument { op: "schedule_split", .. }));
}
