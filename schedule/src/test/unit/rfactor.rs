use crate::ScheduleError;
use crate::test::helpers::*;

fn partial_shape(block: &std::sync::Arc<strata_ir::Stmt>) -> Vec<i64> {
    block.as_schedule_block().unwrap().write.shape().to_vec()
}

#[test]
fn test_rfactor_leading_axis() {
    let module = row_sum_module(8, 30);
    let mut sch = cpu(module.clone());
    let loops = sch.get_loops_by_name("S").unwrap();

    let partial = sch.rfactor(&loops[1], 0).unwrap();
    assert_eq!(partial_shape(&partial), [30, 8]);
    assert!(!partial.as_schedule_block().unwrap().is_reduction());
    assert_eq!(block_names(&sch), ["S_rf", "S"]);
    assert_eq!(loop_vars(&sch, "S"), ["S_i0_1", "S_rf"]);
    assert_equivalent(&module, sch.module(), &["S"]);
}

#[test]
fn test_rfactor_trailing_axis() {
    let module = row_sum_module(8, 30);
    let mut sch = cpu(module.clone());
    let loops = sch.get_loops_by_name("S").unwrap();

    let partial = sch.rfactor(&loops[1], 1).unwrap();
    assert_eq!(partial_shape(&partial), [8, 30]);
    assert_equivalent(&module, sch.module(), &["S"]);
}

#[test]
fn test_rfactor_split_outer() {
    let module = row_sum_module(8, 30);
    let mut sch = cpu(module.clone());
    let loops = sch.get_loops_by_name("S").unwrap();
    let split = sch.split(&loops[1], &[-1, 4]).unwrap();

    // The inner loop stays a reduction of the partial block.
    let partial = sch.rfactor(&split[0], 0).unwrap();
    assert_eq!(partial_shape(&partial), [8, 8]);
    assert!(partial.as_schedule_block().unwrap().is_reduction());
    assert_equivalent(&module, sch.module(), &["S"]);
}

#[test]
fn test_rfactor_clipped_loop() {
    let mut sch = cpu(row_sum_module(8, 30));
    let loops = sch.get_loops_by_name("S").unwrap();
    let split = sch.split(&loops[1], &[-1, 4]).unwrap();

    let err = sch.rfactor(&split[1], 0).unwrap_err();
    assert!(matches!(err, ScheduleError::NonConstantExtent { op: "rfactor", .. }));
}

#[test]
fn test_rfactor_rejects_spatial_loop() {
    let mut sch = cpu(row_sum_module(8, 30));
    let loops = sch.get_loops_by_name("S").unwrap();

    let err = sch.rfactor(&loops[0], 0).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidArgument { op: "rfactor", .. }));
}

#[test]
fn test_rfactor_axis_out_of_range() {
    let mut sch = cpu(row_sum_module(8, 30));
    let loops = sch.get_loops_by_name("S").unwrap();

    let err = sch.rfactor(&loops[1], 3).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidArgument { op: "rfactor", .. }));
}

#[test]
fn test_rfactor_matmul() {
    let module = matmul_module(4, 3, 6);
    let mut sch = cpu(module.clone());
    let loops = sch.get_loops_by_name("C").unwrap();

    let partial = sch.rfactor(&loops[2], 2).unwrap();
    assert_eq!(partial_shape(&partial), [4, 3, 6]);
    assert_eq!(loop_vars(&sch, "C"), ["C_i0_1", "C_i1_1", "C_rf"]);
    assert_equivalent(&module, sch.module(), &["C"]);
}

#[test]
fn test_rfactor_after_compute_at() {
    let module = row_sum_consumer_module();
    let mut sch = cpu(module.clone());
    let row = sch.get_loops_by_name("C").unwrap()[0].clone();
    let block = sch.get_block("S").unwrap();
    sch.compute_at(&block, &row).unwrap();

    let loops = sch.get_loops_by_name("S").unwrap();
    let partial = sch.rfactor(&loops[1], 0).unwrap();
    assert_eq!(partial_shape(&partial), [6, 4]);

    // The final combine runs under the row loop, before the reader.
    assert_eq!(block_names(&sch), ["S_rf", "S", "C"]);
    let vars = loop_vars(&sch, "S");
    assert_eq!(vars.len(), 3);
    assert_eq!(vars[0], "C_i0");
    assert_eq!(sch.module().exprs().len(), 1);
    assert_equivalent(&module, sch.module(), &["S", "C"]);
}
