use super::softmax_module;
use crate::ScheduleError;
use crate::composite::schedule_softmax_cpu;
use crate::test::helpers::*;

#[test]
fn test_last_axis() {
    let module = softmax_module();
    let mut sch = cpu(module.clone());
    schedule_softmax_cpu(&mut sch, -1).unwrap();

    let out = sch.get_loops_by_name("O").unwrap();
    assert_eq!(const_extents(&out), [Some(6), Some(4)]);
    // The row sum runs inside the fused output row.
    let sum = sch.get_loops_by_name("S").unwrap();
    assert_eq!(sum[0].as_for().unwrap().id, out[0].as_for().unwrap().id);
    assert_eq!(const_extents(&sum), [Some(6), Some(4)]);
    assert_eq!(loop_vars(&sch, "S")[1], "S_r2");
    assert_equivalent(&module, sch.module(), &["O"]);
}

#[test]
fn test_middle_axis() {
    let module = softmax_module();
    let mut sch = cpu(module.clone());
    schedule_softmax_cpu(&mut sch, 1).unwrap();

    let sum = sch.get_loops_by_name("S").unwrap();
    assert_eq!(const_extents(&sum), [Some(2), Some(3), Some(4)]);
    assert_equivalent(&module, sch.module(), &["O"]);
}

#[test]
fn test_axis_out_of_range() {
    let mut sch = cpu(softmax_module());
    let err = schedule_softmax_cpu(&mut sch, 3).unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidArgument { op: "schedule_softmax_cpu", .. }));
}
