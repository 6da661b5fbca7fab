use std::collections::HashMap;

use strata_ir::{BindAxis, ForKind};

use crate::composite::schedule_conv_gpu;
use crate::test::helpers::*;
use crate::{ScheduleParams, cuda_axis_info};

const KEY: &str = "CudaDirectConvSchedule 1 4 8 8 8 4 3 3 1 8 6 6";

fn tuned_params() -> ScheduleParams {
    let entry: HashMap<String, Vec<i64>> = [
        ("f", vec![-1, 2, 2, 1]),
        ("y", vec![-1, 1, 3, 2]),
        ("x", vec![-1, 1, 6, 1]),
        ("rc", vec![-1, 2]),
        ("ry", vec![-1, 3]),
        ("rx", vec![-1, 1]),
    ]
    .into_iter()
    .map(|(role, factors)| (role.to_string(), factors))
    .collect();
    ScheduleParams::builder().entries(vec![(KEY.to_string(), entry)]).build()
}

#[test]
fn test_fallback_mapping() {
    let module = conv_module(1, 4, 6, 6, 8);
    let mut sch = gpu(module.clone());
    schedule_conv_gpu(&mut sch, &ScheduleParams::default()).unwrap();

    assert_eq!(block_names(&sch), ["conv_local", "conv"]);
    assert_eq!(
        loop_kinds(&sch, "conv"),
        [
            ForKind::Serial,
            ForKind::Bound(BindAxis::BlockZ),
            ForKind::Bound(BindAxis::BlockY),
            ForKind::Bound(BindAxis::ThreadZ),
            ForKind::Bound(BindAxis::ThreadX),
            ForKind::Serial,
        ]
    );
    let info = cuda_axis_info(sch.module()).unwrap();
    assert_eq!(info.grid_dims, [1, 6, 2]);
    assert_eq!(info.block_dims, [6, 1, 2]);
    assert_equivalent(&module, sch.module(), &["conv"]);
}

#[test]
fn test_tuned_mapping() {
    let module = conv_module(1, 4, 6, 6, 8);
    let mut sch = gpu(module.clone());
    schedule_conv_gpu(&mut sch, &tuned_params()).unwrap();

    let kinds = loop_kinds(&sch, "conv");
    assert_eq!(kinds.len(), 13);
    for (index, axis) in
        [(1, BindAxis::BlockZ), (2, BindAxis::BlockY), (3, BindAxis::BlockX), (7, BindAxis::ThreadZ), (8, BindAxis::ThreadY), (9, BindAxis::ThreadX)]
    {
        assert_eq!(kinds[index], ForKind::Bound(axis), "loop {index}");
    }
    assert!(kinds[10..].iter().all(|k| *k == ForKind::Unrolled));

    let info = cuda_axis_info(sch.module()).unwrap();
    assert_eq!(info.grid_dims, [1, 1, 2]);
    assert_eq!(info.block_dims, [6, 3, 2]);
    assert_equivalent(&module, sch.module(), &["conv"]);
}

#[test]
fn test_tuned_entry_needs_every_role() {
    let mut params = tuned_params();
    let mut entry = params.get(KEY).unwrap().clone();
    entry.remove("rx");
    params.insert(KEY, entry);

    let mut sch = gpu(conv_module(1, 4, 6, 6, 8));
    let err = schedule_conv_gpu(&mut sch, &params).unwrap_err();
    assert!(matches!(err, crate::ScheduleError::InvalidArgument { op: "schedule_conv_gpu", .. }));
}

#[test]
fn test_rejects_other_layouts() {
    let mut sch = gpu(matmul_module(4, 4, 4));
    assert!(schedule_conv_gpu(&mut sch, &ScheduleParams::default()).is_err());
}
