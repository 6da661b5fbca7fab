use strata_dtype::DType;

use super::elementwise_add;
use crate::{Expr, ModuleExpr, ReduceKind, Tensor, lower};

#[test]
fn test_print_compute() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let module = ModuleExpr::new([c.stmt]);

    let text = module.to_string();
    assert!(text.contains("for (C_i0, 0, 2) {"), "{text}");
    assert!(text.contains("for (C_i1, 0, 3) {"), "{text}");
    assert!(text.contains("ScheduleBlock(C) {"), "{text}");
    assert!(text.contains("i0, i1 = axis.bind(C_i0, C_i1)"), "{text}");
    assert!(text.contains("C[i0, i1] = (A[i0, i1] + B[i0, i1])"), "{text}");
}

#[test]
fn test_print_reduce_init() {
    let a = Tensor::new("A", [4], DType::Float32);
    let m = lower::reduce("M", &[1], &[4], ReduceKind::Min, DType::Float32, |_, r| Expr::load(&a, [r[0].clone()]));
    let module = ModuleExpr::new([m.stmt]);

    let text = module.to_string();
    assert!(text.contains("i0, r0:r = axis.bind(M_i0, M_r0)"), "{text}");
    assert!(text.contains("init {"), "{text}");
    assert!(text.contains("M[i0] = inf"), "{text}");
    assert!(text.contains("M[i0] = min(M[i0], A[r0])"), "{text}");
}

#[test]
fn test_tree_outline() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let module = ModuleExpr::new([c.stmt]);

    let tree = module.tree();
    assert!(tree.contains("for C_i0 in [0, 2)"), "{tree}");
    assert!(tree.contains("for C_i1 in [0, 3)"), "{tree}");
    assert!(tree.contains("block C -> C[2, 3]"), "{tree}");
}
