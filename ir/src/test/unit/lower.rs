use strata_dtype::DType;

use super::elementwise_add;
use crate::{Expr, IterVarKind, ModuleExpr, ReduceKind, Tensor, lower};

#[test]
fn test_compute_nest_shape() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let module = ModuleExpr::new([c.stmt]);

    let block = module.get_block("C").unwrap();
    let block = block.as_schedule_block().unwrap();
    let vars: Vec<&str> = block.iter_vars.iter().map(|iv| iv.var.name()).collect();
    assert_eq!(vars, ["i0", "i1"]);
    assert!(block.iter_vars.iter().all(|iv| iv.kind == IterVarKind::Spatial));
    assert!(block.init.is_none());
    assert!(!block.is_reduction());

    let bindings: Vec<String> = block.iter_values.iter().map(ToString::to_string).collect();
    assert_eq!(bindings, ["C_i0", "C_i1"]);
}

#[test]
fn test_reduce_nest_shape() {
    let a = Tensor::new("A", [8, 16], DType::Float32);
    let s = lower::reduce("S", &[8], &[16], ReduceKind::Sum, DType::Float32, |i, r| {
        Expr::load(&a, [i[0].clone(), r[0].clone()])
    });
    let module = ModuleExpr::new([s.stmt]);

    let loops = module.get_loops("S").unwrap();
    let vars: Vec<&str> = loops.iter().map(|l| l.as_for().unwrap().var.name()).collect();
    assert_eq!(vars, ["S_i0", "S_r0"]);

    let block = module.get_block("S").unwrap();
    let block = block.as_schedule_block().unwrap();
    assert!(block.is_reduction());
    assert!(block.init.is_some());
    assert_eq!(block.iter_vars[1].kind, IterVarKind::Reduce);
    assert_eq!(block.iter_vars[1].extent, 16);

    // The accumulator self-read comes first.
    let reads: Vec<String> = block.reads().iter().map(|t| t.name().to_string()).collect();
    assert_eq!(reads, ["S", "A"]);
}

#[test]
fn test_reduce_kind_combiner() {
    for kind in [ReduceKind::Sum, ReduceKind::Product, ReduceKind::Min, ReduceKind::Max] {
        assert_eq!(ReduceKind::from_combiner(kind.combiner()), Some(kind));
    }
    assert_eq!(ReduceKind::Sum.identity(), Expr::float(0.0));
    assert_eq!(ReduceKind::Max.to_string(), "max");
}

#[test]
fn test_scalar_compute_has_no_loops() {
    let c = lower::compute("C", &[], DType::Float32, |_| Expr::float(2.0));
    let module = ModuleExpr::new([c.stmt]);

    assert!(module.get_loops("C").unwrap().is_empty());
}
