use std::sync::Arc;

use strata_dtype::DType;

use super::elementwise_add;
use crate::{Error, Expr, ModuleExpr, Stmt, lower};

#[test]
fn test_get_block_by_name() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let module = ModuleExpr::new([c.stmt]);

    let block = module.get_block("C").unwrap();
    let block = block.as_schedule_block().unwrap();
    assert_eq!(&*block.name, "C");
    assert_eq!(block.write.name(), "C");
    assert_eq!(module.get_all_blocks().len(), 1);
}

#[test]
fn test_get_block_missing() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let module = ModuleExpr::new([c.stmt]);

    assert_eq!(module.get_block("D").unwrap_err(), Error::BlockNotFound { name: "D".into() });
}

#[test]
fn test_get_block_ambiguous() {
    let (_, _, first) = elementwise_add(&[2]);
    let (_, _, second) = elementwise_add(&[2]);
    let module = ModuleExpr::new([first.stmt, second.stmt]);

    assert_eq!(module.get_block("C").unwrap_err(), Error::AmbiguousBlock { name: "C".into(), count: 2 });
    assert!(matches!(module.get_loops("C"), Err(Error::AmbiguousBlock { .. })));
}

#[test]
fn test_get_loops_outer_to_inner() {
    let (_, _, c) = elementwise_add(&[2, 3, 4]);
    let module = ModuleExpr::new([c.stmt]);

    let loops = module.get_loops("C").unwrap();
    let vars: Vec<&str> = loops.iter().map(|l| l.as_for().unwrap().var.name()).collect();
    assert_eq!(vars, ["C_i0", "C_i1", "C_i2"]);

    let extents: Vec<i64> = loops.iter().map(|l| l.as_for().unwrap().const_extent().unwrap()).collect();
    assert_eq!(extents, [2, 3, 4]);
}

#[test]
fn test_get_loop_by_id() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let module = ModuleExpr::new([c.stmt]);

    let inner = module.get_loops("C").unwrap()[1].clone();
    let id = inner.as_for().unwrap().id;
    let found = module.get_loop(id).unwrap();
    assert!(Arc::ptr_eq(&found, &inner));

    let path = module.loop_path(id).unwrap();
    assert_eq!(path.root, 0);
    assert_eq!(path.nodes.len(), 2);
}

#[test]
fn test_replace_swaps_subtree() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let mut module = ModuleExpr::new([c.stmt]);

    let inner = module.get_loops("C").unwrap()[1].clone();
    let f = inner.as_for().unwrap();
    let parallel = Arc::new(Stmt::For(f.with_kind(crate::ForKind::Parallel)));
    module.replace(&inner, parallel).unwrap();

    let loops = module.get_loops("C").unwrap();
    assert_eq!(loops[1].as_for().unwrap().kind, crate::ForKind::Parallel);
    assert_eq!(loops[1].as_for().unwrap().id, f.id);
}

#[test]
fn test_replace_stale_handle() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let mut module = ModuleExpr::new([c.stmt]);

    let inner = module.get_loops("C").unwrap()[1].clone();
    let f = inner.as_for().unwrap();
    module.replace(&inner, Arc::new(Stmt::For(f.with_kind(crate::ForKind::Unrolled)))).unwrap();

    let again = Arc::new(Stmt::For(f.with_kind(crate::ForKind::Parallel)));
    assert_eq!(module.replace(&inner, again).unwrap_err(), Error::ReplaceTargetNotFound);
}

#[test]
fn test_remove_prunes_empty_root() {
    let (_, _, c) = elementwise_add(&[2, 3]);
    let d = lower::compute("D", &[2], DType::Float32, |_| Expr::float(1.0));
    let mut module = ModuleExpr::new([c.stmt, d.stmt]);

    let block = module.get_block("C").unwrap();
    module.remove(&block).unwrap();

    assert_eq!(module.exprs().len(), 1);
    assert!(module.get_block("D").is_ok());
    assert!(matches!(module.get_block("C"), Err(Error::BlockNotFound { .. })));
}

#[test]
fn test_tensors_first_appearance() {
    let (_, _, c) = elementwise_add(&[2]);
    let module = ModuleExpr::new([c.stmt]);

    let names: Vec<String> = module.tensors().iter().map(|t| t.name().to_string()).collect();
    assert_eq!(names, ["C", "A", "B"]);
}

#[test]
fn test_name_gen_avoids_used_names() {
    let (_, _, c) = elementwise_add(&[2]);
    let module = ModuleExpr::new([c.stmt]);
    let mut names = module.name_gen();

    assert_eq!(names.block_and_tensor("C"), "C_1");
    assert_eq!(names.block_and_tensor("C"), "C_2");
    // "A" is a tensor, not a block, but block_and_tensor must avoid both.
    assert_eq!(names.block_and_tensor("A"), "A_1");
    assert_eq!(names.var("C_i0").name(), "C_i0_1");
    assert_eq!(names.var("k").name(), "k");
}

/// `for C_i0 { [for B_i0 { B }, C] }`: both blocks under one loop.
fn shared_nest() -> ModuleExpr {
    let (a, _, c) = elementwise_add(&[4]);
    let b = lower::compute("B", &[4], DType::Float32, |i| Expr::load(&a, i.to_vec()));
    let outer = c.stmt.as_for().unwrap();
    ModuleExpr::new([Arc::new(Stmt::For(outer.with_body(Stmt::block([b.stmt.clone(), outer.body.clone()]))))])
}

fn marker() -> Arc<Stmt> {
    let t = crate::Tensor::new("M", [1], DType::Float32);
    Stmt::store(&t, [Expr::from(0i64)], Expr::from(1.0))
}

fn loop_body(module: &ModuleExpr) -> Vec<Arc<Stmt>> {
    let root = module.exprs()[0].as_for().unwrap();
    match root.body.as_ref() {
        Stmt::Block(children) => children.clone(),
        other => panic!("expected a sequence, got {other:?}"),
    }
}

#[test]
fn test_insert_beside_stays_in_shared_loop() {
    let mut module = shared_nest();
    let anchor = module.block_path("B").unwrap();
    let own = anchor.nodes[2].clone();
    module.insert_beside(&anchor, marker(), true).unwrap();

    assert_eq!(module.exprs().len(), 1);
    let body = loop_body(&module);
    assert_eq!(body.len(), 3);
    assert!(Arc::ptr_eq(&body[0], &own));
    assert!(matches!(body[1].as_ref(), Stmt::Store { .. }));
    assert!(body[2].as_schedule_block().is_some());
}

#[test]
fn test_insert_beside_before_block() {
    let mut module = shared_nest();
    let anchor = module.block_path("C").unwrap();
    module.insert_beside(&anchor, marker(), false).unwrap();

    let body = loop_body(&module);
    assert_eq!(body.len(), 3);
    assert!(matches!(body[1].as_ref(), Stmt::Store { .. }));
    assert_eq!(&*body[2].as_schedule_block().unwrap().name, "C");
}

#[test]
fn test_insert_beside_separate_roots() {
    let (_, _, c) = elementwise_add(&[2]);
    let d = lower::compute("D", &[2], DType::Float32, |_| Expr::float(1.0));
    let mut module = ModuleExpr::new([c.stmt, d.stmt]);

    let anchor = module.block_path("C").unwrap();
    module.insert_beside(&anchor, marker(), true).unwrap();

    assert_eq!(module.exprs().len(), 3);
    assert!(matches!(module.exprs()[1].as_ref(), Stmt::Store { .. }));
}

#[test]
fn test_insert_beside_splits_branch() {
    let (_, _, c) = elementwise_add(&[2]);
    let d = lower::compute("D", &[2], DType::Float32, |_| Expr::float(1.0));
    let branch = Arc::new(Stmt::IfThenElse { cond: Expr::from(true), then_case: c.stmt, else_case: Some(d.stmt) });
    let mut module = ModuleExpr::new([branch]);

    let anchor = module.block_path("C").unwrap();
    module.insert_beside(&anchor, marker(), false).unwrap();

    let Stmt::IfThenElse { then_case, .. } = module.exprs()[0].as_ref() else {
        panic!("branch should survive");
    };
    let Stmt::Block(children) = then_case.as_ref() else {
        panic!("then case should become a sequence");
    };
    assert_eq!(children.len(), 2);
    assert!(matches!(children[0].as_ref(), Stmt::Store { .. }));
    assert!(module.get_block("C").is_ok());
}
