//! Unit tests for IR construction, lookup, simplification and evaluation.

pub mod lower;
pub mod module;
pub mod printer;
pub mod simplify;

use std::collections::HashMap;

use strata_dtype::DType;

use crate::{Expr, Lowered, Tensor};

/// `C[i, j] = A[i, j] + B[i, j]` over `shape`.
pub fn elementwise_add(shape: &[i64]) -> (Tensor, Tensor, Lowered) {
    let a = Tensor::new("A", shape.iter().copied(), DType::Float32);
    let b = Tensor::new("B", shape.iter().copied(), DType::Float32);
    let c = crate::lower::compute("C", shape, DType::Float32, |i| Expr::load(&a, i.to_vec()) + Expr::load(&b, i.to_vec()));
    (a, b, c)
}

pub fn inputs(entries: &[(&str, Vec<f64>)]) -> HashMap<String, Vec<f64>> {
    entries.iter().map(|(name, data)| (name.to_string(), data.clone())).collect()
}
