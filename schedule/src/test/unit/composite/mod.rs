//! Composite schedule tests.
//!
//! Builders here lower the operator layouts each recipe expects.

pub mod conv;
pub mod heuristics;
pub mod matmul;
pub mod pool;
pub mod softmax;
pub mod split;

use strata_dtype::DType;
use strata_ir::lower::{self, Lowered, ReduceKind};
use strata_ir::{Expr, ModuleExpr, Tensor};

use crate::test::helpers::tensor;

/// `E = exp(X)`, `S = sum(E, axis = -1)`, `O = E / S` over `[2, 3, 4]`.
pub fn softmax_module() -> ModuleExpr {
    let x = tensor("X", &[2, 3, 4]);
    let e = lower::compute("E", &[2, 3, 4], DType::Float32, |i| Expr::load(&x, i.to_vec()).exp());
    let s = lower::reduce("S", &[2, 3], &[4], ReduceKind::Sum, DType::Float32, |i, r| {
        Expr::load(&e.tensor, [i[0].clone(), i[1].clone(), r[0].clone()])
    });
    let o = lower::compute("O", &[2, 3, 4], DType::Float32, |i| {
        Expr::load(&e.tensor, i.to_vec()) / Expr::load(&s.tensor, [i[0].clone(), i[1].clone()])
    });
    ModuleExpr::new([e.stmt, s.stmt, o.stmt])
}

/// 2x2 max pooling with stride 2 of `X: [1, 2, 8, 8]`.
pub fn max_pool_module() -> ModuleExpr {
    let x = tensor("X", &[1, 2, 8, 8]);
    let p = lower::reduce("P", &[1, 2, 4, 4], &[2, 2], ReduceKind::Max, DType::Float32, |i, r| {
        let row = i[2].clone() * 2 + r[0].clone();
        let col = i[3].clone() * 2 + r[1].clone();
        Expr::load(&x, [i[0].clone(), i[1].clone(), row, col])
    });
    ModuleExpr::new([p.stmt])
}

/// Global average pooling numerator of `X: [2, 32, 64]` in two stages:
/// `P[n, c, t]` sums 16 consecutive elements, `O[n, c]` sums the 4 partials.
pub fn global_pool_module() -> ModuleExpr {
    let x = tensor("X", &[2, 32, 64]);
    let p = lower::reduce("P", &[2, 32, 4], &[16], ReduceKind::Sum, DType::Float32, |i, r| {
        Expr::load(&x, [i[0].clone(), i[1].clone(), i[2].clone() * 16 + r[0].clone()])
    });
    let o = lower::reduce("O", &[2, 32], &[4], ReduceKind::Sum, DType::Float32, |i, r| {
        Expr::load(&p.tensor, [i[0].clone(), i[1].clone(), r[0].clone()])
    });
    ModuleExpr::new([p.stmt, o.stmt])
}

/// `X: [rows, w0 + w1]` split along axis 1 into `Y0: [rows, w0]` and
/// `Y1: [rows, w1]`.
pub fn split_module(rows: i64, widths: [i64; 2]) -> ModuleExpr {
    let x = tensor("X", &[rows, widths[0] + widths[1]]);
    let y0 = lower::compute("Y0", &[rows, widths[0]], DType::Float32, |i| Expr::load(&x, i.to_vec()));
    let y1 = lower::compute("Y1", &[rows, widths[1]], DType::Float32, |i| {
        Expr::load(&x, [i[0].clone(), i[1].clone() + widths[0]])
    });
    ModuleExpr::new([y0.stmt, y1.stmt])
}

/// `R[shape] = sum_k X[shape, k]` with `k < 16`.
pub fn trailing_reduce_module(shape: &[i64]) -> ModuleExpr {
    let mut x_shape = shape.to_vec();
    x_shape.push(16);
    let x = tensor("X", &x_shape);
    let r = lower::reduce("R", shape, &[16], ReduceKind::Sum, DType::Float32, |i, r| {
        let mut idx = i.to_vec();
        idx.push(r[0].clone());
        Expr::load(&x, idx)
    });
    ModuleExpr::new([r.stmt])
}

/// Per-thread partial sums `T[a, t] = sum_r X[a, t * 4 + r]` combined into
/// `O[a] = sum_t T[a, t]`, with `rows == 0` meaning a single row without
/// the leading dimension.
pub fn block_reduce_internal(rows: i64) -> (Lowered, Lowered) {
    if rows == 0 {
        let x = tensor("X", &[32]);
        let t = lower::reduce("T", &[8], &[4], ReduceKind::Sum, DType::Float32, |i, r| {
            Expr::load(&x, [i[0].clone() * 4 + r[0].clone()])
        });
        let o = lower::reduce("O", &[1], &[8], ReduceKind::Sum, DType::Float32, |_, r| {
            Expr::load(&t.tensor, [r[0].clone()])
        });
        return (t, o);
    }
    let x = tensor("X", &[rows, 32]);
    let t = lower::reduce("T", &[rows, 8], &[4], ReduceKind::Sum, DType::Float32, |i, r| {
        Expr::load(&x, [i[0].clone(), i[1].clone() * 4 + r[0].clone()])
    });
    let o = lower::reduce("O", &[rows], &[8], ReduceKind::Sum, DType::Float32, |i, r| {
        Expr::load(&t.tensor, [i[0].clone(), r[0].clone()])
    });
    (t, o)
}

pub fn module_of(stages: impl IntoIterator<Item = Lowered>) -> ModuleExpr {
    ModuleExpr::new(stages.into_iter().map(|l| l.stmt))
}

pub fn written(lowered: &Lowered) -> Tensor {
    lowered.tensor.clone()
}
