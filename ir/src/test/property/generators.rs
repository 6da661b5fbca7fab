//! Generators for property-based testing.

use proptest::prelude::*;

use crate::{Expr, Var};

pub const VARS: [&str; 2] = ["x", "y"];

/// Integer index expressions over `x` and `y`.
///
/// Divisors and moduli are positive constants so every expression is
/// defined for every assignment.
pub fn arb_index_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (-8i64..=8).prop_map(Expr::int),
        prop::sample::select(VARS.to_vec()).prop_map(|name| Expr::var(&Var::new(name))),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a + b),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a - b),
            (inner.clone(), 1i64..=4).prop_map(|(a, k)| a * k),
            (inner.clone(), 1i64..=4).prop_map(|(a, k)| a / k),
            (inner.clone(), 1i64..=4).prop_map(|(a, k)| a % k),
            (inner.clone(), inner).prop_map(|(a, b)| a.min(b)),
        ]
    })
}

/// Values for every name in [`VARS`].
pub fn arb_assignment() -> impl Strategy<Value = [i64; 2]> {
    prop::array::uniform2(-20i64..=20)
}
