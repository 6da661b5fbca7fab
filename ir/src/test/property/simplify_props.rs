use std::collections::HashMap;

use proptest::prelude::*;

use super::generators::{VARS, arb_assignment, arb_index_expr};
use crate::{Affine, Expr, Var, simplify};

fn bind(values: [i64; 2]) -> HashMap<Var, Expr> {
    VARS.iter().zip(values).map(|(name, v)| (Var::new(*name), Expr::int(v))).collect()
}

fn value_of(e: &Expr, values: [i64; 2]) -> Option<i64> {
    simplify(&e.substitute(&bind(values))).as_int()
}

proptest! {
    #[test]
    fn simplify_preserves_value(e in arb_index_expr(), values in arb_assignment()) {
        let expected = value_of(&e, values);
        prop_assert!(expected.is_some(), "{e} did not fold to a constant");
        prop_assert_eq!(value_of(&simplify(&e), values), expected);
    }

    #[test]
    fn simplify_is_idempotent(e in arb_index_expr()) {
        let once = simplify(&e);
        prop_assert_eq!(simplify(&once), once);
    }

    #[test]
    fn affine_round_trips_value(e in arb_index_expr(), values in arb_assignment()) {
        if let Some(affine) = Affine::of(&e) {
            prop_assert_eq!(value_of(&affine.to_expr(), values), value_of(&e, values));
        }
    }
}
