use test_case::test_case;

use crate::{Affine, Expr, Var, simplify};

fn x() -> Expr {
    Expr::var(&Var::new("x"))
}

fn y() -> Expr {
    Expr::var(&Var::new("y"))
}

// =============================================================================
// Identities and affine canonicalization
// =============================================================================

#[test_case(x() + 0, x(); "add_zero")]
#[test_case(x() * 1, x(); "mul_one")]
#[test_case(x() - 0, x(); "sub_zero")]
#[test_case(x() * 0, Expr::int(0); "mul_zero")]
#[test_case(x() - x(), Expr::int(0); "self_cancel")]
#[test_case(x() / 1, x(); "div_one")]
#[test_case(x() % 1, Expr::int(0); "mod_one")]
#[test_case(x().min(x()), x(); "min_same")]
#[test_case(x().max(x()), x(); "max_same")]
#[test_case((x() * 4 + 8) / 4, x() + 2; "div_divisible")]
#[test_case((x() * 4 + 3) % 4, Expr::int(3); "mod_drops_multiples")]
#[test_case((x() * 8 + y()) % 4, y() % 4; "mod_keeps_remainder")]
#[test_case(x() * 2 + x() * 3, x() * 5; "collect_terms")]
fn test_simplify(input: Expr, expected: Expr) {
    assert_eq!(simplify(&input), expected);
}

#[test]
fn test_simplify_keeps_non_divisible_div() {
    let e = (x() * 4 + 3) / 2;
    assert_eq!(simplify(&e), e);
}

#[test]
fn test_select_on_constant() {
    let e = Expr::select(Expr::int(1).lt(2), x(), y());
    assert_eq!(simplify(&e), x());
}

// =============================================================================
// Constant folding (integer division is Euclidean)
// =============================================================================

#[test_case(Expr::int(-7) / 2, -4; "div_negative")]
#[test_case(Expr::int(-7) % 2, 1; "mod_negative")]
#[test_case(Expr::int(7) / 2, 3; "div_positive")]
#[test_case(Expr::int(7) % -2, 1; "mod_negative_divisor")]
#[test_case(Expr::int(3).min(5), 3; "min")]
#[test_case(Expr::int(3).max(5), 5; "max")]
fn test_fold_int(input: Expr, expected: i64) {
    assert_eq!(simplify(&input).as_int(), Some(expected));
}

#[test]
fn test_division_by_zero_not_folded() {
    let e = Expr::int(4) / 0;
    assert_eq!(simplify(&e), e);
}

// =============================================================================
// Affine decomposition
// =============================================================================

#[test]
fn test_affine_of() {
    let (vx, vy) = (Var::new("x"), Var::new("y"));
    let affine = Affine::of(&(x() * 3 + y() - 2 + x())).unwrap();
    assert_eq!(affine.coeff(&vx), 4);
    assert_eq!(affine.coeff(&vy), 1);
    assert_eq!(affine.constant, -2);
    assert_eq!(affine.terms[0].0, vx);
}

#[test]
fn test_affine_rejects_nonlinear() {
    assert!(Affine::of(&(x() * y())).is_none());
    assert!(Affine::of(&(x() / 2)).is_none());
    assert!(Affine::of(&x().min(4)).is_none());
}

#[test]
fn test_affine_partition() {
    let affine = Affine::of(&(x() * 4 + y() + 1)).unwrap();
    let (kept, rest) = affine.partition(|v| v.name() == "x");
    assert_eq!(kept.to_expr(), x() * 4 + 1);
    assert_eq!(rest.to_expr(), y());
    assert!(kept.plus(&Affine::constant(-1), 1).divisible_by(4));
}
