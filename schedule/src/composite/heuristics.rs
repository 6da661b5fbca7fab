//! Factor heuristics shared by the composite schedules.

use strata_dtype::DType;

use crate::target::Target;

/// Elements of `dtype` that fit one SIMD register of `target`.
pub fn basic_vector_factor(dtype: DType, target: &Target) -> i64 {
    dtype.lanes_in(target.vector_bits) as i64
}

/// Largest power of two that divides `extent` and does not exceed `limit`.
///
/// Returns 1 when `extent` is odd or `limit < 2`.
pub fn vectorize_factor(extent: i64, limit: i64) -> i64 {
    let mut factor = 1;
    while factor * 2 <= limit && extent % (factor * 2) == 0 {
        factor *= 2;
    }
    factor
}

/// Largest power of two `p` dividing `n` with `p * p <= n`.
///
/// Splits a dimension into two roughly even power-of-two parts.
pub fn split_even(n: i64) -> i64 {
    let mut p = 1;
    while n % (p * 2) == 0 && (p * 2) * (p * 2) <= n {
        p *= 2;
    }
    p
}

/// Inner split factor for a dimension of size `origin` whose threads are
/// multiplied by `other` threads along another axis.
///
/// Only the power-of-two part of `origin` is distributed to threads; it is
/// shrunk until each half of its even split fits under 1024 threads when
/// combined with `other`. When `origin` is a pure power of two the inner
/// factor is capped at 2, otherwise the odd remainder is kept inner.
pub fn inner_splitter(origin: i64, other: i64) -> i64 {
    if origin <= 1 {
        return 1;
    }
    let mut two_exp = 1;
    while origin % (two_exp * 2) == 0 {
        two_exp *= 2;
    }
    if origin == two_exp {
        return origin.min(2);
    }
    let mut a = split_even(two_exp);
    let mut b = two_exp / a;
    while two_exp > 1 && (a * other >= 1024 || b * other >= 1024) {
        two_exp /= 2;
        a = split_even(two_exp);
        b = two_exp / a;
    }
    origin / two_exp
}
