use strata_dtype::DType;
use test_case::test_case;

use crate::Target;
use crate::composite::{basic_vector_factor, inner_splitter, split_even, vectorize_factor};

#[test]
fn test_basic_vector_factor() {
    assert_eq!(basic_vector_factor(DType::Float32, &Target::x86()), 16);
    assert_eq!(basic_vector_factor(DType::Float32, &Target::cuda()), 4);
}

#[test_case(64, 16 => 16 ; "limited")]
#[test_case(24, 16 => 8 ; "largest power of two divisor")]
#[test_case(7, 16 => 1 ; "odd")]
#[test_case(64, 1 => 1 ; "no vector unit")]
fn test_vectorize_factor(extent: i64, limit: i64) -> i64 {
    vectorize_factor(extent, limit)
}

#[test_case(16 => 4)]
#[test_case(8 => 2)]
#[test_case(12 => 2)]
#[test_case(7 => 1)]
fn test_split_even(n: i64) -> i64 {
    split_even(n)
}

#[test_case(1, 6 => 1 ; "unit")]
#[test_case(8, 6 => 2 ; "power of two")]
#[test_case(24, 6 => 3 ; "odd remainder")]
#[test_case(96, 200 => 6 ; "shrinks under the thread limit")]
fn test_inner_splitter(origin: i64, other: i64) -> i64 {
    inner_splitter(origin, other)
}
