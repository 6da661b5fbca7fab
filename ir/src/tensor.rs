use std::sync::Arc;

use smallvec::SmallVec;
use strata_dtype::DType;

/// Shape of a tensor; all extents are static.
pub type Shape = SmallVec<[i64; 4]>;

/// A named, statically shaped buffer.
///
/// Tensors are compared by value; two tensors with the same name are expected
/// to agree on shape and dtype within one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tensor {
    name: Arc<str>,
    shape: Shape,
    dtype: DType,
}

impl Tensor {
    pub fn new(name: impl Into<Arc<str>>, shape: impl IntoIterator<Item = i64>, dtype: DType) -> Self {
        Self { name: name.into(), shape: shape.into_iter().collect(), dtype }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> i64 {
        self.shape.iter().product()
    }

    /// Same shape and dtype under a different name.
    pub fn renamed(&self, name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into(), shape: self.shape.clone(), dtype: self.dtype }
    }

    pub fn with_shape(&self, shape: impl IntoIterator<Item = i64>) -> Self {
        Self { name: self.name.clone(), shape: shape.into_iter().collect(), dtype: self.dtype }
    }
}

impl std::fmt::Display for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}:{}", self.name, self.shape.as_slice(), self.dtype)
    }
}
