//! Element types for strata tensors.
//!
//! The scheduler only needs storage widths (to size vector loops) and a
//! printable name for the IR printer; everything else about a type belongs
//! to code generation.


/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::VariantArray, strum::IntoStaticStr, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarDType {
    Bool,

    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,

    Float16,
    BFloat16,
    Float32,
    Float64,

    /// Loop variables and index arithmetic.
    Index,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Index => 8,
        }
    }

    pub const fn bits(&self) -> usize {
        self.bytes() * 8
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    pub const fn is_int(&self) -> bool {
        !self.is_float() && !matches!(self, Self::Bool)
    }
}

/// Element type of a tensor: a scalar, or a packed vector of `count`
/// scalars as produced by a vectorized loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    Scalar(ScalarDType),
    Vector { scalar: ScalarDType, count: usize },
}

impl From<ScalarDType> for DType {
    fn from(scalar: ScalarDType) -> Self {
        Self::Scalar(scalar)
    }
}

impl DType {
    /// Pack `count` elements of this type; `None` for a vector.
    pub fn vec(&self, count: usize) -> Option<Self> {
        match self {
            _ if count == 1 => Some(*self),
            Self::Scalar(s) => Some(Self::Vector { scalar: *s, count }),
            Self::Vector { .. } => None,
        }
    }

    pub fn base(&self) -> ScalarDType {
        match self {
            Self::Scalar(s) | Self::Vector { scalar: s, .. } => *s,
        }
    }

    /// Number of lanes, 1 for scalars.
    pub fn count(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector { count, .. } => *count,
        }
    }

    pub fn bits(&self) -> usize {
        self.base().bits() * self.count()
    }

    /// How many elements fit a register of `register_bits`, at least 1.
    pub fn lanes_in(&self, register_bits: usize) -> usize {
        (register_bits / self.bits().max(1)).max(1)
    }

    pub fn is_float(&self) -> bool {
        self.base().is_float()
    }

    pub fn is_int(&self) -> bool {
        self.base().is_int()
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.base().into();
        match self {
            Self::Scalar(_) => f.write_str(name),
            Self::Vector { count, .. } => write!(f, "{name}x{count}"),
        }
    }
}

#[allow(non_upper_case_globals)]
impl DType {
    pub const Bool: Self = Self::Scalar(ScalarDType::Bool);
    pub const Int8: Self = Self::Scalar(ScalarDType::Int8);
    pub const Int16: Self = Self::Scalar(ScalarDType::Int16);
    pub const Int32: Self = Self::Scalar(ScalarDType::Int32);
    pub const Int64: Self = Self::Scalar(ScalarDType::Int64);
    pub const UInt8: Self = Self::Scalar(ScalarDType::UInt8);
    pub const UInt16: Self = Self::Scalar(ScalarDType::UInt16);
    pub const UInt32: Self = Self::Scalar(ScalarDType::UInt32);
    pub const UInt64: Self = Self::Scalar(ScalarDType::UInt64);
    pub const Float16: Self = Self::Scalar(ScalarDType::Float16);
    pub const BFloat16: Self = Self::Scalar(ScalarDType::BFloat16);
    pub const Float32: Self = Self::Scalar(ScalarDType::Float32);
    pub const Float64: Self = Self::Scalar(ScalarDType::Float64);
    pub const Index: Self = Self::Scalar(ScalarDType::Index);
}
