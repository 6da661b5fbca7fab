//! Type definitions for the loop-nest IR.
//!
//! This module contains the small enums and identifiers shared by expressions
//! and statements: constants, operators, loop kinds, GPU bind axes, iteration
//! variable kinds and storage scopes.

use std::sync::atomic::{AtomicU64, Ordering};

use strata_dtype::DType;

/// Constant value carried by an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Index,
            Self::Float(_) => DType::Float32,
            Self::Bool(_) => DType::Bool,
        }
    }

    /// Integer view; floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(b) => Some(*b as i64),
            Self::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
            Self::Bool(b) => *b as u8 as f64,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Bool(b) => *b,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_infinite() => write!(f, "{}inf", if *v < 0.0 { "-" } else { "" }),
            Self::Float(v) => write!(f, "{v:?}f"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Unary operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Logical not
    Not,
    Abs,
    Exp,
    Log,
    Sqrt,
}

/// Binary operation types.
///
/// Integer `Div` and `Mod` are Euclidean (floor division for the positive
/// divisors index arithmetic uses), so `(a / b) * b + a % b == a`. Float
/// `Div` is IEEE division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,

    // Comparison operations
    Lt,
    Le,
    Eq,
    Ne,

    // Logical operations
    And,
    Or,
}

impl BinaryOp {
    /// Returns true if this is a comparison operation.
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Eq | Self::Ne)
    }

    /// Returns true if this operation is commutative.
    pub fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Min | Self::Max | Self::Eq | Self::Ne | Self::And | Self::Or)
    }

    /// Operators usable as a reduction combiner.
    pub fn is_reduction_combiner(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Min | Self::Max)
    }

    /// Infix spelling, `None` for function-style operators.
    pub fn symbol(self) -> Option<&'static str> {
        Some(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Min | Self::Max => return None,
        })
    }
}

/// GPU launch axis a loop can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumString, strum::Display, strum::EnumIter)]
pub enum BindAxis {
    #[strum(serialize = "threadIdx.x")]
    ThreadX,
    #[strum(serialize = "threadIdx.y")]
    ThreadY,
    #[strum(serialize = "threadIdx.z")]
    ThreadZ,
    #[strum(serialize = "blockIdx.x")]
    BlockX,
    #[strum(serialize = "blockIdx.y")]
    BlockY,
    #[strum(serialize = "blockIdx.z")]
    BlockZ,
}

impl BindAxis {
    pub const fn is_thread(&self) -> bool {
        matches!(self, Self::ThreadX | Self::ThreadY | Self::ThreadZ)
    }

    pub const fn is_block(&self) -> bool {
        !self.is_thread()
    }

    /// Dimension index: x = 0, y = 1, z = 2.
    pub const fn dim(&self) -> usize {
        match self {
            Self::ThreadX | Self::BlockX => 0,
            Self::ThreadY | Self::BlockY => 1,
            Self::ThreadZ | Self::BlockZ => 2,
        }
    }
}

/// Execution annotation of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ForKind {
    #[default]
    Serial,
    Parallel,
    Vectorized {
        factor: usize,
    },
    Unrolled,
    /// Bound to a GPU thread or block index.
    Bound(BindAxis),
}

impl ForKind {
    pub fn bind_axis(&self) -> Option<BindAxis> {
        match self {
            Self::Bound(axis) => Some(*axis),
            _ => None,
        }
    }
}

impl std::fmt::Display for ForKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Parallel => write!(f, "parallel"),
            Self::Vectorized { factor } => write!(f, "vectorize[{factor}]"),
            Self::Unrolled => write!(f, "unroll"),
            Self::Bound(axis) => write!(f, "bind[{axis}]"),
        }
    }
}

/// Whether a block iteration variable is data-parallel or a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IterVarKind {
    Spatial,
    Reduce,
}

/// Storage scope of the buffer a schedule block writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(strum::EnumString, strum::Display, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MemoryScope {
    #[default]
    Global,
    Shared,
    Local,
}

// Monotonic loop identities; never reused within a process.
static LOOP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a loop.
///
/// A rewrite that keeps a loop (changing its kind, body or position) keeps
/// its id; loops created by a rewrite get fresh ids. Callers re-resolve
/// loop handles through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u64);

impl LoopId {
    pub fn fresh() -> Self {
        Self(LOOP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}
