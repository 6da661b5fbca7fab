use snafu::Snafu;

use crate::types::LoopId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No schedule block carries the requested name.
    #[snafu(display("schedule block '{name}' not found"))]
    BlockNotFound { name: String },

    /// More than one schedule block carries the requested name.
    #[snafu(display("schedule block name '{name}' is ambiguous: {count} blocks match"))]
    AmbiguousBlock { name: String, count: usize },

    /// A loop handle no longer resolves in the module.
    #[snafu(display("loop {id} not found"))]
    LoopNotFound { id: LoopId },

    /// `replace` target is not (or no longer) part of the module.
    #[snafu(display("replace target not found in module"))]
    ReplaceTargetNotFound,

    /// A handle of the wrong node kind was passed.
    #[snafu(display("expected {expected} node, found {found}"))]
    UnexpectedNode { expected: &'static str, found: &'static str },

    // Interpreter failures.
    #[snafu(display("unbound variable '{name}'"))]
    UnboundVar { name: String },

    #[snafu(display("unknown tensor '{name}'"))]
    UnknownTensor { name: String },

    #[snafu(display("input '{name}' has {actual} elements, tensor expects {expected}"))]
    InputSizeMismatch { name: String, expected: usize, actual: usize },

    #[snafu(display("access {tensor}{indices:?} out of bounds for shape {shape:?}"))]
    OutOfBounds { tensor: String, indices: Vec<i64>, shape: Vec<i64> },

    #[snafu(display("expected integer value in {context}"))]
    NonIntegerValue { context: &'static str },

    /// Division by zero.
    #[snafu(display("division by zero"))]
    DivisionByZero,
}
