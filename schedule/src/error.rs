use snafu::Snafu;
use strata_ir::{LoopId, MemoryScope};

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ScheduleError {
    /// Lookup or replacement failure in the module.
    #[snafu(context(false), display("{source}"))]
    Ir { source: strata_ir::Error },

    #[snafu(display("invalid argument for {op}: {reason}"))]
    InvalidArgument { op: &'static str, reason: String },

    #[snafu(display("{op} requires a constant extent on loop {id}"))]
    NonConstantExtent { op: &'static str, id: LoopId },

    #[snafu(display("invalid split factors {factors:?} for extent {extent}"))]
    InvalidSplitFactors { factors: Vec<i64>, extent: i64 },

    #[snafu(display("{op}: loops are not a perfectly nested chain"))]
    NotPerfectlyNested { op: &'static str },

    #[snafu(display("cannot vectorize loop {id}: extent {extent} is not divisible by {factor}"))]
    VectorizeFactorMismatch { id: LoopId, extent: i64, factor: usize },

    #[snafu(display("axis '{axis}' is not a GPU bind axis"))]
    InvalidBindAxis { axis: String },

    #[snafu(display("axis {axis} is already bound on the nest of loop {id}"))]
    BindCollision { axis: String, id: LoopId },

    #[snafu(display("{op}: target does not support storage scope '{scope}'"))]
    UnsupportedScope { op: &'static str, scope: MemoryScope },

    #[snafu(display("'{scope}' is not a storage scope"))]
    InvalidScope { scope: String },

    #[snafu(display("block '{block}' has {count} reads; index {index} is out of range"))]
    ReadIndexOutOfRange { block: String, index: usize, count: usize },

    /// The rewrite would break a producer/consumer dependency.
    #[snafu(display("{op} on block '{block}' is unsafe: {reason}"))]
    DependencyViolation { op: &'static str, block: String, reason: String },

    /// The block shape does not admit this rewrite.
    #[snafu(display("{op} on block '{block}' is not supported: {reason}"))]
    UnsupportedBlock { op: &'static str, block: String, reason: String },
}
