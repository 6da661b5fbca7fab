//! Loop-nest intermediate representation for the strata scheduler.
//!
//! This crate defines the program a schedule rewrites and the queries it
//! rewrites through.
//!
//! # Module Organization
//!
//! - [`types`] - Constants, operators, loop kinds, bind axes, storage scopes
//! - [`expr`] - Scalar expressions ([`Expr`], [`Var`])
//! - [`stmt`] - Loop-nest statements ([`Stmt`], [`For`], [`ScheduleBlock`])
//! - [`tensor`] - Named static-shape buffers
//! - [`module`] - [`ModuleExpr`] and node lookup (`get_all_blocks`, `get_block`, `get_loops`, `replace`)
//! - [`affine`] / [`simplify`] - Index arithmetic analysis and cleanup
//! - [`eval`] - Reference interpreter used to check rewrites numerically
//! - [`lower`] - Canonical unscheduled nests for compute and reduce definitions
//! - [`error`] - Error types and result handling

pub mod affine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod lower;
pub mod module;
pub mod printer;
pub mod simplify;
pub mod stmt;
pub mod tensor;
pub mod tree;
pub mod types;


pub use affine::Affine;
pub use error::{Error, Result};
pub use expr::{Expr, Var};
pub use lower::{Lowered, ReduceKind};
pub use module::{ModuleExpr, NameGen, NodePath};
pub use simplify::simplify;
pub use stmt::{For, IterVar, ScheduleBlock, Stmt};
pub use tensor::{Shape, Tensor};
pub use types::{BinaryOp, BindAxis, ConstValue, ForKind, IterVarKind, LoopId, MemoryScope, UnaryOp};

pub use strata_dtype::DType;
