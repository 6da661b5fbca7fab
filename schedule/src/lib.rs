//! Schedule engine for the strata loop-nest IR.
//!
//! A schedule rewrites an unscheduled loop nest into an equivalent,
//! hardware-shaped one through a fixed catalog of primitives, chained into
//! per-operator recipes.
//!
//! # Module Organization
//!
//! - [`ir_schedule`] - [`IrSchedule`] session and the primitive rewrites
//!   (split, fuse, reorder, bind, compute_at, compute_inline, cache_read,
//!   cache_write, rfactor, ...)
//! - [`composite`] - Per-operator recipes for CPU and GPU targets
//! - [`strategy`] - [`OpPattern`] and target dispatch
//! - [`target`] - [`Target`] descriptors
//! - [`params`] - Tuned split factors keyed by shape signature
//! - [`gpudims`] - Launch dimensions of a GPU-scheduled module
//! - [`error`] - Error types and result handling

pub mod composite;
pub mod error;
pub mod gpudims;
pub mod ir_schedule;
pub mod params;
pub mod strategy;
pub mod target;


pub use error::{Result, ScheduleError};
pub use gpudims::{CudaAxisInfo, cuda_axis_info};
pub use ir_schedule::IrSchedule;
pub use params::{ParamEntry, ParamsError, ScheduleParams, conv_key};
pub use strategy::{OpPattern, apply_schedule};
pub use target::{Arch, Target};
