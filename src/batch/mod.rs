//! Batch execution.
//!
//! This module provides:
//! - [`controller::BatchedTrajectories`] -- sampling, building, running and
//!   aggregating one batch, sequentially or on a worker pool.
//! - [`scheduler::Scheduler`] -- the work/result channel pipeline.
//! - [`interrupt::Interrupt`] -- cooperative cancellation, optionally wired to
//!   Ctrl-C.

pub mod controller;
pub mod interrupt;
pub mod scheduler;

// Re-export the most commonly used items at the module level.
pub use controller::BatchedTrajectories;
pub use interrupt::Interrupt;
pub use scheduler::{Scheduler, WorkItem, WorkResult};
