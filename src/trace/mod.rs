//! Per-trajectory traces and their ensemble aggregation.
//!
//! - [`types::Tracer`] records frames while a trajectory runs and becomes a
//!   [`types::Trace`] when it finishes.
//! - [`manager::TraceAggregator`] is the contract the batch layer uses to
//!   spawn tracers and merge finished traces; [`manager::TraceManager`] is
//!   the default implementation.

pub mod manager;
pub mod types;

pub use manager::{TraceAggregator, TraceManager};
pub use types::{HopEvent, Trace, TraceFrame, Tracer};
