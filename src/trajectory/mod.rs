//! Trajectory contract and outcome types.
//!
//! This module provides:
//! - [`traits::Trajectory`], [`traits::TrajectoryFactory`] -- what the batch
//!   layer requires from a simulation engine.
//! - [`traits::Simulated`] -- the tagged result of one run (resolved or still
//!   interacting).
//! - [`outcome::Outcomes`] -- the `[nstates, 2]` outcome vector accumulated
//!   across a batch.

pub mod outcome;
pub mod traits;

// Re-export the most commonly used items at the module level.
pub use outcome::{OutcomeBin, Outcomes};
pub use traits::{Simulated, Trajectory, TrajectoryFactory};
