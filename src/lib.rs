//! trajbatch: batched ensembles of independent trajectory simulations.
//!
//! A batch draws seeded initial conditions, runs one trajectory per sample
//! (sequentially or on a worker pool), and folds the per-trajectory traces
//! into a single outcome summary. Trajectories that end while still
//! interacting are excluded from the summary; an interrupt aborts the whole
//! batch.

pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod sampling;
pub mod trace;
pub mod trajectory;

pub use batch::{BatchedTrajectories, Interrupt};
pub use config::{BatchOptions, OutcomeType, TrajectoryOptions};
pub use error::BatchError;
pub use model::Model;
pub use sampling::{InitialCondition, InitialConditions, SeedSequence, SeedToken};
pub use trace::{Trace, TraceAggregator, TraceManager, Tracer};
pub use trajectory::{Outcomes, Simulated, Trajectory, TrajectoryFactory};
