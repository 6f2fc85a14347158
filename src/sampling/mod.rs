//! Initial-condition sampling.
//!
//! - [`seed`] -- splitting one master seed into independent per-trajectory
//!   [`SeedToken`]s.
//! - [`generators`] -- the [`InitialConditions`] trait plus the two canned
//!   generators, [`ConstantConditions`] and [`NormalConditions`].

pub mod generators;
pub mod seed;

pub use generators::{
    reject_negative_momentum, ConstantConditions, InitialCondition, InitialConditions,
    InitialState, NormalConditions, RejectFn,
};
pub use seed::{SeedSequence, SeedToken};
