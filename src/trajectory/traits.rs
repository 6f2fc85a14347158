//! The trajectory runner contract.
//!
//! The batch layer never looks inside a trajectory. It only needs to build
//! one from an initial condition ([`TrajectoryFactory`]), run it
//! ([`Trajectory::simulate`]) and read its classification
//! ([`Trajectory::outcome`]). Keeping this narrow makes it easy to plug in a
//! real surface-hopping engine or a mock in tests.

use std::sync::Arc;

use anyhow::Result;

use super::outcome::Outcomes;
use crate::config::TrajectoryOptions;
use crate::sampling::InitialCondition;
use crate::trace::{Trace, Tracer};

/// How a simulation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Simulated {
    /// The trajectory left the interaction region; its trace is complete.
    Resolved(Trace),
    /// The run stopped while still inside the interaction region, so no
    /// outcome can be assigned. Expected, not a fault.
    StillInteracting,
}

impl Simulated {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn into_trace(self) -> Option<Trace> {
        match self {
            Self::Resolved(trace) => Some(trace),
            Self::StillInteracting => None,
        }
    }
}

/// One independent simulation.
///
/// Errors returned from [`simulate`](Trajectory::simulate) are treated as
/// contract violations (or a user interrupt) and abort the batch.
pub trait Trajectory: Send + 'static {
    /// Propagate to completion.
    fn simulate(&mut self) -> Result<Simulated>;

    /// Outcome weights. Only meaningful after `simulate` returned
    /// [`Simulated::Resolved`].
    fn outcome(&self) -> Outcomes;
}

/// Builds trajectories from sampled initial conditions.
///
/// Any `Fn(Arc<M>, InitialCondition, Tracer, TrajectoryOptions) -> Result<T>`
/// closure is a factory.
pub trait TrajectoryFactory<M: ?Sized>: Send + Sync {
    type Trajectory: Trajectory;

    fn build(
        &self,
        model: Arc<M>,
        initial: InitialCondition,
        tracer: Tracer,
        options: TrajectoryOptions,
    ) -> Result<Self::Trajectory>;
}

impl<M, T, F> TrajectoryFactory<M> for F
where
    M: ?Sized,
    T: Trajectory,
    F: Fn(Arc<M>, InitialCondition, Tracer, TrajectoryOptions) -> Result<T> + Send + Sync,
{
    type Trajectory = T;

    fn build(
        &self,
        model: Arc<M>,
        initial: InitialCondition,
        tracer: Tracer,
        options: TrajectoryOptions,
    ) -> Result<T> {
        self(model, initial, tracer, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchOptions;
    use crate::sampling::{InitialState, SeedSequence};
    use crate::trajectory::OutcomeBin;

    struct Ballistic {
        x: f64,
        p: f64,
        dt: f64,
        tracer: Option<Tracer>,
    }

    impl Trajectory for Ballistic {
        fn simulate(&mut self) -> Result<Simulated> {
            let mut tracer = self.tracer.take().ok_or_else(|| anyhow::anyhow!("ran twice"))?;
            for _ in 0..10 {
                self.x += self.p * self.dt;
            }
            tracer.record(crate::trace::TraceFrame {
                time: 10.0 * self.dt,
                position: vec![self.x],
                momentum: vec![self.p],
                active: 0,
                populations: vec![1.0],
                potential_energy: 0.0,
                kinetic_energy: 0.5 * self.p * self.p,
            });
            Ok(Simulated::Resolved(tracer.finish()))
        }

        fn outcome(&self) -> Outcomes {
            Outcomes::single(1, 0, OutcomeBin::from_position(self.x))
        }
    }

    #[test]
    fn closures_are_factories() {
        let factory = |_model: Arc<()>,
                       ic: InitialCondition,
                       tracer: Tracer,
                       opts: TrajectoryOptions|
         -> Result<Ballistic> {
            Ok(Ballistic {
                x: ic.position[0],
                p: ic.momentum[0],
                dt: opts.dt,
                tracer: Some(tracer),
            })
        };

        let seed = SeedSequence::new(Some(1)).spawn(1).remove(0);
        let ic = InitialCondition {
            position: vec![-1.0],
            momentum: vec![1.0],
            state: InitialState::Ground,
            seed: seed.clone(),
        };
        let mut options = BatchOptions::default().for_trajectory(seed);
        options.dt = 0.5;

        let mut traj = factory
            .build(Arc::new(()), ic, Tracer::new(0), options)
            .unwrap();
        let result = traj.simulate().unwrap();
        assert!(result.is_resolved());
        assert_eq!(traj.outcome().get(0, OutcomeBin::Transmitted), 1.0);
        assert_eq!(result.into_trace().unwrap().len(), 1);

        assert!(traj.simulate().is_err());
    }

    #[test]
    fn still_interacting_has_no_trace() {
        assert!(!Simulated::StillInteracting.is_resolved());
        assert!(Simulated::StillInteracting.into_trace().is_none());
    }
}
