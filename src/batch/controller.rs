//! Batch control: turning sampled initial conditions into an aggregated
//! outcome.
//!
//! [`BatchedTrajectories`] drives a batch by repeatedly:
//!   1. drawing an initial condition from the sampler,
//!   2. spawning a tracer and building a trajectory with its own options,
//!   3. running the trajectory,
//!   4. folding the result into the outcome total or the trace aggregator.
//!
//! It supports two modes:
//! - **Sequential** via [`run_trajectories`](BatchedTrajectories::run_trajectories),
//!   which returns the outcome total and the trace list directly.
//! - **Pooled** via [`compute`](BatchedTrajectories::compute), which runs the
//!   three-phase work/result pipeline of [`super::scheduler`] and merges into
//!   the aggregator.
//!
//! Trajectories that end still interacting are warned about and excluded. An
//! interrupt (or any other error) aborts the batch with no result.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::interrupt::Interrupt;
use super::scheduler::{Scheduler, WorkResult};
use crate::config::BatchOptions;
use crate::error::{is_interrupt, BatchError};
use crate::model::Model;
use crate::sampling::{InitialCondition, InitialConditions};
use crate::trace::{Trace, TraceAggregator, TraceManager};
use crate::trajectory::{Outcomes, Simulated, Trajectory, TrajectoryFactory};

const STILL_INTERACTING: &str = "a simulation ended while still in the interaction region";

// ---------------------------------------------------------------------------
// Batch controller
// ---------------------------------------------------------------------------

/// Owns everything needed to run one batch.
pub struct BatchedTrajectories<M: ?Sized, S, F, A = TraceManager> {
    /// Shared, read-only physical model.
    model: Arc<M>,
    sampler: S,
    factory: F,
    trace_manager: A,
    /// Base options. Never mutated; each trajectory gets a fresh copy.
    options: BatchOptions,
    interrupt: Interrupt,
}

impl<M, S, F> BatchedTrajectories<M, S, F, TraceManager>
where
    M: Model + ?Sized,
    S: InitialConditions,
    F: TrajectoryFactory<M>,
{
    /// Create a controller with a default [`TraceManager`] sized for the
    /// model and classifying by `options.outcome_type`.
    pub fn new(model: Arc<M>, sampler: S, factory: F, options: BatchOptions) -> Result<Self> {
        options.validate()?;
        let trace_manager = TraceManager::new(model.nstates(), options.outcome_type);
        Ok(Self {
            model,
            sampler,
            factory,
            trace_manager,
            options,
            interrupt: Interrupt::new(),
        })
    }
}

impl<M, S, F, A> BatchedTrajectories<M, S, F, A>
where
    M: Model + ?Sized,
    S: InitialConditions,
    F: TrajectoryFactory<M>,
    A: TraceAggregator,
{
    /// Swap in a different aggregator.
    pub fn with_trace_manager<B: TraceAggregator>(
        self,
        trace_manager: B,
    ) -> BatchedTrajectories<M, S, F, B> {
        BatchedTrajectories {
            model: self.model,
            sampler: self.sampler,
            factory: self.factory,
            trace_manager,
            options: self.options,
            interrupt: self.interrupt,
        }
    }

    /// Share an existing cancellation handle instead of a private one.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// A handle that cancels this batch when triggered.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn trace_manager(&self) -> &A {
        &self.trace_manager
    }

    pub fn trace_manager_mut(&mut self) -> &mut A {
        &mut self.trace_manager
    }

    pub fn into_trace_manager(self) -> A {
        self.trace_manager
    }

    /// Run up to `n` trajectories one after another on the calling thread.
    ///
    /// Returns the summed `outcome()` of every resolved trajectory and their
    /// traces in sampling order. Still-interacting trajectories are excluded
    /// from both, so `n - traces.len()` of them (at most) were dropped. Traces
    /// are returned, not merged into the aggregator.
    pub fn run_trajectories(&mut self, n: usize) -> Result<(Outcomes, Vec<Trace>)> {
        let Self {
            model,
            sampler,
            factory,
            trace_manager,
            options,
            interrupt,
        } = self;

        let mut outcomes = Outcomes::zeros(model.nstates());
        let mut traces = Vec::with_capacity(n);
        let mut attempted = 0usize;

        for initial in sampler.generate(n) {
            interrupt.check(attempted)?;
            let mut trajectory = build_trajectory(model, factory, trace_manager, options, initial)?;

            match trajectory.simulate()? {
                Simulated::Resolved(trace) => {
                    outcomes
                        .try_accumulate(&trajectory.outcome())
                        .with_context(|| format!("trajectory {} returned a bad outcome", trace.id))?;
                    traces.push(trace);
                }
                Simulated::StillInteracting => {
                    warn!(sample = attempted, "{STILL_INTERACTING}");
                }
            }
            attempted += 1;
        }
        // The last trajectory may have been interrupted while running.
        interrupt.check(attempted)?;

        info!(
            requested = n,
            attempted,
            resolved = traces.len(),
            unresolved = attempted - traces.len(),
            "sequential batch finished"
        );
        Ok((outcomes, traces))
    }

    /// Run `options.samples` trajectories on `options.nprocs` workers and
    /// merge the results into the aggregator.
    ///
    /// On success the aggregator has every resolved trace merged, every
    /// excluded one counted, and the final summary stored. On error nothing is
    /// merged.
    pub async fn compute(&mut self) -> Result<&A> {
        let Self {
            model,
            sampler,
            factory,
            trace_manager,
            options,
            interrupt,
        } = self;
        let requested = options.samples;
        info!(samples = requested, nprocs = options.nprocs, "starting batch");

        // Phase 1: materialize every work item, then close the queue.
        let mut scheduler = Scheduler::new(options.nprocs, interrupt.clone());
        for initial in sampler.generate(requested) {
            interrupt.check(0)?;
            let trajectory = build_trajectory(model, factory, trace_manager, options, initial)?;
            scheduler.enqueue(trajectory)?;
        }
        let enqueued = scheduler.enqueued();
        debug!(enqueued, "work queue filled");

        // Phase 2: drain the work queue into the result queue.
        let results = scheduler.run().await?;

        // Phase 3: drain the result queue.
        let mut resolved = Vec::with_capacity(enqueued);
        let mut unresolved = 0usize;
        let mut failure: Option<(usize, anyhow::Error)> = None;
        for WorkResult { index, outcome } in results.iter() {
            match outcome {
                Ok(Simulated::Resolved(trace)) => resolved.push(trace),
                Ok(Simulated::StillInteracting) => {
                    warn!(sample = index, "{STILL_INTERACTING}");
                    unresolved += 1;
                }
                Err(err) => failure = Some(keep_worst(failure, index, err)),
            }
        }
        if let Some((index, err)) = failure {
            debug!(sample = index, interrupted = is_interrupt(&err), "batch aborted");
            return Err(err);
        }
        interrupt.check(resolved.len() + unresolved)?;

        let completed = resolved.len();
        for trace in resolved {
            trace_manager.merge_tracer(trace);
        }
        for _ in 0..unresolved {
            trace_manager.record_unresolved();
        }
        let summary = trace_manager.outcome();
        info!(
            requested,
            enqueued,
            completed,
            unresolved,
            weight = summary.total(),
            "batch finished"
        );
        trace_manager.store_outcomes(summary);

        Ok(&*trace_manager)
    }
}

// -- internal helpers -------------------------------------------------------

/// Spawn a tracer and build one trajectory with its own copy of the options.
fn build_trajectory<M, F, A>(
    model: &Arc<M>,
    factory: &F,
    trace_manager: &mut A,
    options: &BatchOptions,
    initial: InitialCondition,
) -> Result<F::Trajectory>
where
    M: Model + ?Sized,
    F: TrajectoryFactory<M>,
    A: TraceAggregator,
{
    if initial.position.len() != model.ndim() {
        return Err(BatchError::ShapeMismatch {
            expected: format!("position of length {}", model.ndim()),
            actual: format!("length {}", initial.position.len()),
        }
        .into());
    }
    initial.state.index(model.nstates())?;

    let tracer = trace_manager.spawn_tracer();
    let trajectory_options = options.for_trajectory(initial.seed.clone());
    factory.build(Arc::clone(model), initial, tracer, trajectory_options)
}

/// An interrupt beats any other error; otherwise the earliest sample wins.
fn keep_worst(
    current: Option<(usize, anyhow::Error)>,
    index: usize,
    err: anyhow::Error,
) -> (usize, anyhow::Error) {
    match current {
        None => (index, err),
        Some((i, e)) if is_interrupt(&e) => (i, e),
        Some(_) if is_interrupt(&err) => (index, err),
        Some((i, e)) if i < index => (i, e),
        Some(_) => (index, err),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
