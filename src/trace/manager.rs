//! Ensemble trace aggregation.
//!
//! The [`TraceAggregator`] trait is what the batch layer talks to:
//! 1. [`spawn_tracer`](TraceAggregator::spawn_tracer) once per trajectory,
//!    before it runs;
//! 2. [`merge_tracer`](TraceAggregator::merge_tracer) once per trajectory that
//!    finished with a resolved outcome;
//! 3. [`outcome`](TraceAggregator::outcome) to summarize everything merged.
//!
//! Merging must be order-independent. [`TraceManager`] achieves this by
//! keeping traces keyed by tracer id and always summarizing in id order, so
//! the summary is bit-for-bit identical whatever order workers finish in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{Trace, Tracer};
use crate::config::OutcomeType;
use crate::trajectory::{OutcomeBin, Outcomes};

/// The aggregation contract consumed by the batch controller.
pub trait TraceAggregator: Send {
    /// Hand out a fresh tracer for the next trajectory.
    fn spawn_tracer(&mut self) -> Tracer;

    /// Absorb one completed trajectory's trace.
    fn merge_tracer(&mut self, trace: Trace);

    /// Outcome summary over everything merged so far.
    fn outcome(&self) -> Outcomes;

    /// Note a trajectory that ended while still interacting.
    fn record_unresolved(&mut self) {}

    /// Keep the final summary computed at the end of a batch.
    fn store_outcomes(&mut self, outcomes: Outcomes);
}

/// Default aggregator: stores every merged trace and classifies its final
/// frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceManager {
    nstates: usize,
    outcome_type: OutcomeType,
    /// Next tracer id to hand out.
    next_id: u64,
    /// Merged traces keyed by tracer id.
    traces: BTreeMap<u64, Trace>,
    /// Trajectories excluded because they were still interacting.
    unresolved: usize,
    /// Summary stored at the end of the last batch.
    #[serde(default)]
    outcomes: Option<Outcomes>,
}

impl TraceManager {
    pub fn new(nstates: usize, outcome_type: OutcomeType) -> Self {
        Self {
            nstates,
            outcome_type,
            next_id: 0,
            traces: BTreeMap::new(),
            unresolved: 0,
            outcomes: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn outcome_type(&self) -> OutcomeType {
        self.outcome_type
    }

    /// Number of tracers spawned.
    pub fn spawned(&self) -> u64 {
        self.next_id
    }

    /// Number of traces merged.
    pub fn merged(&self) -> usize {
        self.traces.len()
    }

    /// Number of trajectories excluded as still interacting.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    /// The summary stored by the last completed batch, if any.
    pub fn outcomes(&self) -> Option<&Outcomes> {
        self.outcomes.as_ref()
    }

    /// Merged traces in spawn order.
    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.traces.values()
    }

    pub fn into_traces(self) -> Vec<Trace> {
        self.traces.into_values().collect()
    }

    /// Outcome weights contributed by a single trace.
    pub fn classify(&self, trace: &Trace) -> Option<Outcomes> {
        let last = trace.last_frame()?;
        let Some(&x0) = last.position.first() else {
            warn!(trace = trace.id, "final frame has no position; not classified");
            return None;
        };
        let bin = OutcomeBin::from_position(x0);
        let mut out = Outcomes::zeros(self.nstates);

        match self.outcome_type {
            OutcomeType::State => {
                if last.active >= self.nstates {
                    warn!(
                        trace = trace.id,
                        active = last.active,
                        nstates = self.nstates,
                        "active state out of range; not classified"
                    );
                    return None;
                }
                out.add_to(last.active, bin, 1.0);
            }
            OutcomeType::Populations => {
                for (state, &pop) in last.populations.iter().take(self.nstates).enumerate() {
                    out.add_to(state, bin, pop);
                }
            }
        }
        Some(out)
    }
}

impl TraceAggregator for TraceManager {
    fn spawn_tracer(&mut self) -> Tracer {
        let tracer = Tracer::new(self.next_id);
        self.next_id += 1;
        tracer
    }

    fn merge_tracer(&mut self, trace: Trace) {
        if self.traces.contains_key(&trace.id) {
            warn!(trace = trace.id, "trace merged twice; keeping the first copy");
            return;
        }
        self.traces.insert(trace.id, trace);
    }

    fn outcome(&self) -> Outcomes {
        let mut total = Outcomes::zeros(self.nstates);
        for trace in self.traces.values() {
            match self.classify(trace) {
                Some(o) => total += &o,
                None if trace.is_empty() => {
                    warn!(trace = trace.id, "empty trace contributes no outcome");
                }
                None => {}
            }
        }
        total
    }

    fn record_unresolved(&mut self) {
        self.unresolved += 1;
    }

    fn store_outcomes(&mut self, outcomes: Outcomes) {
        self.outcomes = Some(outcomes);
    }
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::trace::TraceFrame;

    fn finished(tracer: Tracer, x: f64, active: usize, populations: Vec<f64>) -> Trace {
        let mut tracer = tracer;
        tracer.record(TraceFrame {
            time: 0.0,
            position: vec![x],
            momentum: vec![1.0],
            active,
            populations,
            potential_energy: 0.0,
            kinetic_energy: 0.5,
        });
        tracer.finish()
    }

    #[test]
    fn spawned_tracers_get_sequential_ids() {
        let mut tm = TraceManager::new(2, OutcomeType::State);
        let ids: Vec<u64> = (0..4).map(|_| tm.spawn_tracer().id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(tm.spawned(), 4);
    }

    #[test]
    fn state_classification() {
        let mut tm = TraceManager::new(2, OutcomeType::State);
        let a = tm.spawn_tracer();
        let b = tm.spawn_tracer();
        let c = tm.spawn_tracer();
        tm.merge_tracer(finished(a, 8.0, 0, vec![1.0, 0.0]));
        tm.merge_tracer(finished(b, -8.0, 1, vec![0.0, 1.0]));
        tm.merge_tracer(finished(c, 8.0, 1, vec![0.3, 0.7]));

        let out = tm.outcome();
        assert_eq!(out.row(0), [0.0, 1.0]);
        assert_eq!(out.row(1), [1.0, 1.0]);
        assert_eq!(tm.merged(), 3);
    }

    #[test]
    fn population_classification() {
        let mut tm = TraceManager::new(2, OutcomeType::Populations);
        let a = tm.spawn_tracer();
        tm.merge_tracer(finished(a, 8.0, 1, vec![0.25, 0.75]));
        let out = tm.outcome();
        assert_eq!(out.row(0), [0.0, 0.25]);
        assert_eq!(out.row(1), [0.0, 0.75]);
    }

    #[test]
    fn empty_and_out_of_range_traces_are_skipped() {
        let mut tm = TraceManager::new(2, OutcomeType::State);
        let empty = tm.spawn_tracer().finish();
        let bad = tm.spawn_tracer();
        tm.merge_tracer(empty);
        tm.merge_tracer(finished(bad, 1.0, 5, vec![]));
        assert_eq!(tm.outcome(), Outcomes::zeros(2));
        assert_eq!(tm.merged(), 2);
    }

    #[test]
    fn duplicate_merge_is_ignored() {
        let mut tm = TraceManager::new(1, OutcomeType::State);
        let t = finished(tm.spawn_tracer(), 1.0, 0, vec![1.0]);
        tm.merge_tracer(t.clone());
        tm.merge_tracer(t);
        assert_eq!(tm.merged(), 1);
        assert_eq!(tm.outcome().total(), 1.0);
    }

    #[test]
    fn merge_order_does_not_change_summary() {
        let mut reference = TraceManager::new(2, OutcomeType::Populations);
        let mut traces = Vec::new();
        for i in 0..64 {
            let tracer = reference.spawn_tracer();
            let p = (i as f64 * 0.137).fract();
            let x = if i % 3 == 0 { -4.0 } else { 4.0 };
            traces.push(finished(tracer, x, i % 2, vec![p, 1.0 - p]));
        }

        for t in &traces {
            reference.merge_tracer(t.clone());
        }
        let expected = reference.outcome();

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..5 {
            let mut shuffled = traces.clone();
            shuffled.shuffle(&mut rng);
            let mut tm = TraceManager::new(2, OutcomeType::Populations);
            for t in shuffled {
                tm.merge_tracer(t);
            }
            // Bit-for-bit, not just within tolerance.
            assert_eq!(tm.outcome(), expected);
        }
    }

    #[test]
    fn counters_and_stored_summary() {
        let mut tm = TraceManager::new(1, OutcomeType::State);
        tm.record_unresolved();
        tm.record_unresolved();
        assert_eq!(tm.unresolved(), 2);
        assert!(tm.outcomes().is_none());

        tm.store_outcomes(Outcomes::from_rows(&[[0.0, 3.0]]));
        assert_eq!(tm.outcomes().unwrap().total(), 3.0);
    }
}
