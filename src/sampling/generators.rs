//! Initial-condition generators.
//!
//! Both generators keep two random sources apart:
//! - a [`SeedSequence`] that only hands out per-trajectory [`SeedToken`]s, and
//! - (for [`NormalConditions`]) a generator-owned stream used for the
//!   position/momentum draws.
//!
//! Nothing drawn by the generator can be derived from, or shifts, the tokens it
//! hands out.

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::seed::{SeedSequence, SeedToken};
use crate::error::BatchError;

// ---------------------------------------------------------------------------
// Initial condition
// ---------------------------------------------------------------------------

/// Which electronic state a trajectory starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// The lowest electronic state.
    Ground,
    /// An explicit state index.
    State(usize),
}

impl InitialState {
    /// Resolve to a concrete state index for a model with `nstates` states.
    pub fn index(&self, nstates: usize) -> Result<usize> {
        let idx = match self {
            Self::Ground => 0,
            Self::State(i) => *i,
        };
        if idx >= nstates {
            return Err(BatchError::ShapeMismatch {
                expected: format!("state index < {nstates}"),
                actual: idx.to_string(),
            }
            .into());
        }
        Ok(idx)
    }
}

impl From<usize> for InitialState {
    fn from(i: usize) -> Self {
        Self::State(i)
    }
}

/// One sampled starting point for one trajectory. Consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialCondition {
    pub position: Vec<f64>,
    pub momentum: Vec<f64>,
    pub state: InitialState,
    /// The trajectory's own entropy. Nothing else in the batch sees it.
    pub seed: SeedToken,
}

/// Anything that can produce a finite, lazy run of initial conditions.
///
/// Implementations yield **at most** `n` items; callers must not assume
/// exactly `n`.
pub trait InitialConditions: Send {
    fn generate(&mut self, n: usize) -> Box<dyn Iterator<Item = InitialCondition> + '_>;
}

fn check_dims(position: &[f64], momentum: &[f64]) -> Result<()> {
    if position.len() != momentum.len() {
        return Err(BatchError::ShapeMismatch {
            expected: format!("momentum of length {}", position.len()),
            actual: format!("length {}", momentum.len()),
        }
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Constant conditions
// ---------------------------------------------------------------------------

/// Every sample shares position, momentum and state; only the seed differs.
#[derive(Debug, Clone)]
pub struct ConstantConditions {
    position: Vec<f64>,
    momentum: Vec<f64>,
    state: InitialState,
    seed_sequence: SeedSequence,
}

impl ConstantConditions {
    pub fn new(
        position: Vec<f64>,
        momentum: Vec<f64>,
        state: impl Into<InitialState>,
        seed: Option<u64>,
    ) -> Result<Self> {
        check_dims(&position, &momentum)?;
        Ok(Self {
            position,
            momentum,
            state: state.into(),
            seed_sequence: SeedSequence::new(seed),
        })
    }
}

impl InitialConditions for ConstantConditions {
    fn generate(&mut self, n: usize) -> Box<dyn Iterator<Item = InitialCondition> + '_> {
        let tokens = self.seed_sequence.spawn(n);
        let Self {
            position,
            momentum,
            state,
            ..
        } = self;
        Box::new(tokens.into_iter().map(move |seed| InitialCondition {
            position: position.clone(),
            momentum: momentum.clone(),
            state: *state,
            seed,
        }))
    }
}

// ---------------------------------------------------------------------------
// Normally distributed conditions
// ---------------------------------------------------------------------------

/// Predicate over a drawn momentum; `true` means discard the sample.
pub type RejectFn = Box<dyn Fn(&[f64]) -> bool + Send + Sync>;

/// Default rejection: drop samples moving backwards along the first axis.
pub fn reject_negative_momentum(k: &[f64]) -> bool {
    k.first().is_some_and(|&k0| k0 < 0.0)
}

/// Position and momentum drawn independently from normal distributions.
///
/// With dispersion `sigma`, positions use a standard deviation of
/// `0.5 * sigma` and momenta use `1 / sigma`, so a larger `sigma` widens the
/// position spread and narrows the momentum spread.
///
/// Rejected samples still use up their seed token and their draws.
pub struct NormalConditions {
    position_dists: Vec<Normal<f64>>,
    momentum_dists: Vec<Normal<f64>>,
    state: InitialState,
    seed_sequence: SeedSequence,
    rng: ChaCha8Rng,
    reject: RejectFn,
}

impl NormalConditions {
    /// * `seed` -- master seed for the per-trajectory tokens.
    /// * `seed_traj` -- seed for this generator's own draws (OS entropy when
    ///   `None`).
    pub fn new(
        position: Vec<f64>,
        momentum: Vec<f64>,
        state: impl Into<InitialState>,
        sigma: Vec<f64>,
        seed: Option<u64>,
        seed_traj: Option<u64>,
    ) -> Result<Self> {
        check_dims(&position, &momentum)?;
        if sigma.len() != position.len() {
            return Err(BatchError::ShapeMismatch {
                expected: format!("sigma of length {}", position.len()),
                actual: format!("length {}", sigma.len()),
            }
            .into());
        }
        if let Some(bad) = sigma.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(BatchError::InvalidConfig(format!(
                "sigma must be finite and positive, got {bad}"
            ))
            .into());
        }

        let position_dists = position
            .iter()
            .zip(&sigma)
            .map(|(&x, &s)| normal(x, 0.5 * s))
            .collect::<Result<Vec<_>>>()?;
        let momentum_dists = momentum
            .iter()
            .zip(&sigma)
            .map(|(&k, &s)| normal(k, 1.0 / s))
            .collect::<Result<Vec<_>>>()?;

        let rng = match seed_traj {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            position_dists,
            momentum_dists,
            state: state.into(),
            seed_sequence: SeedSequence::new(seed),
            rng,
            reject: Box::new(reject_negative_momentum),
        })
    }

    /// Replace the rejection predicate.
    pub fn with_rejection(mut self, reject: impl Fn(&[f64]) -> bool + Send + Sync + 'static) -> Self {
        self.reject = Box::new(reject);
        self
    }

    /// Standard deviation used for each position component.
    pub fn position_deviation(&self) -> Vec<f64> {
        self.position_dists.iter().map(|d| d.std_dev()).collect()
    }

    /// Standard deviation used for each momentum component.
    pub fn momentum_deviation(&self) -> Vec<f64> {
        self.momentum_dists.iter().map(|d| d.std_dev()).collect()
    }
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| {
        BatchError::InvalidConfig(format!("normal({mean}, {std_dev}): {e}")).into()
    })
}

impl std::fmt::Debug for NormalConditions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalConditions")
            .field("position_dists", &self.position_dists)
            .field("momentum_dists", &self.momentum_dists)
            .field("state", &self.state)
            .field("seed_sequence", &self.seed_sequence)
            .finish_non_exhaustive()
    }
}

impl InitialConditions for NormalConditions {
    fn generate(&mut self, n: usize) -> Box<dyn Iterator<Item = InitialCondition> + '_> {
        let tokens = self.seed_sequence.spawn(n);
        let Self {
            position_dists,
            momentum_dists,
            state,
            rng,
            reject,
            ..
        } = self;

        Box::new(tokens.into_iter().filter_map(move |seed| {
            let position: Vec<f64> = position_dists.iter().map(|d| d.sample(&mut *rng)).collect();
            let momentum: Vec<f64> = momentum_dists.iter().map(|d| d.sample(&mut *rng)).collect();

            if reject(&momentum) {
                tracing::trace!(seed = %seed, ?momentum, "rejected sampled momentum");
                return None;
            }
            Some(InitialCondition {
                position,
                momentum,
                state: *state,
                seed,
            })
        }))
    }
}
