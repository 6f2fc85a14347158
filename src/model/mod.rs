//! The physics model contract and a reference model.
//!
//! Every model implements the [`Model`] trait so that trajectories can query
//! the electronic Hamiltonian and its gradient uniformly. Models are shared
//! read-only by all trajectories of a batch (behind an `Arc`), hence the
//! `Send + Sync` bound.
//!
//! Included models:
//! - **Tully simple avoided crossing** ([`tully`]) -- two states, one
//!   nuclear dimension.

pub mod tully;

use serde::{Deserialize, Serialize};

pub use tully::TullySimpleAvoidedCrossing;

/// A square, row-major `nstates x nstates` matrix in the electronic basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMatrix {
    n: usize,
    values: Vec<f64>,
}

impl StateMatrix {
    /// All-zero `n x n` matrix.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            values: vec![0.0; n * n],
        }
    }

    /// Number of rows (and columns).
    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        self.values[i * self.n + j] = v;
    }
}

/// The physics model contract.
///
/// * `potential(x)` -- the diabatic electronic Hamiltonian at `x`.
/// * `gradient(x)` -- one matrix per nuclear dimension, `dH/dx_d`.
pub trait Model: Send + Sync {
    fn potential(&self, x: &[f64]) -> StateMatrix;

    fn gradient(&self, x: &[f64]) -> Vec<StateMatrix>;

    /// Number of electronic states.
    fn nstates(&self) -> usize;

    /// Dimensionality of nuclear space.
    fn ndim(&self) -> usize;
}
