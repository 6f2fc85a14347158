//! Outcome vectors: per-state classification weights.

use std::ops::{Add, AddAssign};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Coarse classification of where a trajectory ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBin {
    /// Left the interaction region on the negative side.
    Reflected = 0,
    /// Left the interaction region on the positive side.
    Transmitted = 1,
}

impl OutcomeBin {
    /// Number of bins per electronic state.
    pub const COUNT: usize = 2;

    /// Classify by the sign of the coordinate along the scattering axis.
    pub fn from_position(x: f64) -> Self {
        if x < 0.0 {
            Self::Reflected
        } else {
            Self::Transmitted
        }
    }
}

/// Dense `[nstates, 2]` array of outcome weights, accumulated by elementwise
/// addition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcomes {
    nstates: usize,
    values: Vec<f64>,
}

impl Outcomes {
    /// All-zero vector for `nstates` states.
    pub fn zeros(nstates: usize) -> Self {
        Self {
            nstates,
            values: vec![0.0; nstates * OutcomeBin::COUNT],
        }
    }

    /// Build from rows of `[reflected, transmitted]`.
    pub fn from_rows(rows: &[[f64; OutcomeBin::COUNT]]) -> Self {
        Self {
            nstates: rows.len(),
            values: rows.iter().flatten().copied().collect(),
        }
    }

    /// A vector with a single unit entry, the usual result of one trajectory.
    pub fn single(nstates: usize, state: usize, bin: OutcomeBin) -> Self {
        let mut out = Self::zeros(nstates);
        out.add_to(state, bin, 1.0);
        out
    }

    /// Number of electronic states (rows).
    pub fn nstates(&self) -> usize {
        self.nstates
    }

    /// Weight accumulated for `state` in `bin`.
    pub fn get(&self, state: usize, bin: OutcomeBin) -> f64 {
        self.values[state * OutcomeBin::COUNT + bin as usize]
    }

    /// Add `weight` to one entry.
    pub fn add_to(&mut self, state: usize, bin: OutcomeBin, weight: f64) {
        self.values[state * OutcomeBin::COUNT + bin as usize] += weight;
    }

    /// Row `state` as `[reflected, transmitted]`.
    pub fn row(&self, state: usize) -> [f64; OutcomeBin::COUNT] {
        let start = state * OutcomeBin::COUNT;
        [self.values[start], self.values[start + 1]]
    }

    /// Sum of every entry.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Entries flattened row-major.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Elementwise accumulate, checking that the shapes agree.
    pub fn try_accumulate(&mut self, other: &Outcomes) -> Result<()> {
        if other.nstates != self.nstates {
            return Err(BatchError::ShapeMismatch {
                expected: format!("[{}, {}]", self.nstates, OutcomeBin::COUNT),
                actual: format!("[{}, {}]", other.nstates, OutcomeBin::COUNT),
            }
            .into());
        }
        for (acc, v) in self.values.iter_mut().zip(&other.values) {
            *acc += v;
        }
        Ok(())
    }
}

/// Panics on shape mismatch; use [`Outcomes::try_accumulate`] when the shapes
/// come from an untrusted collaborator.
impl AddAssign<&Outcomes> for Outcomes {
    fn add_assign(&mut self, rhs: &Outcomes) {
        assert_eq!(self.nstates, rhs.nstates, "outcome shapes differ");
        for (acc, v) in self.values.iter_mut().zip(&rhs.values) {
            *acc += v;
        }
    }
}

impl Add<&Outcomes> for Outcomes {
    type Output = Outcomes;

    fn add(mut self, rhs: &Outcomes) -> Outcomes {
        self += rhs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_follow_position_sign() {
        assert_eq!(OutcomeBin::from_position(-0.1), OutcomeBin::Reflected);
        assert_eq!(OutcomeBin::from_position(0.0), OutcomeBin::Transmitted);
        assert_eq!(OutcomeBin::from_position(12.0), OutcomeBin::Transmitted);
    }

    #[test]
    fn single_and_accumulate() {
        let mut total = Outcomes::zeros(2);
        total += &Outcomes::single(2, 0, OutcomeBin::Transmitted);
        total += &Outcomes::single(2, 1, OutcomeBin::Reflected);
        total += &Outcomes::single(2, 0, OutcomeBin::Transmitted);
        assert_eq!(total.row(0), [0.0, 2.0]);
        assert_eq!(total.row(1), [1.0, 0.0]);
        assert_eq!(total.total(), 3.0);
    }

    #[test]
    fn try_accumulate_rejects_other_shapes() {
        let mut a = Outcomes::zeros(2);
        let err = a.try_accumulate(&Outcomes::zeros(3)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::ShapeMismatch { .. })
        ));
        assert_eq!(a, Outcomes::zeros(2));
    }

    #[test]
    fn serializes_shape_and_values() {
        let o = Outcomes::from_rows(&[[1.0, 0.0]]);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["nstates"], 1);
        assert_eq!(json["values"], serde_json::json!([1.0, 0.0]));
    }
}
