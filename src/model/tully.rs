//! Tully's simple avoided crossing (model 1 of J. Chem. Phys. 93, 1061).
//!
//! ```text
//! V11(x) =  sign(x) * A * (1 - exp(-B |x|))
//! V22(x) = -V11(x)
//! V12(x) =  C * exp(-D x^2)
//! ```

use serde::{Deserialize, Serialize};

use super::{Model, StateMatrix};

/// Two-state, one-dimensional avoided crossing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TullySimpleAvoidedCrossing {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for TullySimpleAvoidedCrossing {
    fn default() -> Self {
        Self {
            a: 0.01,
            b: 1.6,
            c: 0.005,
            d: 1.0,
        }
    }
}

impl Model for TullySimpleAvoidedCrossing {
    fn potential(&self, x: &[f64]) -> StateMatrix {
        let x = x[0];
        let v11 = x.signum() * self.a * (1.0 - (-self.b * x.abs()).exp());
        let v12 = self.c * (-self.d * x * x).exp();

        let mut h = StateMatrix::zeros(2);
        h.set(0, 0, v11);
        h.set(1, 1, -v11);
        h.set(0, 1, v12);
        h.set(1, 0, v12);
        h
    }

    fn gradient(&self, x: &[f64]) -> Vec<StateMatrix> {
        let x = x[0];
        let d11 = self.a * self.b * (-self.b * x.abs()).exp();
        let d12 = -2.0 * self.c * self.d * x * (-self.d * x * x).exp();

        let mut dh = StateMatrix::zeros(2);
        dh.set(0, 0, d11);
        dh.set(1, 1, -d11);
        dh.set(0, 1, d12);
        dh.set(1, 0, d12);
        vec![dh]
    }

    fn nstates(&self) -> usize {
        2
    }

    fn ndim(&self) -> usize {
        1
    }
}
