use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BatchError;
use crate::sampling::SeedToken;

/// How a finished trajectory is turned into outcome weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeType {
    /// One unit of weight on the active state.
    #[default]
    State,
    /// Weight spread over the states by electronic population.
    Populations,
}

/// Configuration for one batch of trajectories.
///
/// Keys this struct does not know are kept verbatim in `extra` and handed to
/// every trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Starting time of every trajectory (default: 0.0).
    pub initial_time: f64,
    /// Number of initial conditions requested by `compute` (default: 2000).
    pub samples: usize,
    /// Time step in atomic units (default: 20.0, roughly half a femtosecond).
    pub dt: f64,
    /// Number of workers draining the work queue (default: 1).
    pub nprocs: usize,
    /// Outcome classification mode (default: "state").
    pub outcome_type: OutcomeType,
    /// Master seed, recorded for provenance (default: none).
    pub seed: Option<u64>,
    /// Unrecognized keys, passed through to trajectories unvalidated.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            initial_time: 0.0,
            samples: 2000,
            dt: 20.0,
            nprocs: 1,
            outcome_type: OutcomeType::State,
            seed: None,
            extra: Map::new(),
        }
    }
}

impl BatchOptions {
    /// Build from a flat key/value mapping, filling in defaults.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let options: Self = serde_json::from_value(Value::Object(map))
            .context("failed to parse batch options")?;
        options.validate()?;
        Ok(options)
    }

    /// Build from a JSON object string.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("batch options are not valid JSON")?;
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(BatchError::InvalidConfig(format!(
                "batch options must be a JSON object, got {other}"
            ))
            .into()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.nprocs == 0 {
            return Err(BatchError::InvalidConfig("nprocs must be at least 1".into()).into());
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(
                BatchError::InvalidConfig(format!("dt must be positive, got {}", self.dt)).into(),
            );
        }
        if !self.initial_time.is_finite() {
            return Err(BatchError::InvalidConfig("initial_time must be finite".into()).into());
        }
        Ok(())
    }

    /// Merge the shared options with one trajectory's seed into a fresh,
    /// independently owned value. `self` is never touched.
    pub fn for_trajectory(&self, seed: SeedToken) -> TrajectoryOptions {
        TrajectoryOptions {
            initial_time: self.initial_time,
            samples: self.samples,
            dt: self.dt,
            nprocs: self.nprocs,
            outcome_type: self.outcome_type,
            master_seed: self.seed,
            seed,
            extra: self.extra.clone(),
        }
    }
}

/// The options one trajectory sees: shared settings plus its own seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryOptions {
    pub initial_time: f64,
    /// Size of the batch this trajectory belongs to.
    pub samples: usize,
    pub dt: f64,
    pub nprocs: usize,
    pub outcome_type: OutcomeType,
    /// The batch's master seed, if one was configured.
    pub master_seed: Option<u64>,
    /// This trajectory's entropy.
    pub seed: SeedToken,
    pub extra: Map<String, Value>,
}

impl TrajectoryOptions {
    /// Look up a passthrough key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Look up a numeric passthrough key.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    /// Set a passthrough key on this trajectory's copy only.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.extra.insert(key.into(), value.into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sampling::SeedSequence;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn defaults() {
        let o = BatchOptions::default();
        assert_eq!(o.initial_time, 0.0);
        assert_eq!(o.samples, 2000);
        assert_eq!(o.dt, 20.0);
        assert_eq!(o.nprocs, 1);
        assert_eq!(o.outcome_type, OutcomeType::State);
        assert_eq!(o.seed, None);
        assert!(o.extra.is_empty());

        assert_eq!(BatchOptions::from_map(Map::new()).unwrap(), o);
    }

    #[test]
    fn recognized_and_passthrough_keys() {
        let o = BatchOptions::from_map(map(json!({
            "samples": 100,
            "dt": 5.0,
            "outcome_type": "populations",
            "seed": 42,
            "bounds": [-6.0, 6.0],
            "max_steps": 10000
        })))
        .unwrap();
        assert_eq!(o.samples, 100);
        assert_eq!(o.dt, 5.0);
        assert_eq!(o.outcome_type, OutcomeType::Populations);
        assert_eq!(o.seed, Some(42));
        assert_eq!(o.extra.len(), 2);
        assert_eq!(o.extra["bounds"], json!([-6.0, 6.0]));
        assert_eq!(o.extra["max_steps"], json!(10000));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = BatchOptions::from_map(map(json!({ "nprocs": 0 }))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::InvalidConfig(_))
        ));
        assert!(BatchOptions::from_map(map(json!({ "dt": -1.0 }))).is_err());
        assert!(BatchOptions::from_map(map(json!({ "outcome_type": "bogus" }))).is_err());
        assert!(BatchOptions::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn json_string_roundtrip() {
        let o = BatchOptions::from_json_str(r#"{"nprocs": 4, "temperature": 300}"#).unwrap();
        assert_eq!(o.nprocs, 4);
        assert_eq!(o.extra["temperature"], json!(300));

        let text = serde_json::to_string(&o).unwrap();
        assert_eq!(BatchOptions::from_json_str(&text).unwrap(), o);
    }

    #[test]
    fn trajectory_options_are_isolated() {
        let mut base = BatchOptions {
            samples: 16,
            seed: Some(42),
            ..BatchOptions::default()
        };
        base.extra.insert("shared".into(), json!(1));

        let seeds = SeedSequence::new(Some(42)).spawn(2);
        let mut first = base.for_trajectory(seeds[0].clone());
        let second = base.for_trajectory(seeds[1].clone());

        first.insert("shared", 99);
        first.insert("only_first", true);
        first.dt = 1.0;

        assert_eq!(second.get_f64("shared"), Some(1.0));
        assert!(second.get("only_first").is_none());
        assert_eq!(second.dt, 20.0);
        assert_eq!(second.seed, seeds[1]);
        assert_eq!(second.samples, base.samples);
        assert_eq!(second.master_seed, base.seed);
        assert_ne!(first.seed, second.seed);

        // The base is untouched as well.
        assert_eq!(base.extra.len(), 1);
        assert_eq!(base.extra["shared"], json!(1));
    }
}
