//! Loading and validation of simulation inputs.

use crate::MAX_LANES;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// A failure to load or validate the simulation inputs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field `{field}`: {reason}")]
    Parse { field: &'static str, reason: String },
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The simulation inputs.
///
/// The simulation trusts these values as given; call [Config::validate] first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The number of lanes, either 1 or 2.
    pub lanes: usize,
    /// The length of the whole road in sites.
    pub length: usize,
    /// The probability that a site starts out occupied.
    pub initial_occupancy: f64,
    /// The maximum speed of every vehicle, in sites per step.
    pub max_speed: usize,
    /// The initial distance a vehicle looks ahead in its own lane.
    pub look_forward: usize,
    /// The initial distance a vehicle looks ahead in the other lane.
    pub look_other_forward: usize,
    /// The distance a vehicle looks behind in the other lane.
    pub look_other_backward: usize,
    /// The probability of randomly slowing down each step.
    pub prob_slow_down: f64,
    /// The probability of changing lanes when it is desirable and safe.
    pub prob_change: f64,
    /// The number of steps to simulate.
    pub max_time: usize,
    /// The duration of one step in seconds.
    pub step_size: f64,
    /// The number of steps excluded from travel time statistics.
    pub warmup_time: usize,
    /// Seed for the random number generators.
    #[serde(default)]
    pub seed: u64,
    /// Threads used to compute gaps within each worker.
    #[serde(default = "default_gap_threads")]
    pub gap_threads: usize,
}

fn default_gap_threads() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lanes: 2,
            length: 1000,
            initial_occupancy: 0.0,
            max_speed: 5,
            look_forward: 6,
            look_other_forward: 6,
            look_other_backward: 5,
            prob_slow_down: 0.2,
            prob_change: 1.0,
            max_time: 1000,
            step_size: 1.0,
            warmup_time: 100,
            seed: 0,
            gap_threads: 1,
        }
    }
}

impl Config {
    /// Loads the inputs from a file. Files ending in `.json` are read as JSON,
    /// anything else as whitespace separated scalars (see [Config::parse_flat]).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().map_or(false, |ext| ext == "json") {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::parse_flat(&text)
        }
    }

    /// Parses the flat input format: the scalars `lanes`, `length`, `initial_occupancy`,
    /// `max_speed`, `look_forward`, `look_other_forward`, `look_other_backward`,
    /// `prob_slow_down`, `prob_change`, `max_time`, `step_size` and `warmup_time`, in that
    /// order, separated by whitespace. `#` starts a comment.
    pub fn parse_flat(text: &str) -> Result<Self, ConfigError> {
        let mut tokens = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .flat_map(str::split_whitespace);
        let mut next = |field: &'static str| tokens.next().ok_or(ConfigError::Missing(field));

        Ok(Self {
            lanes: parse(next("lanes")?, "lanes")?,
            length: parse(next("length")?, "length")?,
            initial_occupancy: parse(next("initial_occupancy")?, "initial_occupancy")?,
            max_speed: parse(next("max_speed")?, "max_speed")?,
            look_forward: parse(next("look_forward")?, "look_forward")?,
            look_other_forward: parse(next("look_other_forward")?, "look_other_forward")?,
            look_other_backward: parse(next("look_other_backward")?, "look_other_backward")?,
            prob_slow_down: parse(next("prob_slow_down")?, "prob_slow_down")?,
            prob_change: parse(next("prob_change")?, "prob_change")?,
            max_time: parse(next("max_time")?, "max_time")?,
            step_size: parse(next("step_size")?, "step_size")?,
            warmup_time: parse(next("warmup_time")?, "warmup_time")?,
            seed: 0,
            gap_threads: default_gap_threads(),
        })
    }

    /// Checks that the inputs describe a road that can be split across `workers` workers.
    pub fn validate(&self, workers: usize) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.lanes == 0 || self.lanes > MAX_LANES {
            return invalid(format!("lanes must be 1 or {}, not {}", MAX_LANES, self.lanes));
        }
        if workers == 0 {
            return invalid("at least one worker is required".into());
        }
        if self.length < workers {
            return invalid(format!(
                "a road of {} sites cannot be split across {} workers",
                self.length, workers
            ));
        }
        for (name, prob) in [
            ("initial_occupancy", self.initial_occupancy),
            ("prob_slow_down", self.prob_slow_down),
            ("prob_change", self.prob_change),
        ] {
            if !(0.0..=1.0).contains(&prob) {
                return invalid(format!("{} must be within [0, 1], not {}", name, prob));
            }
        }
        if !(self.step_size > 0.0) {
            return invalid(format!("step_size must be positive, not {}", self.step_size));
        }
        if self.gap_threads == 0 {
            return invalid("gap_threads must be at least 1".into());
        }
        Ok(())
    }
}

fn parse<T>(token: &str, field: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    token.parse().map_err(|err: T::Err| ConfigError::Parse {
        field,
        reason: format!("{:?}: {}", token, err),
    })
}
