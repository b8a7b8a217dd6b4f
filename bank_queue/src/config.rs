//! Run configuration
//!
//! A [`SimConfig`] is plain data (it deserializes straight from the `[model]`
//! table of an experiment file). Nothing in the crate runs one directly:
//! [`SimConfig::validate`] turns it into a [`ValidConfig`], and only that
//! type is accepted by the driver.

use std::fs;
use std::ops::Deref;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// What happens to customers still inside the bank when the horizon is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Stop the clock at the horizon; queued and in-service customers are
    /// left out of the statistics and reported as in flight.
    #[default]
    Truncate,
    /// Stop admitting arrivals at the horizon but keep serving everyone
    /// already inside until the bank is empty.
    Drain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub teller_count: usize,
    pub mean_interarrival_minutes: f64,
    pub mean_service_minutes: f64,
    pub horizon_minutes: f64,
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub completion: CompletionPolicy,
    #[serde(default)]
    pub record_trace: bool,
}

impl SimConfig {
    pub fn new(
        teller_count: usize,
        mean_interarrival_minutes: f64,
        mean_service_minutes: f64,
        horizon_minutes: f64,
    ) -> Self {
        SimConfig {
            teller_count,
            mean_interarrival_minutes,
            mean_service_minutes,
            horizon_minutes,
            random_seed: None,
            completion: CompletionPolicy::default(),
            record_trace: false,
        }
    }

    /// An eight hour banking day with three tellers that are kept busy but
    /// not overwhelmed.
    pub fn eight_hour_day() -> Self {
        SimConfig::new(3, 1.2, 2.0, 480.0)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_trace(mut self, record_trace: bool) -> Self {
        self.record_trace = record_trace;
        self
    }

    pub fn validate(self) -> Result<ValidConfig, SimError> {
        if self.teller_count < 1 {
            return Err(SimError::invalid(
                "teller_count",
                "at least one teller is required",
            ));
        }
        check_mean("mean_interarrival_minutes", self.mean_interarrival_minutes)?;
        check_mean("mean_service_minutes", self.mean_service_minutes)?;
        // a zero horizon is a legal (empty) run
        if !(self.horizon_minutes.is_finite() && self.horizon_minutes >= 0.0) {
            return Err(SimError::invalid(
                "horizon_minutes",
                format!(
                    "must be a finite, non-negative number of minutes (got {})",
                    self.horizon_minutes
                ),
            ));
        }
        Ok(ValidConfig(self))
    }
}

pub(crate) fn check_mean(name: &'static str, mean: f64) -> Result<(), SimError> {
    if mean.is_finite() && mean > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(
            name,
            format!("must be a finite, positive number of minutes (got {})", mean),
        ))
    }
}

/// A [`SimConfig`] that passed validation. Immutable for the rest of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidConfig(SimConfig);

impl ValidConfig {
    pub fn into_inner(self) -> SimConfig {
        self.0
    }
}

impl Deref for ValidConfig {
    type Target = SimConfig;

    fn deref(&self) -> &SimConfig {
        &self.0
    }
}

/// Experiment file: one model configuration run several times.
///
/// ```toml
/// [experiment]
/// name = "eight_hour_day"
/// replications = 10
///
/// [model]
/// teller_count = 3
/// mean_interarrival_minutes = 1.2
/// mean_service_minutes = 2.0
/// horizon_minutes = 480.0
/// random_seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment: ExperimentMetadata,
    pub model: SimConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    pub name: String,
    #[serde(default = "default_replications")]
    pub replications: usize,
    /// Worker threads; rayon's global pool when absent.
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_replications() -> usize {
    1
}

impl ExperimentConfig {
    pub fn eight_hour_day() -> Self {
        ExperimentConfig {
            experiment: ExperimentMetadata {
                name: "eight_hour_day".to_string(),
                replications: 10,
                threads: None,
            },
            model: SimConfig::eight_hour_day(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, SimError> {
        let config: ExperimentConfig = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    fn check(&self) -> Result<(), SimError> {
        if self.experiment.replications < 1 {
            return Err(SimError::invalid(
                "replications",
                "at least one replication is required",
            ));
        }
        if self.experiment.threads == Some(0) {
            return Err(SimError::invalid("threads", "must be at least 1 when set"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_name(result: Result<ValidConfig, SimError>) -> &'static str {
        match result {
            Err(SimError::InvalidParameter { name, .. }) => name,
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_eight_hour_day_is_valid() {
        let config = SimConfig::eight_hour_day().validate().unwrap();
        assert_eq!(config.teller_count, 3);
        assert_eq!(config.horizon_minutes, 480.0);
        assert_eq!(config.completion, CompletionPolicy::Truncate);
    }

    #[test]
    fn test_zero_tellers_rejected() {
        let config = SimConfig::new(0, 1.0, 1.0, 10.0);
        assert_eq!(invalid_name(config.validate()), "teller_count");
    }

    #[test]
    fn test_non_positive_means_rejected() {
        assert_eq!(
            invalid_name(SimConfig::new(1, 0.0, 1.0, 10.0).validate()),
            "mean_interarrival_minutes"
        );
        assert_eq!(
            invalid_name(SimConfig::new(1, 1.0, -2.0, 10.0).validate()),
            "mean_service_minutes"
        );
        assert_eq!(
            invalid_name(SimConfig::new(1, f64::NAN, 1.0, 10.0).validate()),
            "mean_interarrival_minutes"
        );
    }

    #[test]
    fn test_horizon_bounds() {
        assert!(SimConfig::new(1, 1.0, 1.0, 0.0).validate().is_ok());
        assert_eq!(
            invalid_name(SimConfig::new(1, 1.0, 1.0, -1.0).validate()),
            "horizon_minutes"
        );
        assert_eq!(
            invalid_name(SimConfig::new(1, 1.0, 1.0, f64::INFINITY).validate()),
            "horizon_minutes"
        );
    }

    #[test]
    fn test_error_message_names_parameter() {
        let err = SimConfig::new(1, 1.0, 0.0, 10.0).validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("mean_service_minutes"));
        assert!(message.contains("got 0"));
    }

    #[test]
    fn test_experiment_from_toml() {
        let text = r#"
            [experiment]
            name = "lunch_rush"
            replications = 4
            threads = 2

            [model]
            teller_count = 2
            mean_interarrival_minutes = 0.8
            mean_service_minutes = 1.5
            horizon_minutes = 120.0
            random_seed = 7
            completion = "drain"
        "#;

        let config = ExperimentConfig::from_toml(text).unwrap();

        assert_eq!(config.experiment.name, "lunch_rush");
        assert_eq!(config.experiment.replications, 4);
        assert_eq!(config.experiment.threads, Some(2));
        assert_eq!(config.model.teller_count, 2);
        assert_eq!(config.model.random_seed, Some(7));
        assert_eq!(config.model.completion, CompletionPolicy::Drain);
        assert!(!config.model.record_trace);
    }

    #[test]
    fn test_experiment_defaults() {
        let text = r#"
            [experiment]
            name = "defaults"

            [model]
            teller_count = 1
            mean_interarrival_minutes = 5.0
            mean_service_minutes = 4.0
            horizon_minutes = 60.0
        "#;

        let config = ExperimentConfig::from_toml(text).unwrap();

        assert_eq!(config.experiment.replications, 1);
        assert_eq!(config.experiment.threads, None);
        assert_eq!(config.model.random_seed, None);
        assert_eq!(config.model.completion, CompletionPolicy::Truncate);
    }

    #[test]
    fn test_experiment_rejects_zero_replications() {
        let text = r#"
            [experiment]
            name = "nothing"
            replications = 0

            [model]
            teller_count = 1
            mean_interarrival_minutes = 5.0
            mean_service_minutes = 4.0
            horizon_minutes = 60.0
        "#;

        assert!(matches!(
            ExperimentConfig::from_toml(text),
            Err(SimError::InvalidParameter {
                name: "replications",
                ..
            })
        ));
    }

    #[test]
    fn test_experiment_rejects_malformed_toml() {
        let text = "[experiment]\nname = 3\n";
        assert!(matches!(
            ExperimentConfig::from_toml(text),
            Err(SimError::Config(_))
        ));
    }
}
