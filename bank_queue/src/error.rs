//! Error types for the bank queue model

use des::DesError;
use des::parallel::ScenarioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration value broke its constraint; the run never started.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The event loop was asked to move time backwards.
    #[error("simulation aborted: {0}")]
    Scheduler(#[from] DesError),

    #[error("replication {index} failed: {source}")]
    Replication {
        index: usize,
        #[source]
        source: ScenarioError,
    },

    #[error("could not parse experiment file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not read experiment file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize results: {0}")]
    Output(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn render(values: &BTreeMap<(u8, u8), f64>) -> Result<String, SimError> {
        Ok(serde_json::to_string(values)?)
    }

    #[test]
    fn test_serialization_failure_propagates() {
        // JSON object keys must be strings, so a tuple key cannot be written
        let values = BTreeMap::from([((1, 2), 0.5)]);

        let err = render(&values).unwrap_err();

        assert!(matches!(err, SimError::Output(_)));
        assert!(err.to_string().starts_with("could not serialize results"));
    }

    #[test]
    fn test_invalid_names_parameter() {
        let err = SimError::invalid("teller_count", "at least one teller is required");
        assert_eq!(
            err.to_string(),
            "invalid parameter `teller_count`: at least one teller is required"
        );
    }
}
