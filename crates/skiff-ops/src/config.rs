//! Engine configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for a [`PendingOperations`](crate::PendingOperations) engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Maximum number of undo snapshots kept.
    #[builder(default = "100")]
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    100
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.history_limit == Some(0) {
            return Err("History limit must be at least 1".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .history_limit(5usize)
            .build()
            .unwrap();
        assert_eq!(config.history_limit, 5);

        assert_eq!(EngineConfig::builder().build().unwrap().history_limit, 100);
    }

    #[test]
    fn test_zero_history_is_rejected() {
        assert!(EngineConfig::builder().history_limit(0usize).build().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.history_limit, 100);
    }
}
