//! Engine Configuration

use serde::{Deserialize, Serialize};

/// Runtime options of a `LogicEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Skip nodes whose inputs did not change since their last execution.
    ///
    /// When disabled, every node runs on every tick.
    pub track_dirty_nodes: bool,

    /// Record an `UpdateReport` for each tick.
    pub collect_update_report: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_dirty_nodes: true,
            collect_update_report: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_config() {
        let config = EngineConfig::from_json(r#"{"collect_update_report": true}"#).unwrap();
        assert!(config.track_dirty_nodes);
        assert!(config.collect_update_report);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(EngineConfig::from_json(r#"{"track_dirty": false}"#).is_err());
    }

    #[test]
    fn json_round_trip() {
        let config = EngineConfig {
            track_dirty_nodes: false,
            collect_update_report: true,
        };
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
