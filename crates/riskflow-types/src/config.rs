//! Engine configuration types.
//!
//! `EngineConfig` is the top-level `riskflow.toml`. Every field has a default,
//! so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::analytics::TrendGranularity;

/// Runtime limits for the node execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a JOIN node waits for its branches when the node sets no `timeoutMs`.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// How long an APPROVAL node waits when the node sets no `timeoutSecs`.
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,

    /// Upper bound on a single node execution, enforced by the graph runner.
    #[serde(default = "default_node_timeout_secs")]
    pub node_timeout_secs: u64,

    /// Maximum nesting of SUBFLOW_CALL nodes.
    #[serde(default = "default_max_subflow_depth")]
    pub max_subflow_depth: u32,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

fn default_join_timeout_ms() -> u64 {
    30_000
}

fn default_approval_timeout_secs() -> u64 {
    3_600
}

fn default_node_timeout_secs() -> u64 {
    300
}

fn default_max_subflow_depth() -> u32 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: default_join_timeout_ms(),
            approval_timeout_secs: default_approval_timeout_secs(),
            node_timeout_secs: default_node_timeout_secs(),
            max_subflow_depth: default_max_subflow_depth(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

/// Defaults for the analytics aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub default_granularity: TrendGranularity,

    /// Length of the `topSlowNodes` list.
    #[serde(default = "default_top_slow_nodes")]
    pub top_slow_nodes: usize,
}

fn default_top_slow_nodes() -> usize {
    10
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_granularity: TrendGranularity::Day,
            top_slow_nodes: default_top_slow_nodes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.join_timeout_ms, 30_000);
        assert_eq!(config.node_timeout_secs, 300);
        assert_eq!(config.max_subflow_depth, 5);
        assert_eq!(config.analytics.top_slow_nodes, 10);
    }

    #[test]
    fn test_engine_config_deserialize_empty() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.approval_timeout_secs, 3_600);
        assert_eq!(config.analytics.default_granularity, TrendGranularity::Day);
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
join_timeout_ms = 500
node_timeout_secs = 12

[analytics]
default_granularity = "HOUR"
top_slow_nodes = 3
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.join_timeout_ms, 500);
        assert_eq!(config.node_timeout_secs, 12);
        assert_eq!(config.approval_timeout_secs, 3_600);
        assert_eq!(config.analytics.default_granularity, TrendGranularity::Hour);
        assert_eq!(config.analytics.top_slow_nodes, 3);
    }
}
