//! Block threshold resolution for the risk gate.
//!
//! Order: the node's own `blockWhenRiskGte`, then a deterministic search of
//! the parameter snapshot, then `HIGH`.

use riskflow_types::risk::RiskLevel;
use serde_json::{Map, Value};

use super::level::parse_risk_level;
use crate::value::{lookup_key, ResolvedParam};

/// Node config keys that may name the snapshot parameter holding the threshold.
pub const THRESHOLD_PARAM_CONFIG_KEYS: [&str; 4] = [
    "thresholdParamCode",
    "thresholdParamPath",
    "blockThresholdParamCode",
    "blockThresholdParamPath",
];

/// Well-known parameter codes searched after the configured ones.
pub const FALLBACK_THRESHOLD_KEYS: [&str; 4] = [
    "SIGNAL_BLOCK_RISK_GTE",
    "RISK_GATE_BLOCK_WHEN_GTE",
    "RISK_BLOCK_LEVEL",
    "risk.blockWhenGte",
];

/// Snapshot wrappers searched for each candidate key. `None` is the snapshot itself.
pub const SNAPSHOT_CONTAINERS: [Option<&str>; 5] = [
    None,
    Some("params"),
    Some("parameters"),
    Some("values"),
    Some("resolvedParams"),
];

pub const DEFAULT_THRESHOLD: RiskLevel = RiskLevel::High;

/// Where the threshold came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdSource {
    Config,
    Snapshot { key: String, container: &'static str },
    Default,
}

impl ThresholdSource {
    pub fn label(&self) -> String {
        match self {
            ThresholdSource::Config => "config.blockWhenRiskGte".to_string(),
            ThresholdSource::Snapshot { key, container } => format!("snapshot:{container}:{key}"),
            ThresholdSource::Default => "default".to_string(),
        }
    }
}

/// Ordered, de-duplicated list of snapshot keys to try.
pub fn threshold_candidate_keys(config: &Map<String, Value>) -> Vec<String> {
    let configured = THRESHOLD_PARAM_CONFIG_KEYS
        .iter()
        .filter_map(|k| config.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut keys: Vec<String> = Vec::new();
    for key in configured.chain(FALLBACK_THRESHOLD_KEYS) {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

/// Search the snapshot. First key/container pair yielding a valid level wins.
pub fn threshold_from_snapshot(
    snapshot: &Value,
    candidate_keys: &[String],
) -> Option<(RiskLevel, ThresholdSource)> {
    for key in candidate_keys {
        for container_name in SNAPSHOT_CONTAINERS {
            let container = match container_name {
                None => Some(snapshot),
                Some(name) => snapshot.get(name),
            };
            let Some(container) = container.filter(|c| c.is_object()) else {
                continue;
            };
            let Some(raw) = lookup_key(container, key) else {
                continue;
            };
            if let Some(level) = parse_risk_level(ResolvedParam::new(raw).effective()) {
                return Some((
                    level,
                    ThresholdSource::Snapshot {
                        key: key.clone(),
                        container: container_name.unwrap_or("root"),
                    },
                ));
            }
        }
    }
    None
}

/// Resolve the block threshold for a risk gate node.
pub fn resolve_threshold(
    config: &Map<String, Value>,
    snapshot: Option<&Value>,
) -> (RiskLevel, ThresholdSource) {
    if let Some(level) = config.get("blockWhenRiskGte").and_then(parse_risk_level) {
        return (level, ThresholdSource::Config);
    }
    if let Some(snapshot) = snapshot {
        let keys = threshold_candidate_keys(config);
        if let Some(found) = threshold_from_snapshot(snapshot, &keys) {
            return found;
        }
    }
    (DEFAULT_THRESHOLD, ThresholdSource::Default)
}
