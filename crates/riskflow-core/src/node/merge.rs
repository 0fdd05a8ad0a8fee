//! DECISION_MERGE executor: weighted or majority vote over upstream decisions.
//!
//! Reads the outputs of the configured source nodes from the run's
//! [`BranchBoard`](super::BranchBoard). No external call.

use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::value::as_finite_number;

fn default_weight() -> f64 {
    1.0
}

fn default_decision_field() -> String {
    "decision".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    /// Each vote counts `weight * confidence`.
    #[default]
    Weighted,
    /// Each vote counts 1.
    Majority,
}

impl MergeStrategy {
    fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Weighted => "WEIGHTED",
            MergeStrategy::Majority => "MAJORITY",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MergeSource {
    NodeId(String),
    #[serde(rename_all = "camelCase")]
    Weighted {
        node_id: String,
        #[serde(default = "default_weight")]
        weight: f64,
    },
}

impl MergeSource {
    fn node_id(&self) -> &str {
        match self {
            MergeSource::NodeId(id) => id,
            MergeSource::Weighted { node_id, .. } => node_id,
        }
    }

    fn weight(&self) -> f64 {
        match self {
            MergeSource::NodeId(_) => 1.0,
            MergeSource::Weighted { weight, .. } => *weight,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionMergeConfig {
    sources: Vec<MergeSource>,
    #[serde(default)]
    strategy: MergeStrategy,
    #[serde(default = "default_decision_field")]
    decision_field: String,
}

/// One upstream decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub node_id: String,
    pub decision: String,
    pub weight: f64,
    /// Normalised to 0..=1; 1 when the source reports none.
    pub confidence: f64,
}

/// Confidence of a source output; percentages are scaled down to 0..=1.
fn vote_confidence(output: &Envelope) -> f64 {
    match output.get("confidence").and_then(as_finite_number) {
        Some(c) if c > 1.0 => (c / 100.0).min(1.0),
        Some(c) if c >= 0.0 => c,
        _ => 1.0,
    }
}

/// Winning decision and its share of the total score. Ties go to the
/// decision seen first. `None` without votes or without any positive score.
pub fn tally(votes: &[Vote], strategy: MergeStrategy) -> Option<(String, f64)> {
    let mut totals: Vec<(&str, f64)> = Vec::new();
    for vote in votes {
        let score = match strategy {
            MergeStrategy::Weighted => vote.weight.max(0.0) * vote.confidence,
            MergeStrategy::Majority => 1.0,
        };
        match totals.iter_mut().find(|(d, _)| *d == vote.decision) {
            Some((_, total)) => *total += score,
            None => totals.push((vote.decision.as_str(), score)),
        }
    }

    let sum: f64 = totals.iter().map(|(_, s)| s).sum();
    if sum <= 0.0 {
        return None;
    }
    let mut best: Option<(&str, f64)> = None;
    for (decision, score) in totals {
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((decision, score));
        }
    }
    best.map(|(decision, score)| (decision.to_string(), score / sum))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionMergeExecutor;

impl NodeExecutor for DecisionMergeExecutor {
    fn name(&self) -> &'static str {
        "decision_merge"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::DecisionMerge
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: DecisionMergeConfig = ctx.typed_config()?;
        if config.sources.is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "sources must not be empty"));
        }

        let mut votes = Vec::new();
        let mut missing = Vec::new();
        for source in &config.sources {
            let Some(output) = ctx.branches.get(source.node_id()) else {
                missing.push(source.node_id().to_string());
                continue;
            };
            let Some(decision) = output
                .get(&config.decision_field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|d| !d.is_empty())
            else {
                missing.push(source.node_id().to_string());
                continue;
            };
            votes.push(Vote {
                node_id: source.node_id().to_string(),
                decision: decision.to_string(),
                weight: source.weight(),
                confidence: vote_confidence(&output),
            });
        }

        let mut output = ctx.input.clone();
        let vote_values: Vec<Value> = votes
            .iter()
            .map(|v| {
                json!({
                    "nodeId": v.node_id,
                    "decision": v.decision,
                    "weight": v.weight,
                    "confidence": v.confidence,
                })
            })
            .collect();
        output.insert("mergeVotes", Value::Array(vote_values));

        let mut meta = Map::new();
        meta.insert("strategy".into(), json!(config.strategy.as_str()));
        meta.insert("decisionField".into(), json!(config.decision_field));
        meta.insert("missingSources".into(), json!(missing));
        output.merge_meta("decisionMerge", meta);

        let Some((decision, score)) = tally(&votes, config.strategy) else {
            let message = if votes.is_empty() {
                format!("no usable votes from sources: {}", missing.join(", "))
            } else {
                let voters: Vec<&str> = votes.iter().map(|v| v.node_id.as_str()).collect();
                format!("every vote scored zero from sources: {}", voters.join(", "))
            };
            return Ok(NodeExecutionResult::failed(message, output));
        };
        output.insert("mergedDecision", json!(decision));
        output.insert("mergedScore", json!(score));

        Ok(NodeExecutionResult::success(output))
    }
}
