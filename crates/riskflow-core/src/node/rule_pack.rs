//! RULE_PACK_EVAL executor: load a rule pack and score the envelope against it.

use std::sync::Arc;

use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::collaborator::{Rule, RuleOperator, RulePack, RulePackSource};
use crate::value::{as_finite_number, is_blocking, loosely_equal, resolve_path_in};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulePackEvalConfig {
    rule_pack_code: String,
}

/// Score of one pack against one envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RulePackScore {
    /// 0-100, rounded.
    pub hit_score: u32,
    pub hits: Vec<String>,
    pub misses: Vec<String>,
    pub hit_weight: f64,
    pub total_weight: f64,
}

/// Whether a single rule holds for the envelope.
pub fn rule_matches(rule: &Rule, input: &Envelope) -> bool {
    let actual = resolve_path_in(input.as_map(), &rule.path);
    let expected = rule.value.as_ref();
    match rule.operator {
        RuleOperator::Exists => actual.is_some_and(|v| !v.is_null()),
        RuleOperator::Truthy => is_blocking(actual),
        RuleOperator::Eq => match (actual, expected) {
            (Some(a), Some(e)) => loosely_equal(a, e),
            (None, None) => true,
            _ => false,
        },
        RuleOperator::Ne => match (actual, expected) {
            (Some(a), Some(e)) => !loosely_equal(a, e),
            (None, None) => false,
            _ => true,
        },
        RuleOperator::In => match (actual, expected) {
            (Some(a), Some(Value::Array(options))) => options.iter().any(|o| loosely_equal(a, o)),
            _ => false,
        },
        RuleOperator::Gt | RuleOperator::Gte | RuleOperator::Lt | RuleOperator::Lte => {
            let (Some(a), Some(e)) = (
                actual.and_then(as_finite_number),
                expected.and_then(as_finite_number),
            ) else {
                return false;
            };
            match rule.operator {
                RuleOperator::Gt => a > e,
                RuleOperator::Gte => a >= e,
                RuleOperator::Lt => a < e,
                _ => a <= e,
            }
        }
    }
}

/// Score a pack: `round(100 * hit weight / total weight)`, 0 for a weightless pack.
///
/// Negative or non-finite weights count as 0.
pub fn score_rule_pack(pack: &RulePack, input: &Envelope) -> RulePackScore {
    let mut hits = Vec::new();
    let mut misses = Vec::new();
    let mut hit_weight = 0.0;
    let mut total_weight = 0.0;

    for rule in &pack.rules {
        let weight = if rule.weight.is_finite() { rule.weight.max(0.0) } else { 0.0 };
        total_weight += weight;
        if rule_matches(rule, input) {
            hit_weight += weight;
            hits.push(rule.id.clone());
        } else {
            misses.push(rule.id.clone());
        }
    }

    let hit_score = if total_weight > 0.0 {
        (100.0 * hit_weight / total_weight).round() as u32
    } else {
        0
    };

    RulePackScore {
        hit_score,
        hits,
        misses,
        hit_weight,
        total_weight,
    }
}

pub struct RulePackEvalExecutor<R> {
    source: Arc<R>,
}

impl<R: RulePackSource> RulePackEvalExecutor<R> {
    pub fn new(source: Arc<R>) -> Self {
        Self { source }
    }
}

impl<R: RulePackSource> NodeExecutor for RulePackEvalExecutor<R> {
    fn name(&self) -> &'static str {
        "rule_pack_eval"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::RulePackEval
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: RulePackEvalConfig = ctx.typed_config()?;
        let code = config.rule_pack_code.trim();
        if code.is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "rulePackCode must not be empty"));
        }

        let pack = match self.source.load(code).await {
            Ok(pack) => pack,
            Err(e) => {
                tracing::warn!(node_id = ctx.node.id.as_str(), rule_pack = code, error = %e, "rule pack lookup failed");
                return Ok(NodeExecutionResult::failed(
                    format!("rule pack '{code}' lookup failed: {e}"),
                    ctx.input.clone(),
                ));
            }
        };

        let score = score_rule_pack(&pack, &ctx.input);
        tracing::debug!(
            node_id = ctx.node.id.as_str(),
            rule_pack = code,
            hit_score = score.hit_score,
            hits = score.hits.len(),
            "rule pack scored"
        );

        let mut output = ctx.input.clone();
        output.insert("rulePackCode", json!(pack.code));
        output.insert("hitScore", json!(score.hit_score));
        output.insert("ruleHits", json!(score.hits));
        output.insert("ruleMisses", json!(score.misses));

        let mut meta = Map::new();
        meta.insert("code".into(), json!(pack.code));
        meta.insert("version".into(), json!(pack.version));
        meta.insert("ruleCount".into(), json!(pack.rules.len()));
        meta.insert("hitWeight".into(), json!(score.hit_weight));
        meta.insert("totalWeight".into(), json!(score.total_weight));
        output.merge_meta("rulePack", meta);

        Ok(NodeExecutionResult::success(output))
    }
}
