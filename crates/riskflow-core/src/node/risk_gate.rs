//! RISK_GATE executor.
//!
//! Decides pass / soft-block / hard-block from the envelope's risk level,
//! a block threshold and a list of blocker rule paths, and writes a
//! versioned decision summary over the input envelope.

use chrono::{SecondsFormat, Utc};
use riskflow_types::envelope::Envelope;
use riskflow_types::risk::{DegradeAction, RiskLevel};
use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::risk::{resolve_risk_level, resolve_threshold, RiskLevelSource, ThresholdSource};
use crate::value::{is_blocking, resolve_path_in};

/// Version of the decision summary field set.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0";

/// `_meta` namespace for gate diagnostics.
pub const META_NAMESPACE: &str = "riskGate";

const REASON_SEPARATOR: &str = "; ";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Gate config fields that are not part of threshold resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskGateConfig {
    pub risk_profile_code: String,
    pub blocker_rules: Vec<String>,
    pub degrade_action: Option<DegradeAction>,
    pub hard_block: bool,
}

impl RiskGateConfig {
    /// Read the gate config from a node.
    ///
    /// `blockerRules` that is not an array counts as empty, and non-string
    /// entries are ignored. `hardBlock` is only set by a literal `true`.
    /// An unrecognized `degradeAction` is advisory and is dropped with a warning.
    pub fn from_node(node: &WorkflowNode) -> Result<Self, NodeError> {
        let risk_profile_code = node
            .config_str("riskProfileCode")
            .ok_or_else(|| NodeError::MissingRiskProfileCode {
                node_id: node.id.clone(),
            })?
            .to_string();

        let blocker_rules = match node.config_value("blockerRules") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        let degrade_action = match node.config_value("degradeAction") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => match s.parse::<DegradeAction>() {
                Ok(action) => Some(action),
                Err(e) => {
                    tracing::warn!(node_id = node.id.as_str(), error = %e, "ignoring degradeAction");
                    None
                }
            },
            Some(other) => {
                tracing::warn!(node_id = node.id.as_str(), value = %other, "ignoring non-string degradeAction");
                None
            }
        };

        let hard_block = matches!(node.config_value("hardBlock"), Some(Value::Bool(true)));

        Ok(Self {
            risk_profile_code,
            blocker_rules,
            degrade_action,
            hard_block,
        })
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The outcome of evaluating a gate, before it is written to an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskGateDecision {
    pub risk_level: RiskLevel,
    pub risk_level_source: RiskLevelSource,
    pub threshold: RiskLevel,
    pub threshold_source: ThresholdSource,
    pub blocked_by_risk_level: bool,
    pub blockers: Vec<String>,
}

impl RiskGateDecision {
    pub fn blocked(&self) -> bool {
        self.blocked_by_risk_level || !self.blockers.is_empty()
    }

    /// Human-readable reason, `None` when the gate passes.
    pub fn block_reason(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if self.blocked_by_risk_level {
            clauses.push(format!(
                "risk level {} >= threshold {}",
                self.risk_level, self.threshold
            ));
        }
        if !self.blockers.is_empty() {
            clauses.push(format!("blocker rules hit: {}", self.blockers.join(", ")));
        }
        (!clauses.is_empty()).then(|| clauses.join(REASON_SEPARATOR))
    }
}

/// Blocker rule paths whose resolved value is blocking, in config order.
pub fn evaluate_blockers(input: &Envelope, rules: &[String]) -> Vec<String> {
    rules
        .iter()
        .filter(|path| is_blocking(resolve_path_in(input.as_map(), path)))
        .cloned()
        .collect()
}

/// Evaluate a gate against an envelope. Pure apart from reading its inputs.
pub fn evaluate(
    node: &WorkflowNode,
    config: &RiskGateConfig,
    input: &Envelope,
    parameter_snapshot: Option<&Value>,
) -> RiskGateDecision {
    let (risk_level, risk_level_source) = resolve_risk_level(input);
    let (threshold, threshold_source) = resolve_threshold(&node.config, parameter_snapshot);
    RiskGateDecision {
        risk_level,
        risk_level_source,
        threshold,
        threshold_source,
        blocked_by_risk_level: risk_level >= threshold,
        blockers: evaluate_blockers(input, &config.blocker_rules),
    }
}

/// Write the decision summary over `input`.
fn summarize(
    node: &WorkflowNode,
    config: &RiskGateConfig,
    decision: &RiskGateDecision,
    input: &Envelope,
) -> Envelope {
    let blocked = decision.blocked();
    let degrade_action = if blocked {
        config.degrade_action.map(|a| a.as_str())
    } else {
        None
    };

    let mut output = input.clone();
    let fields = json!({
        "summarySchemaVersion": SUMMARY_SCHEMA_VERSION,
        "riskLevel": decision.risk_level.as_str(),
        "riskGatePassed": !blocked,
        "riskGateBlocked": blocked,
        "blockers": decision.blockers,
        "blockerCount": decision.blockers.len(),
        "blockReason": decision.block_reason(),
        "degradeAction": degrade_action,
        "riskProfileCode": config.risk_profile_code,
        "threshold": decision.threshold.as_str(),
        "blockedByRiskLevel": decision.blocked_by_risk_level,
        "hardBlock": config.hard_block,
        "riskGateNodeId": node.id,
        "riskEvaluatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    if let Value::Object(fields) = fields {
        output.merge(fields);
    }

    let mut meta = Map::new();
    meta.insert("riskProfileCode".into(), json!(config.risk_profile_code));
    meta.insert("riskLevel".into(), json!(decision.risk_level.as_str()));
    meta.insert("threshold".into(), json!(decision.threshold.as_str()));
    meta.insert("blockedByRiskLevel".into(), json!(decision.blocked_by_risk_level));
    meta.insert("blockerHits".into(), json!(decision.blockers));
    meta.insert("hardBlock".into(), json!(config.hard_block));
    meta.insert("riskLevelSource".into(), json!(decision.risk_level_source.label()));
    meta.insert("thresholdSource".into(), json!(decision.threshold_source.label()));
    output.merge_meta(META_NAMESPACE, meta);

    output
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskGateExecutor;

impl RiskGateExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl NodeExecutor for RiskGateExecutor {
    fn name(&self) -> &'static str {
        "risk_gate"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::RiskGate
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config = RiskGateConfig::from_node(&ctx.node)?;
        let decision = evaluate(
            &ctx.node,
            &config,
            &ctx.input,
            ctx.parameter_snapshot.as_ref(),
        );
        let blocked = decision.blocked();

        tracing::info!(
            execution_id = ctx.execution_id.as_str(),
            node_id = ctx.node.id.as_str(),
            risk_profile = config.risk_profile_code.as_str(),
            risk_level = %decision.risk_level,
            threshold = %decision.threshold,
            threshold_source = %decision.threshold_source.label(),
            blocked,
            blocker_count = decision.blockers.len(),
            hard_block = config.hard_block,
            "risk gate evaluated"
        );

        let output = summarize(&ctx.node, &config, &decision, &ctx.input);
        match decision.block_reason() {
            Some(reason) if config.hard_block => Ok(NodeExecutionResult::failed(
                format!("risk gate blocked: {reason}"),
                output,
            )),
            Some(reason) => {
                Ok(NodeExecutionResult::success(output).with_message(format!("soft block: {reason}")))
            }
            None => Ok(NodeExecutionResult::success(output)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskflow_types::workflow::NodeExecutionStatus;

    fn gate(config: Value) -> WorkflowNode {
        WorkflowNode::new("gate-1", NodeType::RiskGate).with_config(config)
    }

    async fn run(config: Value, input: Value, snapshot: Option<Value>) -> NodeExecutionResult {
        let ctx = NodeExecutionContext::new("exec-1", "user-1", gate(config), Envelope::from_value(input))
            .with_parameter_snapshot(snapshot);
        RiskGateExecutor::new().execute(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_profile_code_is_config_error() {
        for config in [json!({}), json!({ "riskProfileCode": "  " }), json!({ "riskProfileCode": 3 })] {
            let ctx = NodeExecutionContext::new("e", "u", gate(config), Envelope::new());
            let err = RiskGateExecutor::new().execute(&ctx).await.unwrap_err();
            assert_eq!(
                err,
                NodeError::MissingRiskProfileCode {
                    node_id: "gate-1".to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn test_high_at_high_threshold_blocks() {
        let result = run(
            json!({ "riskProfileCode": "default", "blockWhenRiskGte": "HIGH" }),
            json!({ "riskLevel": "HIGH" }),
            None,
        )
        .await;
        let out = &result.output;
        assert_eq!(result.status, NodeExecutionStatus::Success);
        assert_eq!(out.get("riskGateBlocked"), Some(&json!(true)));
        assert_eq!(out.get("riskGatePassed"), Some(&json!(false)));
        assert_eq!(out.get("blockedByRiskLevel"), Some(&json!(true)));
        assert_eq!(out.get("threshold"), Some(&json!("HIGH")));
        assert_eq!(
            out.get("blockReason"),
            Some(&json!("risk level HIGH >= threshold HIGH"))
        );
    }

    #[tokio::test]
    async fn test_snapshot_threshold_is_unwrapped() {
        let result = run(
            json!({ "riskProfileCode": "default" }),
            json!({ "riskLevel": "HIGH" }),
            Some(json!({ "resolvedParams": { "SIGNAL_BLOCK_RISK_GTE": { "value": "EXTREME" } } })),
        )
        .await;
        let out = &result.output;
        assert_eq!(out.get("riskGateBlocked"), Some(&json!(false)));
        assert_eq!(out.get("threshold"), Some(&json!("EXTREME")));
        assert_eq!(out.get("blockReason"), Some(&Value::Null));
        assert_eq!(
            out.meta(META_NAMESPACE).and_then(|m| m.get("thresholdSource")),
            Some(&json!("snapshot:resolvedParams:SIGNAL_BLOCK_RISK_GTE"))
        );
    }

    #[tokio::test]
    async fn test_config_threshold_beats_snapshot() {
        let result = run(
            json!({ "riskProfileCode": "default", "blockWhenRiskGte": 2 }),
            json!({ "riskLevel": "M" }),
            Some(json!({ "SIGNAL_BLOCK_RISK_GTE": "EXTREME" })),
        )
        .await;
        assert_eq!(result.output.get("threshold"), Some(&json!("MEDIUM")));
        assert_eq!(result.output.get("riskGateBlocked"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_blocker_rules() {
        let result = run(
            json!({
                "riskProfileCode": "default",
                "blockWhenRiskGte": "EXTREME",
                "blockerRules": ["flags.allowBlock", "flags.noneValue", "flags.score"]
            }),
            json!({
                "riskLevel": "LOW",
                "flags": { "allowBlock": true, "noneValue": "none", "score": 1 }
            }),
            None,
        )
        .await;
        let out = &result.output;
        assert_eq!(out.get("blockers"), Some(&json!(["flags.allowBlock", "flags.score"])));
        assert_eq!(out.get("blockerCount"), Some(&json!(2)));
        assert_eq!(out.get("blockedByRiskLevel"), Some(&json!(false)));
        assert_eq!(out.get("riskGateBlocked"), Some(&json!(true)));
        assert_eq!(
            out.get("blockReason"),
            Some(&json!("blocker rules hit: flags.allowBlock, flags.score"))
        );
    }

    #[tokio::test]
    async fn test_bracket_blocker_rule_and_malformed_rules() {
        let result = run(
            json!({
                "riskProfileCode": "default",
                "blockWhenRiskGte": "EXTREME",
                "blockerRules": ["items[0].flag", "items[5].flag", 42, ""]
            }),
            json!({ "riskLevel": "LOW", "items": [{ "flag": "halt" }] }),
            None,
        )
        .await;
        assert_eq!(result.output.get("blockers"), Some(&json!(["items[0].flag"])));
    }

    #[tokio::test]
    async fn test_hard_block_fails_soft_block_succeeds() {
        let input = json!({ "riskLevel": "EXTREME" });

        let hard = run(
            json!({ "riskProfileCode": "p", "hardBlock": true }),
            input.clone(),
            None,
        )
        .await;
        assert_eq!(hard.status, NodeExecutionStatus::Failed);
        assert_eq!(
            hard.message.as_deref(),
            Some("risk gate blocked: risk level EXTREME >= threshold HIGH")
        );
        assert_eq!(hard.output.get("riskGateBlocked"), Some(&json!(true)));

        for config in [
            json!({ "riskProfileCode": "p", "hardBlock": false }),
            json!({ "riskProfileCode": "p" }),
            json!({ "riskProfileCode": "p", "hardBlock": "true" }),
        ] {
            let soft = run(config, input.clone(), None).await;
            assert_eq!(soft.status, NodeExecutionStatus::Success);
            assert_eq!(soft.output.get("riskGateBlocked"), Some(&json!(true)));
        }
    }

    #[tokio::test]
    async fn test_passing_decision_clears_degrade_action() {
        let result = run(
            json!({ "riskProfileCode": "p", "degradeAction": "REDUCE" }),
            json!({ "riskLevel": "LOW", "degradeAction": "HOLD" }),
            None,
        )
        .await;
        assert_eq!(result.output.get("riskGatePassed"), Some(&json!(true)));
        assert_eq!(result.output.get("degradeAction"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_blocked_decision_echoes_degrade_action() {
        let result = run(
            json!({ "riskProfileCode": "p", "degradeAction": "review-only" }),
            json!({ "riskLevel": "HIGH" }),
            None,
        )
        .await;
        assert_eq!(result.output.get("degradeAction"), Some(&json!("REVIEW_ONLY")));
    }

    #[tokio::test]
    async fn test_unrecognized_degrade_action_is_ignored() {
        let passed = run(
            json!({ "riskProfileCode": "p", "degradeAction": "PAUSE" }),
            json!({ "riskLevel": "LOW" }),
            None,
        )
        .await;
        assert_eq!(passed.status, NodeExecutionStatus::Success);
        assert_eq!(passed.output.get("riskGatePassed"), Some(&json!(true)));
        assert_eq!(passed.output.get("degradeAction"), Some(&Value::Null));

        let blocked = run(
            json!({ "riskProfileCode": "p", "degradeAction": 7 }),
            json!({ "riskLevel": "EXTREME" }),
            None,
        )
        .await;
        assert_eq!(blocked.status, NodeExecutionStatus::Success);
        assert_eq!(blocked.output.get("riskGateBlocked"), Some(&json!(true)));
        assert_eq!(blocked.output.get("degradeAction"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_output_preserves_input_and_meta_siblings() {
        let result = run(
            json!({ "riskProfileCode": "p" }),
            json!({
                "symbol": "600519",
                "hitScore": 85,
                "_meta": { "rulePack": { "code": "momentum" } }
            }),
            None,
        )
        .await;
        let out = &result.output;
        assert_eq!(out.get("symbol"), Some(&json!("600519")));
        assert_eq!(out.get("riskLevel"), Some(&json!("LOW")));
        assert_eq!(out.get("summarySchemaVersion"), Some(&json!("1.0")));
        assert_eq!(out.get("riskGateNodeId"), Some(&json!("gate-1")));
        assert_eq!(out.get("riskProfileCode"), Some(&json!("p")));
        assert_eq!(out.meta("rulePack"), Some(&json!({ "code": "momentum" })));
        let meta = out.meta(META_NAMESPACE).unwrap();
        assert_eq!(meta["riskLevelSource"], json!("score:hitScore"));
        assert_eq!(meta["blockerHits"], json!([]));
        assert_eq!(meta["hardBlock"], json!(false));
    }

    #[tokio::test]
    async fn test_output_has_every_contract_key() {
        let result = run(json!({ "riskProfileCode": "p" }), json!({}), None).await;
        for key in [
            "summarySchemaVersion",
            "riskLevel",
            "riskGatePassed",
            "riskGateBlocked",
            "blockers",
            "blockerCount",
            "blockReason",
            "degradeAction",
            "riskProfileCode",
            "threshold",
            "blockedByRiskLevel",
            "hardBlock",
            "riskGateNodeId",
            "riskEvaluatedAt",
        ] {
            assert!(result.output.contains_key(key), "missing {key}");
        }
        // no score anywhere: MEDIUM, below the HIGH default
        assert_eq!(result.output.get("riskLevel"), Some(&json!("MEDIUM")));
        assert_eq!(result.output.get("riskGatePassed"), Some(&json!(true)));
        let at = result.output.get("riskEvaluatedAt").and_then(Value::as_str).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(at).is_ok());
    }
}
