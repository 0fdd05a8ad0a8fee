//! `rflow gate`: evaluate one risk gate outside of any graph.

use anyhow::Result;
use console::style;
use serde_json::{Value, json};

use riskflow_core::node::risk_gate::RiskGateExecutor;
use riskflow_core::node::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{NodeType, WorkflowNode};

use super::files::{json_arg, json_object_arg};

/// Node id given to gates evaluated from the command line.
pub const CLI_GATE_NODE_ID: &str = "cli-risk-gate";

/// Run the risk gate executor once with the given config, envelope and snapshot.
pub async fn evaluate_gate(
    node_config: Value,
    input: Value,
    snapshot: Option<Value>,
) -> Result<NodeExecutionResult, NodeError> {
    let node = WorkflowNode::new(CLI_GATE_NODE_ID, NodeType::RiskGate).with_config(node_config);
    let execution_id = uuid::Uuid::now_v7().to_string();
    let ctx = NodeExecutionContext::new(execution_id, "cli", node, Envelope::from_value(input))
        .with_parameter_snapshot(snapshot);
    RiskGateExecutor::new().execute(&ctx).await
}

pub async fn handle_gate(
    node_config: &str,
    input: &str,
    snapshot: Option<&str>,
    json: bool,
) -> Result<()> {
    let node_config = json_object_arg(node_config, "--node-config")?;
    let input = json_object_arg(input, "--input")?;
    let snapshot = snapshot.map(json_arg).transpose()?;

    let result = evaluate_gate(node_config, input, snapshot).await?;

    if json {
        let out = json!({
            "status": result.status,
            "message": result.message,
            "output": result.output,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let out = &result.output;
    let field = |key: &str| match out.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    };
    let blocked = out.get("riskGateBlocked") == Some(&Value::Bool(true));
    let verdict = if !blocked {
        style("PASS").green().bold()
    } else if result.is_success() {
        style("SOFT BLOCK").yellow().bold()
    } else {
        style("HARD BLOCK").red().bold()
    };

    println!();
    println!("  {} Risk gate {}", style("*").bold(), verdict);
    println!();
    println!("  Risk level:   {}", style(field("riskLevel")).cyan());
    println!("  Threshold:    {}", field("threshold"));
    println!("  By level:     {}", field("blockedByRiskLevel"));
    println!("  Blockers:     {}", field("blockers"));
    println!("  Degrade:      {}", field("degradeAction"));
    if let Some(message) = &result.message {
        println!("  Reason:       {}", style(message).dim());
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskflow_types::workflow::NodeExecutionStatus;

    #[tokio::test]
    async fn test_evaluate_gate_soft_block() {
        let result = evaluate_gate(
            json!({ "riskProfileCode": "default", "blockWhenRiskGte": "MEDIUM" }),
            json!({ "hitScore": 45 }),
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.status, NodeExecutionStatus::Success);
        assert_eq!(result.output.get("riskLevel"), Some(&json!("HIGH")));
        assert_eq!(result.output.get("riskGateNodeId"), Some(&json!(CLI_GATE_NODE_ID)));
        assert_eq!(result.output.get("riskGateBlocked"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_evaluate_gate_requires_profile() {
        let err = evaluate_gate(json!({}), json!({}), None).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingRiskProfileCode { .. }));
    }
}
