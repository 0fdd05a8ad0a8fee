//! JOIN executor: barrier over upstream branch outputs.

use std::time::Duration;

use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinConfig {
    branches: Vec<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Waits until every configured branch has published, or fails after the timeout.
#[derive(Debug, Clone, Copy)]
pub struct JoinExecutor {
    default_timeout_ms: u64,
}

impl JoinExecutor {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }
}

impl NodeExecutor for JoinExecutor {
    fn name(&self) -> &'static str {
        "join"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::Join
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: JoinConfig = ctx.typed_config()?;
        if config.branches.is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "branches must not be empty"));
        }
        let timeout_ms = config.timeout_ms.unwrap_or(self.default_timeout_ms);

        match ctx
            .branches
            .wait_for(&config.branches, Duration::from_millis(timeout_ms))
            .await
        {
            Ok(outputs) => {
                let mut output = ctx.input.clone();
                let mut joined = Map::new();
                for (id, branch) in outputs {
                    joined.insert(id, branch.into());
                }
                output.insert("joinedBranches", json!(config.branches));
                output.insert("branches", Value::Object(joined));
                Ok(NodeExecutionResult::success(output))
            }
            Err(missing) => {
                tracing::warn!(
                    node_id = ctx.node.id.as_str(),
                    timeout_ms,
                    missing = ?missing,
                    "join timed out"
                );
                let mut output = ctx.input.clone();
                let mut meta = Map::new();
                meta.insert("missingBranches".into(), json!(missing));
                meta.insert("timeoutMs".into(), json!(timeout_ms));
                output.merge_meta("join", meta);
                Ok(NodeExecutionResult::failed(
                    format!(
                        "join timed out after {timeout_ms} ms waiting for: {}",
                        missing.join(", ")
                    ),
                    output,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BranchBoard;
    use riskflow_types::envelope::Envelope;
    use riskflow_types::workflow::NodeExecutionStatus;
    use std::sync::Arc;

    fn join_node(config: Value) -> WorkflowNode {
        WorkflowNode::new("j", NodeType::Join).with_config(config)
    }

    #[tokio::test]
    async fn test_join_collects_branches() {
        let board = Arc::new(BranchBoard::new());
        board.publish("left", Envelope::from_value(json!({ "l": 1 })));
        board.publish("right", Envelope::from_value(json!({ "r": 2 })));
        let ctx = NodeExecutionContext::new(
            "e",
            "u",
            join_node(json!({ "branches": ["left", "right"] })),
            Envelope::from_value(json!({ "keep": true })),
        )
        .with_branches(board);
        let result = JoinExecutor::new(1000).execute(&ctx).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.output.get("keep"), Some(&json!(true)));
        assert_eq!(result.output.get("branches").unwrap()["right"]["r"], json!(2));
        assert_eq!(result.output.get("joinedBranches"), Some(&json!(["left", "right"])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_timeout_names_missing_branches() {
        let board = Arc::new(BranchBoard::new());
        board.publish("left", Envelope::new());
        let ctx = NodeExecutionContext::new(
            "e",
            "u",
            join_node(json!({ "branches": ["left", "right"], "timeoutMs": 250 })),
            Envelope::new(),
        )
        .with_branches(board);
        let result = JoinExecutor::new(30_000).execute(&ctx).await.unwrap();
        assert_eq!(result.status, NodeExecutionStatus::Failed);
        assert_eq!(
            result.message.as_deref(),
            Some("join timed out after 250 ms waiting for: right")
        );
        assert_eq!(result.output.meta("join").unwrap()["missingBranches"], json!(["right"]));
    }

    #[tokio::test]
    async fn test_join_requires_branches() {
        let ctx = NodeExecutionContext::new("e", "u", join_node(json!({ "branches": [] })), Envelope::new());
        assert!(JoinExecutor::new(10).execute(&ctx).await.is_err());
    }
}
