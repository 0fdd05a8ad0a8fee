//! APPROVAL executor: wait for a human decision, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::json;

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::collaborator::{ApprovalGateway, ApprovalRequest, ApprovalVerdict};

const DEFAULT_PROMPT: &str = "Approve workflow continuation?";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalConfig {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    approver_role: Option<String>,
}

pub struct ApprovalExecutor<P> {
    gateway: Arc<P>,
    default_timeout_secs: u64,
}

impl<P: ApprovalGateway> ApprovalExecutor<P> {
    pub fn new(gateway: Arc<P>, default_timeout_secs: u64) -> Self {
        Self {
            gateway,
            default_timeout_secs,
        }
    }
}

fn with_status(
    input: &Envelope,
    status: &str,
    approved_by: Option<String>,
    comment: Option<String>,
) -> Envelope {
    let mut output = input.clone();
    output.insert("approvalStatus", json!(status));
    output.insert("approvedBy", json!(approved_by));
    output.insert("approvalComment", json!(comment));
    output
}

impl<P: ApprovalGateway> NodeExecutor for ApprovalExecutor<P> {
    fn name(&self) -> &'static str {
        "approval"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::Approval
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: ApprovalConfig = ctx.typed_config()?;
        let timeout_secs = config.timeout_secs.unwrap_or(self.default_timeout_secs);

        let request = ApprovalRequest {
            execution_id: ctx.execution_id.clone(),
            node_id: ctx.node.id.clone(),
            prompt: config
                .prompt
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            approver_role: config.approver_role,
            context: ctx.input.to_value(),
        };

        let waited = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.gateway.request_approval(&request),
        )
        .await;

        match waited {
            Ok(Ok(decision)) => {
                let approved = decision.verdict == ApprovalVerdict::Approved;
                let status = if approved { "APPROVED" } else { "REJECTED" };
                tracing::info!(
                    node_id = ctx.node.id.as_str(),
                    status,
                    decided_by = decision.decided_by.as_deref().unwrap_or("-"),
                    "approval decided"
                );
                let output = with_status(&ctx.input, status, decision.decided_by.clone(), decision.comment.clone());
                if approved {
                    Ok(NodeExecutionResult::success(output))
                } else {
                    let by = decision.decided_by.as_deref().unwrap_or("approver");
                    Ok(NodeExecutionResult::failed(format!("approval rejected by {by}"), output))
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(node_id = ctx.node.id.as_str(), error = %e, "approval request failed");
                Ok(NodeExecutionResult::failed(
                    format!("approval request failed: {e}"),
                    with_status(&ctx.input, "ERROR", None, Some(e.to_string())),
                ))
            }
            Err(_) => {
                tracing::warn!(node_id = ctx.node.id.as_str(), timeout_secs, "approval timed out");
                Ok(NodeExecutionResult::failed(
                    format!("approval timed out after {timeout_secs} s"),
                    with_status(&ctx.input, "TIMEOUT", None, None),
                ))
            }
        }
    }
}
