//! SUBFLOW_CALL executor: run a nested workflow through a [`SubflowInvoker`].

use std::sync::Arc;

use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::collaborator::{SubflowInvoker, SubflowRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubflowConfig {
    flow_code: String,
    /// Nest the child output under this key instead of merging it at the root.
    #[serde(default)]
    output_key_prefix: Option<String>,
}

pub struct SubflowCallExecutor<S> {
    invoker: Arc<S>,
    max_depth: u32,
}

impl<S: SubflowInvoker> SubflowCallExecutor<S> {
    pub fn new(invoker: Arc<S>, max_depth: u32) -> Self {
        Self { invoker, max_depth }
    }
}

impl<S: SubflowInvoker> NodeExecutor for SubflowCallExecutor<S> {
    fn name(&self) -> &'static str {
        "subflow_call"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::SubflowCall
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: SubflowConfig = ctx.typed_config()?;
        let flow_code = config.flow_code.trim();
        if flow_code.is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "flowCode must not be empty"));
        }

        let depth = ctx.subflow_depth + 1;
        if depth > self.max_depth {
            return Err(NodeError::SubflowDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }

        let request = SubflowRequest {
            flow_code: flow_code.to_string(),
            input: ctx.input.clone(),
            parent_execution_id: ctx.execution_id.clone(),
            user_id: ctx.user_id.clone(),
            depth,
        };
        let child = match self.invoker.invoke(&request).await {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(node_id = ctx.node.id.as_str(), flow = flow_code, error = %e, "sub-flow failed");
                return Ok(NodeExecutionResult::failed(
                    format!("sub-flow '{flow_code}' failed: {e}"),
                    ctx.input.clone(),
                ));
            }
        };

        let prefix = config
            .output_key_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let mut output = ctx.input.clone();
        match (prefix, child) {
            (Some(prefix), child) => output.insert(prefix, child),
            (None, Value::Object(fields)) => output.merge(fields),
            (None, other) => output.insert("subflowOutput", other),
        }

        let mut meta = Map::new();
        meta.insert("flowCode".into(), json!(flow_code));
        meta.insert("depth".into(), json!(depth));
        meta.insert("outputKeyPrefix".into(), json!(prefix));
        output.merge_meta("subflow", meta);

        Ok(NodeExecutionResult::success(output))
    }
}
