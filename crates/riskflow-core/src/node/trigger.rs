//! Trigger executors (MANUAL / CRON / EVENT / WEBHOOK).
//!
//! A trigger is the first node of a run. It seeds the envelope with the
//! trigger metadata and, optionally, lifts an event payload to the root.

use chrono::{SecondsFormat, Utc};
use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::WorkflowNode;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerConfig {
    /// Fields applied only when the input does not already carry them.
    #[serde(default)]
    defaults: Map<String, Value>,
    /// Input key holding the event/webhook body to lift to the root.
    #[serde(default)]
    payload_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerExecutor;

impl NodeExecutor for TriggerExecutor {
    fn name(&self) -> &'static str {
        "trigger"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type.is_trigger()
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: TriggerConfig = ctx.typed_config()?;

        let mut output = Envelope::from(config.defaults);
        output.merge(ctx.input.as_map().clone());

        if let Some(key) = config.payload_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            match ctx.input.get(key) {
                Some(Value::Object(payload)) => output.merge(payload.clone()),
                Some(_) => {
                    return Err(NodeError::invalid_config(
                        &ctx.node,
                        format!("payload '{key}' is not an object"),
                    ));
                }
                None => {}
            }
        }

        output.insert("triggerType", Value::String(ctx.node.node_type.as_str().to_string()));
        output.insert("triggeredBy", Value::String(ctx.user_id.clone()));
        output.insert(
            "triggeredAt",
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        output.insert("executionId", Value::String(ctx.execution_id.clone()));

        Ok(NodeExecutionResult::success(output))
    }
}
