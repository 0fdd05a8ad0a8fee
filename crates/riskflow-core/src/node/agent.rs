//! SINGLE_AGENT and DEBATE_ROUND executors.

use std::sync::Arc;

use futures_util::future::join_all;
use riskflow_types::workflow::{NodeType, WorkflowNode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::collaborator::{AgentInvoker, AgentRequest};

// ---------------------------------------------------------------------------
// SINGLE_AGENT
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SingleAgentConfig {
    agent_code: String,
    #[serde(default)]
    prompt: Option<String>,
    /// Nest the answer under this key instead of merging it at the root.
    #[serde(default)]
    output_key: Option<String>,
}

pub struct SingleAgentExecutor<A> {
    agents: Arc<A>,
}

impl<A: AgentInvoker> SingleAgentExecutor<A> {
    pub fn new(agents: Arc<A>) -> Self {
        Self { agents }
    }
}

impl<A: AgentInvoker> NodeExecutor for SingleAgentExecutor<A> {
    fn name(&self) -> &'static str {
        "single_agent"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::SingleAgent
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: SingleAgentConfig = ctx.typed_config()?;
        let agent_code = config.agent_code.trim();
        if agent_code.is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "agentCode must not be empty"));
        }

        let request = AgentRequest {
            agent_code: agent_code.to_string(),
            execution_id: ctx.execution_id.clone(),
            node_id: ctx.node.id.clone(),
            role: None,
            prompt: config.prompt,
            input: ctx.input.to_value(),
        };
        let answer = match self.agents.invoke(&request).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(node_id = ctx.node.id.as_str(), agent = agent_code, error = %e, "agent invocation failed");
                return Ok(NodeExecutionResult::failed(
                    format!("agent '{agent_code}' failed: {e}"),
                    ctx.input.clone(),
                ));
            }
        };

        let mut output = ctx.input.clone();
        match (config.output_key.as_deref().map(str::trim), answer) {
            (Some(key), answer) if !key.is_empty() => output.insert(key, answer),
            (_, Value::Object(fields)) => output.merge(fields),
            (_, other) => output.insert("agentOutput", other),
        }
        let mut meta = Map::new();
        meta.insert("agentCode".into(), json!(agent_code));
        output.merge_meta("agent", meta);

        Ok(NodeExecutionResult::success(output))
    }
}

// ---------------------------------------------------------------------------
// DEBATE_ROUND
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Participant {
    Code(String),
    #[serde(rename_all = "camelCase")]
    Detailed {
        agent_code: String,
        #[serde(default)]
        role: Option<String>,
    },
}

impl Participant {
    fn agent_code(&self) -> &str {
        match self {
            Participant::Code(code) => code,
            Participant::Detailed { agent_code, .. } => agent_code,
        }
    }

    fn role(&self) -> Option<&str> {
        match self {
            Participant::Code(_) => None,
            Participant::Detailed { role, .. } => role.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebateConfig {
    participants: Vec<Participant>,
    judge_agent_code: String,
    #[serde(default)]
    topic: Option<String>,
}

/// Runs every participant concurrently, then the judge over their arguments.
pub struct DebateRoundExecutor<A> {
    agents: Arc<A>,
}

impl<A: AgentInvoker> DebateRoundExecutor<A> {
    pub fn new(agents: Arc<A>) -> Self {
        Self { agents }
    }
}

impl<A: AgentInvoker> NodeExecutor for DebateRoundExecutor<A> {
    fn name(&self) -> &'static str {
        "debate_round"
    }

    fn supports(&self, node: &WorkflowNode) -> bool {
        node.node_type == NodeType::DebateRound
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let config: DebateConfig = ctx.typed_config()?;
        if config.participants.is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "participants must not be empty"));
        }
        if config.judge_agent_code.trim().is_empty() {
            return Err(NodeError::invalid_config(&ctx.node, "judgeAgentCode must not be empty"));
        }

        let input = ctx.input.to_value();
        let requests: Vec<AgentRequest> = config
            .participants
            .iter()
            .map(|p| AgentRequest {
                agent_code: p.agent_code().to_string(),
                execution_id: ctx.execution_id.clone(),
                node_id: ctx.node.id.clone(),
                role: p.role().map(str::to_string),
                prompt: config.topic.clone(),
                input: input.clone(),
            })
            .collect();

        let calls: Vec<_> = requests.iter().map(|r| self.agents.invoke(r)).collect();
        let answers = join_all(calls).await;

        let mut arguments = Vec::with_capacity(answers.len());
        for (request, answer) in requests.iter().zip(answers) {
            match answer {
                Ok(answer) => arguments.push(json!({
                    "agentCode": request.agent_code,
                    "role": request.role,
                    "argument": answer,
                })),
                Err(e) => {
                    tracing::warn!(node_id = ctx.node.id.as_str(), agent = request.agent_code.as_str(), error = %e, "debate participant failed");
                    return Ok(NodeExecutionResult::failed(
                        format!("debate participant '{}' failed: {e}", request.agent_code),
                        ctx.input.clone(),
                    ));
                }
            }
        }

        let judge = AgentRequest {
            agent_code: config.judge_agent_code.trim().to_string(),
            execution_id: ctx.execution_id.clone(),
            node_id: ctx.node.id.clone(),
            role: Some("judge".to_string()),
            prompt: config.topic.clone(),
            input: json!({
                "topic": config.topic,
                "arguments": arguments,
                "context": input,
            }),
        };
        let verdict = match self.agents.invoke(&judge).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(node_id = ctx.node.id.as_str(), agent = judge.agent_code.as_str(), error = %e, "debate judge failed");
                return Ok(NodeExecutionResult::failed(
                    format!("debate judge '{}' failed: {e}", judge.agent_code),
                    ctx.input.clone(),
                ));
            }
        };

        let mut output = ctx.input.clone();
        if let Value::Object(fields) = &verdict {
            output.merge(fields.clone());
        }
        output.insert("debateArguments", Value::Array(arguments));
        output.insert("debateVerdict", verdict);

        let mut meta = Map::new();
        meta.insert("participants".into(), json!(requests.len()));
        meta.insert("judgeAgentCode".into(), json!(judge.agent_code));
        output.merge_meta("debate", meta);

        Ok(NodeExecutionResult::success(output))
    }
}
