//! External collaborator ports.
//!
//! The engine never talks to an LLM, a rule store, a market data feed or a
//! human directly. Node executors call these traits; implementations live
//! outside the engine. `fixture` provides a static, file-backed
//! implementation of all of them for harnesses and tests.
//!
//! Uses native async fn in traits (RPITIT), no async_trait macro.

pub mod fixture;

use std::future::Future;

use riskflow_types::envelope::Envelope;
use riskflow_types::error::CollaboratorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Agent invocation
// ---------------------------------------------------------------------------

/// One structured-output agent call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub agent_code: String,
    pub execution_id: String,
    pub node_id: String,
    /// Debate role (e.g. "bull", "bear", "judge").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Structured input for the agent, usually the current envelope.
    pub input: Value,
}

/// Invokes an AI agent and returns its structured JSON answer.
pub trait AgentInvoker: Send + Sync {
    fn invoke(
        &self,
        request: &AgentRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send;
}

// ---------------------------------------------------------------------------
// Rule packs
// ---------------------------------------------------------------------------

/// Comparison applied by a rule to the value at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
    Truthy,
    In,
}

fn default_rule_weight() -> f64 {
    1.0
}

/// A single scoring rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    /// Dot/bracket path into the envelope.
    pub path: String,
    pub operator: RuleOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default = "default_rule_weight")]
    pub weight: f64,
}

/// A versioned set of rules scored together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePack {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Looks rule packs up by code.
pub trait RulePackSource: Send + Sync {
    fn load(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<RulePack, CollaboratorError>> + Send;
}

// ---------------------------------------------------------------------------
// Data fetch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub source: String,
    /// Parameters with `$.path` references already resolved.
    pub params: Value,
    pub execution_id: String,
}

/// Fetches data (quotes, fundamentals, news...) from a named source.
pub trait DataFetcher: Send + Sync {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send;
}

// ---------------------------------------------------------------------------
// Sub-flow invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SubflowRequest {
    pub flow_code: String,
    pub input: Envelope,
    pub parent_execution_id: String,
    pub user_id: String,
    /// Depth of the child execution (1 for a direct child of a top-level run).
    pub depth: u32,
}

/// Runs a nested workflow graph to completion and returns its output.
pub trait SubflowInvoker: Send + Sync {
    fn invoke(
        &self,
        request: &SubflowRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send;
}

// ---------------------------------------------------------------------------
// Human approval
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub execution_id: String,
    pub node_id: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<String>,
    pub context: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalVerdict {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub verdict: ApprovalVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Waits for a human decision. The executor bounds the wait with a timeout.
pub trait ApprovalGateway: Send + Sync {
    fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> impl Future<Output = Result<ApprovalDecision, CollaboratorError>> + Send;
}
