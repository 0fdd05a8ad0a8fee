//! Static, file-backed collaborators.
//!
//! Every port answers from a JSON document loaded up front:
//!
//! ```json
//! {
//!   "agents":      { "analyst": { "decision": "BUY", "confidence": 72 } },
//!   "dataSources": { "quotes": { "$error": { "unavailable": "feed down" } } },
//!   "subflows":    { "hedge": { "hedgeRatio": 0.4 } },
//!   "rulePacks":   [ { "code": "momentum", "rules": [] } ],
//!   "approvals":   { "approve-1": { "verdict": "APPROVED", "decidedBy": "desk" } }
//! }
//! ```
//!
//! A `{"$error": ..}` reply simulates a collaborator failure. An APPROVAL
//! node with no entry stays pending until the executor's timeout fires.

use std::collections::HashMap;
use std::future::Future;

use riskflow_types::error::CollaboratorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    AgentInvoker, AgentRequest, ApprovalDecision, ApprovalGateway, ApprovalRequest, DataFetcher,
    FetchRequest, RulePack, RulePackSource, SubflowInvoker, SubflowRequest,
};

/// A canned collaborator answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureReply {
    Error {
        #[serde(rename = "$error")]
        error: CollaboratorError,
    },
    Value(Value),
}

impl FixtureReply {
    fn into_result(self) -> Result<Value, CollaboratorError> {
        match self {
            FixtureReply::Error { error } => Err(error),
            FixtureReply::Value(value) => Ok(value),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureCollaborators {
    #[serde(default)]
    pub agents: HashMap<String, FixtureReply>,
    #[serde(default)]
    pub data_sources: HashMap<String, FixtureReply>,
    #[serde(default)]
    pub subflows: HashMap<String, FixtureReply>,
    #[serde(default)]
    pub rule_packs: Vec<RulePack>,
    /// Keyed by APPROVAL node id.
    #[serde(default)]
    pub approvals: HashMap<String, ApprovalDecision>,
}

impl FixtureCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    fn reply(
        table: &HashMap<String, FixtureReply>,
        kind: &str,
        key: &str,
    ) -> Result<Value, CollaboratorError> {
        table
            .get(key)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("{kind} '{key}'")))?
            .into_result()
    }
}

impl AgentInvoker for FixtureCollaborators {
    fn invoke(
        &self,
        request: &AgentRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send {
        let result = Self::reply(&self.agents, "agent", &request.agent_code);
        async move { result }
    }
}

impl DataFetcher for FixtureCollaborators {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send {
        let result = Self::reply(&self.data_sources, "data source", &request.source);
        async move { result }
    }
}

impl SubflowInvoker for FixtureCollaborators {
    fn invoke(
        &self,
        request: &SubflowRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send {
        let result = Self::reply(&self.subflows, "sub-flow", &request.flow_code);
        async move { result }
    }
}

impl RulePackSource for FixtureCollaborators {
    fn load(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<RulePack, CollaboratorError>> + Send {
        let result = self
            .rule_packs
            .iter()
            .find(|p| p.code == code)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("rule pack '{code}'")));
        async move { result }
    }
}

impl ApprovalGateway for FixtureCollaborators {
    fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> impl Future<Output = Result<ApprovalDecision, CollaboratorError>> + Send {
        let decision = self.approvals.get(&request.node_id).cloned();
        async move {
            match decision {
                Some(decision) => Ok(decision),
                None => std::future::pending().await,
            }
        }
    }
}
