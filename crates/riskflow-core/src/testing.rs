//! In-memory collaborator fakes for unit tests.
//!
//! `FakeCollaborators` answers from a [`FixtureCollaborators`] and records
//! every request it receives. Clones share the same state.

use std::future::Future;
use std::sync::{Arc, Mutex};

use riskflow_types::config::EngineConfig;
use riskflow_types::error::CollaboratorError;
use serde_json::Value;

use crate::collaborator::fixture::{FixtureCollaborators, FixtureReply};
use crate::collaborator::{
    AgentInvoker, AgentRequest, ApprovalDecision, ApprovalGateway, ApprovalRequest, DataFetcher,
    FetchRequest, RulePack, RulePackSource, SubflowInvoker, SubflowRequest,
};
use crate::node::dispatcher::Collaborators;
use crate::node::NodeDispatcher;

#[derive(Debug, Default)]
struct Recorded {
    agent_calls: Vec<AgentRequest>,
    fetches: Vec<FetchRequest>,
    subflow_calls: Vec<SubflowRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeCollaborators {
    fixture: FixtureCollaborators,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeCollaborators {
    pub fn with_agent(mut self, code: &str, answer: Value) -> Self {
        self.fixture.agents.insert(code.to_string(), FixtureReply::Value(answer));
        self
    }

    pub fn with_agent_error(mut self, code: &str, error: CollaboratorError) -> Self {
        self.fixture.agents.insert(code.to_string(), FixtureReply::Error { error });
        self
    }

    pub fn with_data(mut self, source: &str, data: Value) -> Self {
        self.fixture.data_sources.insert(source.to_string(), FixtureReply::Value(data));
        self
    }

    pub fn with_data_error(mut self, source: &str, error: CollaboratorError) -> Self {
        self.fixture.data_sources.insert(source.to_string(), FixtureReply::Error { error });
        self
    }

    pub fn with_subflow(mut self, flow_code: &str, output: Value) -> Self {
        self.fixture.subflows.insert(flow_code.to_string(), FixtureReply::Value(output));
        self
    }

    pub fn with_subflow_error(mut self, flow_code: &str, error: CollaboratorError) -> Self {
        self.fixture.subflows.insert(flow_code.to_string(), FixtureReply::Error { error });
        self
    }

    pub fn with_rule_pack(mut self, pack: RulePack) -> Self {
        self.fixture.rule_packs.push(pack);
        self
    }

    pub fn with_approval(mut self, node_id: &str, decision: ApprovalDecision) -> Self {
        self.fixture.approvals.insert(node_id.to_string(), decision);
        self
    }

    pub fn agent_calls(&self) -> Vec<AgentRequest> {
        self.recorded.lock().unwrap().agent_calls.clone()
    }

    pub fn fetch_params(&self) -> Vec<Value> {
        self.recorded
            .lock()
            .unwrap()
            .fetches
            .iter()
            .map(|f| f.params.clone())
            .collect()
    }

    pub fn subflow_calls(&self) -> Vec<SubflowRequest> {
        self.recorded.lock().unwrap().subflow_calls.clone()
    }
}

impl AgentInvoker for FakeCollaborators {
    fn invoke(
        &self,
        request: &AgentRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send {
        self.recorded.lock().unwrap().agent_calls.push(request.clone());
        AgentInvoker::invoke(&self.fixture, request)
    }
}

impl DataFetcher for FakeCollaborators {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send {
        self.recorded.lock().unwrap().fetches.push(request.clone());
        self.fixture.fetch(request)
    }
}

impl SubflowInvoker for FakeCollaborators {
    fn invoke(
        &self,
        request: &SubflowRequest,
    ) -> impl Future<Output = Result<Value, CollaboratorError>> + Send {
        self.recorded.lock().unwrap().subflow_calls.push(request.clone());
        SubflowInvoker::invoke(&self.fixture, request)
    }
}

impl RulePackSource for FakeCollaborators {
    fn load(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<RulePack, CollaboratorError>> + Send {
        self.fixture.load(code)
    }
}

impl ApprovalGateway for FakeCollaborators {
    fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> impl Future<Output = Result<ApprovalDecision, CollaboratorError>> + Send {
        self.fixture.request_approval(request)
    }
}

/// The standard dispatcher wired to one shared set of fakes.
pub fn standard_dispatcher(fakes: FakeCollaborators) -> NodeDispatcher {
    standard_dispatcher_with(fakes, &EngineConfig::default())
}

pub fn standard_dispatcher_with(fakes: FakeCollaborators, config: &EngineConfig) -> NodeDispatcher {
    let shared = Arc::new(fakes);
    NodeDispatcher::standard(
        Collaborators {
            agents: Arc::clone(&shared),
            rule_packs: Arc::clone(&shared),
            data: Arc::clone(&shared),
            subflows: Arc::clone(&shared),
            approvals: shared,
        },
        config,
    )
}
