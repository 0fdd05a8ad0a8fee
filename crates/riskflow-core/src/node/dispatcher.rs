//! Node dispatcher: picks the one executor that supports a node and runs it.

use std::sync::Arc;

use riskflow_types::config::EngineConfig;
use riskflow_types::workflow::WorkflowNode;

use super::agent::{DebateRoundExecutor, SingleAgentExecutor};
use super::approval::ApprovalExecutor;
use super::data_fetch::DataFetchExecutor;
use super::join::JoinExecutor;
use super::merge::DecisionMergeExecutor;
use super::risk_gate::RiskGateExecutor;
use super::rule_pack::RulePackEvalExecutor;
use super::subflow::SubflowCallExecutor;
use super::trigger::TriggerExecutor;
use super::{BoxNodeExecutor, NodeError, NodeExecutionContext, NodeExecutionResult, NodeExecutor};
use crate::collaborator::{
    AgentInvoker, ApprovalGateway, DataFetcher, RulePackSource, SubflowInvoker,
};

/// The external collaborators the standard executors call.
pub struct Collaborators<A, R, F, S, P> {
    pub agents: Arc<A>,
    pub rule_packs: Arc<R>,
    pub data: Arc<F>,
    pub subflows: Arc<S>,
    pub approvals: Arc<P>,
}

/// Holds every registered executor and routes nodes to them.
#[derive(Debug, Default)]
pub struct NodeDispatcher {
    executors: Vec<BoxNodeExecutor>,
}

impl NodeDispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self {
            executors: Vec::new(),
        }
    }

    /// A dispatcher with one executor for every node type in the catalog.
    pub fn standard<A, R, F, S, P>(
        collaborators: Collaborators<A, R, F, S, P>,
        config: &EngineConfig,
    ) -> Self
    where
        A: AgentInvoker + 'static,
        R: RulePackSource + 'static,
        F: DataFetcher + 'static,
        S: SubflowInvoker + 'static,
        P: ApprovalGateway + 'static,
    {
        let mut dispatcher = Self::new();
        dispatcher.register(TriggerExecutor);
        dispatcher.register(DataFetchExecutor::new(collaborators.data));
        dispatcher.register(RulePackEvalExecutor::new(collaborators.rule_packs));
        dispatcher.register(SingleAgentExecutor::new(Arc::clone(&collaborators.agents)));
        dispatcher.register(DebateRoundExecutor::new(collaborators.agents));
        dispatcher.register(DecisionMergeExecutor);
        dispatcher.register(JoinExecutor::new(config.join_timeout_ms));
        dispatcher.register(SubflowCallExecutor::new(
            collaborators.subflows,
            config.max_subflow_depth,
        ));
        dispatcher.register(ApprovalExecutor::new(
            collaborators.approvals,
            config.approval_timeout_secs,
        ));
        dispatcher.register(RiskGateExecutor::new());
        dispatcher
    }

    /// Add an executor.
    pub fn register<T: NodeExecutor + 'static>(&mut self, executor: T) {
        self.executors.push(BoxNodeExecutor::new(executor));
    }

    /// Names of all registered executors, in registration order.
    pub fn executor_names(&self) -> Vec<&'static str> {
        self.executors.iter().map(|e| e.name()).collect()
    }

    /// The single executor supporting `node`.
    pub fn resolve(&self, node: &WorkflowNode) -> Result<&BoxNodeExecutor, NodeError> {
        let mut matching = self.executors.iter().filter(|e| e.supports(node));
        let Some(first) = matching.next() else {
            return Err(NodeError::UnsupportedNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type,
            });
        };
        let extra = matching.count();
        if extra > 0 {
            return Err(NodeError::AmbiguousNodeExecutor {
                node_id: node.id.clone(),
                node_type: node.node_type,
                matches: extra + 1,
            });
        }
        Ok(first)
    }

    /// Resolve and run the executor for `ctx.node`.
    pub async fn dispatch(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, NodeError> {
        let executor = self.resolve(&ctx.node)?;
        tracing::debug!(
            execution_id = ctx.execution_id.as_str(),
            node_id = ctx.node.id.as_str(),
            node_type = %ctx.node.node_type,
            executor = executor.name(),
            "dispatching node"
        );
        executor.execute(ctx).await
    }
}
