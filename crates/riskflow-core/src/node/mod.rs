//! Node executors: the capability contract, the dispatcher, and one executor
//! per node type.
//!
//! - `box_executor` -- object-safe wrapper so executors can live in one registry
//! - `dispatcher` -- selects the single executor whose `supports` matches
//! - `branch_board` -- per-run store of node outputs (JOIN, DECISION_MERGE)
//! - `risk_gate` -- pass / soft-block / hard-block decisions
//! - `trigger`, `data_fetch`, `rule_pack`, `agent`, `merge`, `join`,
//!   `subflow`, `approval` -- the remaining catalog

pub mod agent;
pub mod approval;
pub mod box_executor;
pub mod branch_board;
pub mod data_fetch;
pub mod dispatcher;
pub mod join;
pub mod merge;
pub mod risk_gate;
pub mod rule_pack;
pub mod subflow;
pub mod trigger;

use std::sync::Arc;

use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{NodeExecutionStatus, NodeType, WorkflowNode};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use box_executor::BoxNodeExecutor;
pub use branch_board::BranchBoard;
pub use dispatcher::NodeDispatcher;

// ---------------------------------------------------------------------------
// NodeError
// ---------------------------------------------------------------------------

/// Configuration-class failures. Always fatal to the node, never retried here.
///
/// Business outcomes (a blocked gate, a rejected approval, a failing
/// collaborator) are not errors: they come back as a FAILED
/// [`NodeExecutionResult`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("no executor supports node '{node_id}' of type {node_type}")]
    UnsupportedNodeType { node_id: String, node_type: NodeType },

    #[error("{matches} executors support node '{node_id}' of type {node_type}")]
    AmbiguousNodeExecutor {
        node_id: String,
        node_type: NodeType,
        matches: usize,
    },

    #[error("risk gate '{node_id}' has no riskProfileCode")]
    MissingRiskProfileCode { node_id: String },

    #[error("invalid config for node '{node_id}': {reason}")]
    InvalidConfig { node_id: String, reason: String },

    #[error("sub-flow depth {depth} exceeds maximum {max}")]
    SubflowDepthExceeded { depth: u32, max: u32 },
}

impl NodeError {
    pub(crate) fn invalid_config(node: &WorkflowNode, reason: impl Into<String>) -> Self {
        NodeError::InvalidConfig {
            node_id: node.id.clone(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Context and result
// ---------------------------------------------------------------------------

/// Everything a node invocation may read. Created fresh for each node.
#[derive(Debug, Clone)]
pub struct NodeExecutionContext {
    pub execution_id: String,
    /// User who triggered the execution.
    pub user_id: String,
    pub node: WorkflowNode,
    /// The envelope produced by the previous node.
    pub input: Envelope,
    /// Resolved runtime parameters, possibly wrapped as `{params|parameters|values|resolvedParams: ..}`.
    pub parameter_snapshot: Option<Value>,
    /// Outputs of nodes that already ran in this execution.
    pub branches: Arc<BranchBoard>,
    /// 0 for a top-level execution.
    pub subflow_depth: u32,
}

impl NodeExecutionContext {
    pub fn new(
        execution_id: impl Into<String>,
        user_id: impl Into<String>,
        node: WorkflowNode,
        input: Envelope,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            user_id: user_id.into(),
            node,
            input,
            parameter_snapshot: None,
            branches: Arc::new(BranchBoard::new()),
            subflow_depth: 0,
        }
    }

    pub fn with_parameter_snapshot(mut self, snapshot: Option<Value>) -> Self {
        self.parameter_snapshot = snapshot;
        self
    }

    pub fn with_branches(mut self, branches: Arc<BranchBoard>) -> Self {
        self.branches = branches;
        self
    }

    pub fn with_subflow_depth(mut self, depth: u32) -> Self {
        self.subflow_depth = depth;
        self
    }

    /// Deserialize the node config into a typed schema.
    pub(crate) fn typed_config<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        serde_json::from_value(Value::Object(self.node.config.clone()))
            .map_err(|e| NodeError::invalid_config(&self.node, e.to_string()))
    }
}

/// Outcome of one node invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeExecutionResult {
    pub status: NodeExecutionStatus,
    pub message: Option<String>,
    pub output: Envelope,
}

impl NodeExecutionResult {
    pub fn success(output: Envelope) -> Self {
        Self {
            status: NodeExecutionStatus::Success,
            message: None,
            output,
        }
    }

    pub fn failed(message: impl Into<String>, output: Envelope) -> Self {
        Self {
            status: NodeExecutionStatus::Failed,
            message: Some(message.into()),
            output,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeExecutionStatus::Success
    }
}

// ---------------------------------------------------------------------------
// NodeExecutor trait
// ---------------------------------------------------------------------------

/// Capability contract implemented by every node type.
///
/// Uses RPITIT for `execute`; see [`BoxNodeExecutor`] for dynamic dispatch.
pub trait NodeExecutor: Send + Sync {
    /// Short executor name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Pure predicate over the node's shape.
    fn supports(&self, node: &WorkflowNode) -> bool;

    /// Run the node. May suspend on an external collaborator.
    fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> impl std::future::Future<Output = Result<NodeExecutionResult, NodeError>> + Send;
}
