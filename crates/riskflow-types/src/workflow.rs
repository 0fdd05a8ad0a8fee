//! Workflow graph domain types for riskflow.
//!
//! A workflow version is a directed graph of typed decision nodes. The graph
//! definition itself is owned and versioned by an external store; at execution
//! time these types are read-only inputs to the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Node type catalog
// ---------------------------------------------------------------------------

/// The closed catalog of node types the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    ManualTrigger,
    CronTrigger,
    EventTrigger,
    WebhookTrigger,
    DataFetch,
    RulePackEval,
    SingleAgent,
    DebateRound,
    DecisionMerge,
    Join,
    SubflowCall,
    Approval,
    RiskGate,
}

impl NodeType {
    /// Every node type, in catalog order.
    pub const ALL: [NodeType; 13] = [
        NodeType::ManualTrigger,
        NodeType::CronTrigger,
        NodeType::EventTrigger,
        NodeType::WebhookTrigger,
        NodeType::DataFetch,
        NodeType::RulePackEval,
        NodeType::SingleAgent,
        NodeType::DebateRound,
        NodeType::DecisionMerge,
        NodeType::Join,
        NodeType::SubflowCall,
        NodeType::Approval,
        NodeType::RiskGate,
    ];

    /// Wire name (e.g. `RISK_GATE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::ManualTrigger => "MANUAL_TRIGGER",
            NodeType::CronTrigger => "CRON_TRIGGER",
            NodeType::EventTrigger => "EVENT_TRIGGER",
            NodeType::WebhookTrigger => "WEBHOOK_TRIGGER",
            NodeType::DataFetch => "DATA_FETCH",
            NodeType::RulePackEval => "RULE_PACK_EVAL",
            NodeType::SingleAgent => "SINGLE_AGENT",
            NodeType::DebateRound => "DEBATE_ROUND",
            NodeType::DecisionMerge => "DECISION_MERGE",
            NodeType::Join => "JOIN",
            NodeType::SubflowCall => "SUBFLOW_CALL",
            NodeType::Approval => "APPROVAL",
            NodeType::RiskGate => "RISK_GATE",
        }
    }

    /// Whether this is one of the trigger variants (graph entry points).
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeType::ManualTrigger
                | NodeType::CronTrigger
                | NodeType::EventTrigger
                | NodeType::WebhookTrigger
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace('-', "_");
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("invalid node type: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Workflow node
// ---------------------------------------------------------------------------

fn default_enabled() -> bool {
    true
}

/// A single node of a workflow graph.
///
/// `config` is free-form; each node type documents the keys it accepts and
/// parses them itself at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Node ID, unique within a graph.
    pub id: String,
    /// Node type from the fixed catalog.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Disabled nodes are skipped by the runner (the envelope passes through).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl WorkflowNode {
    /// Create an enabled node with an empty config.
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type,
            enabled: true,
            config: Map::new(),
        }
    }

    /// Builder-style config setter. Non-object values are ignored.
    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    /// Read a config key.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Read a config key as a trimmed, non-empty string.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Workflow graph
// ---------------------------------------------------------------------------

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// One version of a workflow definition, resolved to a node graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Workflow definition ID.
    pub id: String,
    /// Version label of the definition.
    #[serde(default)]
    pub version: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    /// Look up a node by ID.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// IDs of the direct predecessors of `id`, in edge declaration order.
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Execution status
// ---------------------------------------------------------------------------

/// Terminal status of a single node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeExecutionStatus {
    Success,
    Failed,
    /// Recorded by the runner for disabled nodes; never returned by an executor.
    Skipped,
}

impl fmt::Display for NodeExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeExecutionStatus::Success => write!(f, "SUCCESS"),
            NodeExecutionStatus::Failed => write!(f, "FAILED"),
            NodeExecutionStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Overall status of one workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}
