//! Graph runner: advances one workflow graph per invocation.
//!
//! Nodes run sequentially in dependency order; each node's output envelope
//! is the next node's input. Every output is also published to a per-run
//! [`BranchBoard`] for JOIN and DECISION_MERGE.
//!
//! # Run flow
//!
//! 1. Validate the graph and compute the order via [`plan::execution_order`].
//! 2. For each node: skip when disabled, otherwise dispatch with the
//!    per-node timeout, racing the caller's cancellation token.
//! 3. Stop at the first FAILED result, configuration error, timeout or
//!    cancellation.

pub mod plan;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use riskflow_types::analytics::{NodeExecutionRecord, WorkflowExecutionRecord};
use riskflow_types::config::EngineConfig;
use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{
    ExecutionStatus, NodeExecutionStatus, NodeType, WorkflowGraph, WorkflowNode,
};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::node::{BranchBoard, NodeDispatcher, NodeError, NodeExecutionContext};

pub use plan::{execution_order, execution_waves, GraphError};

// ---------------------------------------------------------------------------
// Request / outcome types
// ---------------------------------------------------------------------------

/// Input for one graph run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub execution_id: String,
    pub user_id: String,
    pub input: Envelope,
    pub parameter_snapshot: Option<Value>,
    pub subflow_depth: u32,
}

impl RunRequest {
    /// A top-level run with a fresh UUIDv7 execution id.
    pub fn new(user_id: impl Into<String>, input: Envelope) -> Self {
        Self {
            execution_id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            input,
            parameter_snapshot: None,
            subflow_depth: 0,
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    pub fn with_parameter_snapshot(mut self, snapshot: Option<Value>) -> Self {
        self.parameter_snapshot = snapshot;
        self
    }

    pub fn with_subflow_depth(mut self, depth: u32) -> Self {
        self.subflow_depth = depth;
        self
    }
}

/// Why a run failed. Recorded on the execution history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    /// A node had unusable configuration or no executor.
    Configuration,
    /// A hard-blocking risk gate stopped the run.
    RiskBlocked,
    /// A node returned FAILED (collaborator error, rejection, join timeout...).
    NodeFailed,
    /// A node exceeded the engine's per-node timeout.
    Timeout,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Configuration => "CONFIGURATION",
            FailureCategory::RiskBlocked => "RISK_BLOCKED",
            FailureCategory::NodeFailed => "NODE_FAILED",
            FailureCategory::Timeout => "TIMEOUT",
        }
    }
}

/// One node's attempt within a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunRecord {
    pub node_id: String,
    pub node_type: NodeType,
    pub status: NodeExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Result of a whole graph run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRunOutcome {
    pub execution_id: String,
    pub graph_id: String,
    pub status: ExecutionStatus,
    /// Envelope after the last node that produced one.
    pub output: Envelope,
    pub node_runs: Vec<NodeRunRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_category: Option<FailureCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl GraphRunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Execution history record for the analytics aggregator.
    pub fn execution_record(&self, owner_id: Option<&str>) -> WorkflowExecutionRecord {
        WorkflowExecutionRecord {
            id: self.execution_id.clone(),
            workflow_definition_id: self.graph_id.clone(),
            owner_id: owner_id.map(str::to_string),
            status: self.status,
            started_at: Some(self.started_at),
            completed_at: Some(self.completed_at),
            failure_category: self.failure_category.map(|c| c.as_str().to_string()),
            error_message: self.error.clone(),
        }
    }

    /// Node history records for the analytics aggregator. Skipped nodes are left out.
    pub fn node_records(&self) -> Vec<NodeExecutionRecord> {
        self.node_runs
            .iter()
            .filter(|r| r.status != NodeExecutionStatus::Skipped)
            .map(|r| NodeExecutionRecord {
                execution_id: self.execution_id.clone(),
                node_id: r.node_id.clone(),
                node_type: r.node_type.as_str().to_string(),
                status: r.status,
                duration_ms: Some(r.duration_ms),
                started_at: Some(r.started_at),
                completed_at: Some(r.completed_at),
                error_message: r.message.clone().filter(|_| r.status == NodeExecutionStatus::Failed),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

enum Step {
    Finished(Result<crate::node::NodeExecutionResult, NodeError>),
    TimedOut,
    Canceled,
}

/// Runs workflow graphs through a [`NodeDispatcher`].
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    dispatcher: Arc<NodeDispatcher>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(dispatcher: Arc<NodeDispatcher>, config: EngineConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn dispatcher(&self) -> &NodeDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `graph` to completion, failure or cancellation.
    ///
    /// Only an invalid graph is an `Err`; node failures are reported on the
    /// returned outcome.
    pub async fn run(
        &self,
        graph: &WorkflowGraph,
        request: RunRequest,
        cancel: &CancellationToken,
    ) -> Result<GraphRunOutcome, GraphError> {
        let order = execution_order(graph)?;
        let span = tracing::info_span!(
            "graph_run",
            execution_id = request.execution_id.as_str(),
            graph_id = graph.id.as_str(),
        );
        Ok(self.run_ordered(graph, &order, request, cancel).instrument(span).await)
    }

    async fn run_ordered(
        &self,
        graph: &WorkflowGraph,
        order: &[&WorkflowNode],
        request: RunRequest,
        cancel: &CancellationToken,
    ) -> GraphRunOutcome {
        let started_at = Utc::now();
        let board = Arc::new(BranchBoard::new());
        let node_timeout = Duration::from_secs(self.config.node_timeout_secs);

        let mut envelope = request.input.clone();
        let mut node_runs = Vec::with_capacity(order.len());
        let mut status = ExecutionStatus::Success;
        let mut failure_category = None;
        let mut error = None;

        tracing::info!(nodes = order.len(), "graph run started");

        for node in order {
            if !node.enabled {
                tracing::debug!(node_id = node.id.as_str(), "skipping disabled node");
                let now = Utc::now();
                node_runs.push(NodeRunRecord {
                    node_id: node.id.clone(),
                    node_type: node.node_type,
                    status: NodeExecutionStatus::Skipped,
                    message: Some("node disabled".to_string()),
                    started_at: now,
                    completed_at: now,
                    duration_ms: 0,
                });
                continue;
            }

            if cancel.is_cancelled() {
                status = ExecutionStatus::Canceled;
                error = Some(format!("execution canceled before node '{}'", node.id));
                break;
            }

            let ctx = NodeExecutionContext::new(
                request.execution_id.clone(),
                request.user_id.clone(),
                (*node).clone(),
                envelope.clone(),
            )
            .with_parameter_snapshot(request.parameter_snapshot.clone())
            .with_branches(Arc::clone(&board))
            .with_subflow_depth(request.subflow_depth);

            let node_started = Utc::now();
            let clock = Instant::now();
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Canceled,
                r = tokio::time::timeout(node_timeout, self.dispatcher.dispatch(&ctx)) => match r {
                    Ok(result) => Step::Finished(result),
                    Err(_) => Step::TimedOut,
                },
            };
            let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
            let mut record = NodeRunRecord {
                node_id: node.id.clone(),
                node_type: node.node_type,
                status: NodeExecutionStatus::Failed,
                message: None,
                started_at: node_started,
                completed_at: Utc::now(),
                duration_ms,
            };

            match step {
                Step::Finished(Ok(result)) => {
                    let succeeded = result.is_success();
                    record.status = result.status;
                    record.message = result.message.clone();
                    node_runs.push(record);
                    board.publish(node.id.clone(), result.output.clone());
                    envelope = result.output;

                    if !succeeded {
                        let category = if node.node_type == NodeType::RiskGate
                            && envelope.get("riskGateBlocked") == Some(&Value::Bool(true))
                        {
                            FailureCategory::RiskBlocked
                        } else {
                            FailureCategory::NodeFailed
                        };
                        tracing::warn!(
                            node_id = node.id.as_str(),
                            category = category.as_str(),
                            message = result.message.as_deref().unwrap_or(""),
                            "node failed, halting run"
                        );
                        status = ExecutionStatus::Failed;
                        failure_category = Some(category);
                        error = Some(format!(
                            "node '{}' failed: {}",
                            node.id,
                            result.message.as_deref().unwrap_or("no message")
                        ));
                        break;
                    }
                }
                Step::Finished(Err(e)) => {
                    tracing::warn!(node_id = node.id.as_str(), error = %e, "node configuration error");
                    record.message = Some(e.to_string());
                    node_runs.push(record);
                    status = ExecutionStatus::Failed;
                    failure_category = Some(FailureCategory::Configuration);
                    error = Some(e.to_string());
                    break;
                }
                Step::TimedOut => {
                    let message = format!(
                        "node '{}' timed out after {} s",
                        node.id, self.config.node_timeout_secs
                    );
                    tracing::warn!(node_id = node.id.as_str(), "node timed out");
                    record.message = Some(message.clone());
                    node_runs.push(record);
                    status = ExecutionStatus::Failed;
                    failure_category = Some(FailureCategory::Timeout);
                    error = Some(message);
                    break;
                }
                Step::Canceled => {
                    tracing::info!(node_id = node.id.as_str(), "execution canceled");
                    status = ExecutionStatus::Canceled;
                    error = Some(format!("execution canceled during node '{}'", node.id));
                    break;
                }
            }
        }

        let completed_at = Utc::now();
        tracing::info!(
            status = %status,
            nodes_run = node_runs.len(),
            duration_ms = (completed_at - started_at).num_milliseconds(),
            "graph run finished"
        );

        GraphRunOutcome {
            execution_id: request.execution_id,
            graph_id: graph.id.clone(),
            status,
            output: envelope,
            node_runs,
            failure_category,
            error,
            started_at,
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{ApprovalDecision, ApprovalVerdict};
    use crate::testing::{standard_dispatcher, standard_dispatcher_with, FakeCollaborators};
    use riskflow_types::workflow::GraphEdge;
    use serde_json::json;

    fn node(id: &str, node_type: NodeType, config: Value) -> WorkflowNode {
        WorkflowNode::new(id, node_type).with_config(config)
    }

    fn chain(id: &str, nodes: Vec<WorkflowNode>) -> WorkflowGraph {
        let edges = nodes
            .windows(2)
            .map(|w| GraphEdge {
                from: w[0].id.clone(),
                to: w[1].id.clone(),
            })
            .collect();
        WorkflowGraph {
            id: id.into(),
            version: "1".into(),
            nodes,
            edges,
        }
    }

    fn engine(fakes: FakeCollaborators) -> WorkflowEngine {
        WorkflowEngine::new(Arc::new(standard_dispatcher(fakes)), EngineConfig::default())
    }

    fn signal_graph(hard_block: bool) -> WorkflowGraph {
        chain(
            "signal",
            vec![
                node("trigger", NodeType::ManualTrigger, json!({})),
                node("analyst", NodeType::SingleAgent, json!({ "agentCode": "analyst" })),
                node(
                    "gate",
                    NodeType::RiskGate,
                    json!({ "riskProfileCode": "default", "hardBlock": hard_block, "degradeAction": "HOLD" }),
                ),
            ],
        )
    }

    #[tokio::test]
    async fn test_envelope_threads_through_nodes() {
        let fakes = FakeCollaborators::default()
            .with_agent("analyst", json!({ "decision": "BUY", "confidence": 85 }));
        let outcome = engine(fakes)
            .run(
                &signal_graph(true),
                RunRequest::new("u1", Envelope::from_value(json!({ "symbol": "600519" }))),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.node_runs.len(), 3);
        let out = &outcome.output;
        assert_eq!(out.get("symbol"), Some(&json!("600519")));
        assert_eq!(out.get("decision"), Some(&json!("BUY")));
        // confidence 85 -> LOW
        assert_eq!(out.get("riskLevel"), Some(&json!("LOW")));
        assert_eq!(out.get("riskGatePassed"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_hard_block_halts_run() {
        let fakes = FakeCollaborators::default().with_agent("analyst", json!({ "confidence": 20 }));
        let outcome = engine(fakes)
            .run(&signal_graph(true), RunRequest::new("u1", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.failure_category, Some(FailureCategory::RiskBlocked));
        assert_eq!(outcome.output.get("degradeAction"), Some(&json!("HOLD")));

        let record = outcome.execution_record(Some("owner"));
        assert_eq!(record.failure_category.as_deref(), Some("RISK_BLOCKED"));
        assert_eq!(record.workflow_definition_id, "signal");
    }

    #[tokio::test]
    async fn test_soft_block_continues() {
        let fakes = FakeCollaborators::default().with_agent("analyst", json!({ "confidence": 20 }));
        let outcome = engine(fakes)
            .run(&signal_graph(false), RunRequest::new("u1", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.output.get("riskGateBlocked"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_config_error_is_categorized() {
        let graph = chain("g", vec![node("gate", NodeType::RiskGate, json!({}))]);
        let outcome = engine(FakeCollaborators::default())
            .run(&graph, RunRequest::new("u", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.failure_category, Some(FailureCategory::Configuration));
        assert!(outcome.error.unwrap().contains("riskProfileCode"));
    }

    #[tokio::test]
    async fn test_disabled_nodes_are_skipped() {
        let mut gate = node("gate", NodeType::RiskGate, json!({}));
        gate.enabled = false;
        let graph = chain("g", vec![node("t", NodeType::ManualTrigger, json!({})), gate]);
        let outcome = engine(FakeCollaborators::default())
            .run(&graph, RunRequest::new("u", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.node_runs[1].status, NodeExecutionStatus::Skipped);
        assert_eq!(outcome.node_records().len(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_and_merge() {
        let fakes = FakeCollaborators::default()
            .with_agent("bull", json!({ "decision": "BUY", "confidence": 90 }))
            .with_agent("bear", json!({ "decision": "SELL", "confidence": 40 }));
        let graph = WorkflowGraph {
            id: "fan".into(),
            version: "1".into(),
            nodes: vec![
                node("t", NodeType::ManualTrigger, json!({})),
                node("bull", NodeType::SingleAgent, json!({ "agentCode": "bull", "outputKey": "bullView" })),
                node("bear", NodeType::SingleAgent, json!({ "agentCode": "bear" })),
                node("join", NodeType::Join, json!({ "branches": ["bull", "bear"] })),
                node("merge", NodeType::DecisionMerge, json!({ "sources": ["bear", "t"] })),
            ],
            edges: vec![
                GraphEdge { from: "t".into(), to: "bull".into() },
                GraphEdge { from: "t".into(), to: "bear".into() },
                GraphEdge { from: "bull".into(), to: "join".into() },
                GraphEdge { from: "bear".into(), to: "join".into() },
                GraphEdge { from: "join".into(), to: "merge".into() },
            ],
        };
        let outcome = engine(fakes)
            .run(&graph, RunRequest::new("u", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.output.get("joinedBranches"), Some(&json!(["bull", "bear"])));
        assert_eq!(outcome.output.get("mergedDecision"), Some(&json!("SELL")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_pending_approval() {
        let graph = chain(
            "g",
            vec![
                node("t", NodeType::ManualTrigger, json!({})),
                node("approve", NodeType::Approval, json!({})),
            ],
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let outcome = engine(FakeCollaborators::default())
            .run(&graph, RunRequest::new("u", Envelope::new()), &token)
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Canceled);
        assert_eq!(outcome.node_runs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_timeout() {
        let config = EngineConfig {
            node_timeout_secs: 2,
            ..EngineConfig::default()
        };
        let engine = WorkflowEngine::new(
            Arc::new(standard_dispatcher_with(FakeCollaborators::default(), &config)),
            config,
        );
        let graph = chain("g", vec![node("approve", NodeType::Approval, json!({ "timeoutSecs": 60 }))]);
        let outcome = engine
            .run(&graph, RunRequest::new("u", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.failure_category, Some(FailureCategory::Timeout));
    }

    #[tokio::test]
    async fn test_approved_run_records_nodes() {
        let fakes = FakeCollaborators::default().with_approval(
            "approve",
            ApprovalDecision {
                verdict: ApprovalVerdict::Approved,
                decided_by: Some("desk".into()),
                comment: None,
            },
        );
        let graph = chain("g", vec![node("approve", NodeType::Approval, json!({}))]);
        let outcome = engine(fakes)
            .run(
                &graph,
                RunRequest::new("u", Envelope::new()).with_execution_id("exec-42"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let records = outcome.node_records();
        assert_eq!(records[0].execution_id, "exec-42");
        assert_eq!(records[0].node_type, "APPROVAL");
        assert_eq!(records[0].status, NodeExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_invalid_graph_is_err() {
        let graph = WorkflowGraph {
            id: "empty".into(),
            version: String::new(),
            nodes: vec![],
            edges: vec![],
        };
        let err = engine(FakeCollaborators::default())
            .run(&graph, RunRequest::new("u", Envelope::new()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::EmptyGraph("empty".into()));
    }
}
