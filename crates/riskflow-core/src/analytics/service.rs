//! Analytics service: fetch history once, aggregate four ways.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use riskflow_types::analytics::{
    AnalyticsQuery, AnalyticsReport, NodeExecutionRecord, WorkflowExecutionRecord,
};
use riskflow_types::error::CollaboratorError;

use super::aggregate::{
    self, DEFAULT_TOP_SLOW_NODES, duration_distribution, execution_trend, failure_categories,
};

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("execution history unavailable: {0}")]
    History(#[from] CollaboratorError),
}

/// Port for the execution store. Implementations apply the query filters.
pub trait ExecutionHistorySource: Send + Sync {
    fn executions(
        &self,
        query: &AnalyticsQuery,
    ) -> impl Future<Output = Result<Vec<WorkflowExecutionRecord>, CollaboratorError>> + Send;

    fn node_executions(
        &self,
        query: &AnalyticsQuery,
    ) -> impl Future<Output = Result<Vec<NodeExecutionRecord>, CollaboratorError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemoryHistory
// ---------------------------------------------------------------------------

/// History held in memory, typically loaded from exported JSON files.
///
/// Date bounds are inclusive and apply to `startedAt`; a record without a
/// start time is dropped once either bound is set. Node records follow their
/// parent execution when it is known, otherwise only the date bounds apply.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    executions: Vec<WorkflowExecutionRecord>,
    nodes: Vec<NodeExecutionRecord>,
}

impl InMemoryHistory {
    pub fn new(executions: Vec<WorkflowExecutionRecord>, nodes: Vec<NodeExecutionRecord>) -> Self {
        Self { executions, nodes }
    }

    fn in_range(query: &AnalyticsQuery, started_at: Option<DateTime<Utc>>) -> bool {
        if query.start.is_none() && query.end.is_none() {
            return true;
        }
        let Some(ts) = started_at else {
            return false;
        };
        query.start.is_none_or(|start| ts >= start) && query.end.is_none_or(|end| ts <= end)
    }

    fn matches(query: &AnalyticsQuery, record: &WorkflowExecutionRecord) -> bool {
        let owner_ok = match (&query.owner_id, &record.owner_id) {
            (None, _) => true,
            (Some(wanted), Some(owner)) => wanted == owner,
            (Some(_), None) => false,
        };
        let workflow_ok = query
            .workflow_definition_id
            .as_ref()
            .is_none_or(|wanted| *wanted == record.workflow_definition_id);
        owner_ok && workflow_ok && Self::in_range(query, record.started_at)
    }

    fn filter_executions(&self, query: &AnalyticsQuery) -> Vec<WorkflowExecutionRecord> {
        self.executions
            .iter()
            .filter(|r| Self::matches(query, r))
            .cloned()
            .collect()
    }

    fn filter_nodes(&self, query: &AnalyticsQuery) -> Vec<NodeExecutionRecord> {
        let parents: HashMap<&str, bool> = self
            .executions
            .iter()
            .map(|r| (r.id.as_str(), Self::matches(query, r)))
            .collect();
        self.nodes
            .iter()
            .filter(|n| match parents.get(n.execution_id.as_str()) {
                Some(keep) => *keep,
                None => Self::in_range(query, n.started_at),
            })
            .cloned()
            .collect()
    }
}

impl ExecutionHistorySource for InMemoryHistory {
    fn executions(
        &self,
        query: &AnalyticsQuery,
    ) -> impl Future<Output = Result<Vec<WorkflowExecutionRecord>, CollaboratorError>> + Send {
        let records = self.filter_executions(query);
        async move { Ok(records) }
    }

    fn node_executions(
        &self,
        query: &AnalyticsQuery,
    ) -> impl Future<Output = Result<Vec<NodeExecutionRecord>, CollaboratorError>> + Send {
        let records = self.filter_nodes(query);
        async move { Ok(records) }
    }
}

// ---------------------------------------------------------------------------
// AnalyticsService
// ---------------------------------------------------------------------------

pub struct AnalyticsService<S: ExecutionHistorySource> {
    source: S,
    top_slow_nodes: usize,
}

impl<S: ExecutionHistorySource> AnalyticsService<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            top_slow_nodes: DEFAULT_TOP_SLOW_NODES,
        }
    }

    pub fn with_top_slow_nodes(mut self, top_slow_nodes: usize) -> Self {
        self.top_slow_nodes = top_slow_nodes;
        self
    }

    /// Build the full report for one query.
    ///
    /// Both record sets are fetched concurrently, then the four aggregations
    /// run concurrently over the same snapshot.
    pub async fn report(&self, query: &AnalyticsQuery) -> Result<AnalyticsReport, AnalyticsError> {
        let (executions, nodes) = tokio::try_join!(
            self.source.executions(query),
            self.source.node_executions(query),
        )?;

        tracing::debug!(
            executions = executions.len(),
            node_executions = nodes.len(),
            granularity = %query.granularity,
            "Aggregating execution analytics"
        );

        let granularity = query.granularity;
        let top_n = self.top_slow_nodes;
        let (trend, durations, failures, node_performance) = tokio::join!(
            async { execution_trend(&executions, granularity) },
            async { duration_distribution(&executions) },
            async { failure_categories(&executions) },
            async { aggregate::node_performance(&nodes, top_n) },
        );

        Ok(AnalyticsReport {
            trend,
            duration_distribution: durations,
            failure_categories: failures,
            node_performance,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use riskflow_types::analytics::TrendGranularity;
    use riskflow_types::workflow::{ExecutionStatus, NodeExecutionStatus};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap()
    }

    fn exec(id: &str, owner: &str, workflow: &str, status: ExecutionStatus, day: u32) -> WorkflowExecutionRecord {
        WorkflowExecutionRecord {
            id: id.into(),
            workflow_definition_id: workflow.into(),
            owner_id: Some(owner.into()),
            status,
            started_at: Some(at(day, 9)),
            completed_at: Some(at(day, 9) + chrono::Duration::milliseconds(1_500)),
            failure_category: None,
            error_message: None,
        }
    }

    fn node(execution_id: &str, node_type: &str, ms: u64) -> NodeExecutionRecord {
        NodeExecutionRecord {
            execution_id: execution_id.into(),
            node_id: "n".into(),
            node_type: node_type.into(),
            status: NodeExecutionStatus::Success,
            duration_ms: Some(ms),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    fn history() -> InMemoryHistory {
        InMemoryHistory::new(
            vec![
                exec("e1", "alice", "wf-a", ExecutionStatus::Success, 1),
                exec("e2", "alice", "wf-b", ExecutionStatus::Failed, 2),
                exec("e3", "bob", "wf-a", ExecutionStatus::Success, 3),
            ],
            vec![
                node("e1", "RISK_GATE", 5),
                node("e2", "RISK_GATE", 7),
                node("e3", "SINGLE_AGENT", 900),
            ],
        )
    }

    #[tokio::test]
    async fn test_filters_by_owner_and_workflow() {
        let h = history();
        let query = AnalyticsQuery {
            owner_id: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(h.executions(&query).await.unwrap().len(), 2);
        let nodes = h.node_executions(&query).await.unwrap();
        assert!(nodes.iter().all(|n| n.node_type == "RISK_GATE"));

        let query = AnalyticsQuery {
            workflow_definition_id: Some("wf-a".into()),
            ..Default::default()
        };
        let ids: Vec<String> = h.executions(&query).await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }

    #[tokio::test]
    async fn test_filters_by_inclusive_date_range() {
        let query = AnalyticsQuery {
            start: Some(at(2, 9)),
            end: Some(at(3, 9)),
            ..Default::default()
        };
        let ids: Vec<String> = history()
            .executions(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["e2", "e3"]);
    }

    #[tokio::test]
    async fn test_report_combines_all_aggregations() {
        let service = AnalyticsService::new(history()).with_top_slow_nodes(1);
        let query = AnalyticsQuery {
            granularity: TrendGranularity::Week,
            ..Default::default()
        };
        let report = service.report(&query).await.unwrap();

        assert_eq!(report.trend.overall.total, 3);
        assert_eq!(report.trend.overall.avg_duration_ms, 1_500);
        // 2026-03-01 is a Sunday, so all three land in one week
        assert_eq!(report.trend.buckets.len(), 1);
        assert_eq!(report.trend.buckets[0].key, "2026-03-01");

        let one_to_five = report
            .duration_distribution
            .iter()
            .find(|b| b.label == "1-5s")
            .unwrap();
        assert_eq!(one_to_five.count, 2);

        assert_eq!(report.failure_categories.len(), 1);
        assert_eq!(report.failure_categories[0].category, "UNKNOWN");
        assert_eq!(report.failure_categories[0].percentage, 1.0);

        assert_eq!(report.node_performance.by_node_type[0].node_type, "RISK_GATE");
        assert_eq!(report.node_performance.top_slow_nodes.len(), 1);
        assert_eq!(report.node_performance.top_slow_nodes[0].node_type, "SINGLE_AGENT");
    }

    struct BrokenHistory;

    impl ExecutionHistorySource for BrokenHistory {
        async fn executions(
            &self,
            _query: &AnalyticsQuery,
        ) -> Result<Vec<WorkflowExecutionRecord>, CollaboratorError> {
            Err(CollaboratorError::Unavailable("store offline".into()))
        }

        async fn node_executions(
            &self,
            _query: &AnalyticsQuery,
        ) -> Result<Vec<NodeExecutionRecord>, CollaboratorError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_source_failure_surfaces() {
        let err = AnalyticsService::new(BrokenHistory)
            .report(&AnalyticsQuery::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "execution history unavailable: collaborator unavailable: store offline"
        );
    }

    #[tokio::test]
    async fn test_empty_history_reports_zeroes() {
        let report = AnalyticsService::new(InMemoryHistory::default())
            .report(&AnalyticsQuery::default())
            .await
            .unwrap();
        assert_eq!(report.trend.overall.success_rate, 0.0);
        assert!(report.failure_categories.is_empty());
        assert!(report.node_performance.top_slow_nodes.is_empty());
    }
}
