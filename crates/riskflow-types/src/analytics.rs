//! Execution history records and analytics report shapes.
//!
//! History records are supplied by the external execution store, already
//! filtered. Report types are what the aggregator produces from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{ExecutionStatus, NodeExecutionStatus};

// ---------------------------------------------------------------------------
// History records
// ---------------------------------------------------------------------------

/// One historical workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionRecord {
    pub id: String,
    #[serde(default)]
    pub workflow_definition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Classification of the failure, for FAILED executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowExecutionRecord {
    /// Wall-clock duration, when both timestamps are present.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// One historical node execution within a workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionRecord {
    #[serde(default)]
    pub execution_id: String,
    pub node_id: String,
    /// Node type wire name. Kept as a string so records written by older
    /// catalog versions still aggregate.
    pub node_type: String,
    pub status: NodeExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Trend bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendGranularity {
    Hour,
    #[default]
    Day,
    Week,
}

impl fmt::Display for TrendGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendGranularity::Hour => write!(f, "HOUR"),
            TrendGranularity::Day => write!(f, "DAY"),
            TrendGranularity::Week => write!(f, "WEEK"),
        }
    }
}

impl FromStr for TrendGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HOUR" => Ok(TrendGranularity::Hour),
            "DAY" => Ok(TrendGranularity::Day),
            "WEEK" => Ok(TrendGranularity::Week),
            other => Err(format!("invalid granularity: '{other}'")),
        }
    }
}

/// Filter handed to the execution history source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub granularity: TrendGranularity,
}

// ---------------------------------------------------------------------------
// Report shapes
// ---------------------------------------------------------------------------

/// Counts for one trend bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    /// `YYYY-MM-DDTHH:00:00.000Z` for hourly buckets, `YYYY-MM-DD` otherwise.
    pub key: String,
    pub bucket_start: DateTime<Utc>,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub canceled: u64,
    pub success_rate: f64,
}

/// Totals over the whole filtered set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub canceled: u64,
    pub success_rate: f64,
    /// Average over executions with both timestamps, rounded to the millisecond.
    pub avg_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrend {
    pub granularity: TrendGranularity,
    pub buckets: Vec<TrendBucket>,
    pub overall: OverallStats,
}

/// Half-open duration range `[min_ms, max_ms)`; `max_ms = None` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationBucket {
    pub label: String,
    pub min_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<u64>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCategoryStat {
    pub category: String,
    pub count: u64,
    /// Share of all failed executions, in `[0, 1]`.
    pub percentage: f64,
}

/// Execution statistics for one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypePerformance {
    pub node_type: String,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
    pub max_duration_ms: u64,
    pub p95_duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePerformanceReport {
    /// Sorted by total executions, descending.
    pub by_node_type: Vec<NodeTypePerformance>,
    /// Sorted by average duration, descending; truncated.
    pub top_slow_nodes: Vec<NodeTypePerformance>,
}

/// Everything the aggregator computes for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub trend: ExecutionTrend,
    pub duration_distribution: Vec<DurationBucket>,
    pub failure_categories: Vec<FailureCategoryStat>,
    pub node_performance: NodePerformanceReport,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_execution_record_duration() {
        let record = WorkflowExecutionRecord {
            id: "e1".to_string(),
            workflow_definition_id: "wf".to_string(),
            owner_id: None,
            status: ExecutionStatus::Success,
            started_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
            completed_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 2).unwrap()),
            failure_category: None,
            error_message: None,
        };
        assert_eq!(record.duration_ms(), Some(2000));
    }

    #[test]
    fn test_execution_record_camel_case() {
        let record: WorkflowExecutionRecord = serde_json::from_value(json!({
            "id": "e1",
            "workflowDefinitionId": "wf",
            "status": "FAILED",
            "failureCategory": "TIMEOUT"
        }))
        .unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.failure_category.as_deref(), Some("TIMEOUT"));
        assert_eq!(record.duration_ms(), None);
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("week".parse::<TrendGranularity>().unwrap(), TrendGranularity::Week);
        assert!("month".parse::<TrendGranularity>().is_err());
        assert_eq!(TrendGranularity::default(), TrendGranularity::Day);
    }
}
