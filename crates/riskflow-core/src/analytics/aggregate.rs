//! Pure aggregations over execution history.
//!
//! Nothing here fails: empty input yields zero counts and zero ratios.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, DurationRound, SecondsFormat, Utc};
use riskflow_types::analytics::{
    DurationBucket, ExecutionTrend, FailureCategoryStat, NodeExecutionRecord,
    NodePerformanceReport, NodeTypePerformance, OverallStats, TrendBucket, TrendGranularity,
    WorkflowExecutionRecord,
};
use riskflow_types::workflow::{ExecutionStatus, NodeExecutionStatus};

/// Category assigned to failures that carry none.
pub const UNKNOWN_FAILURE_CATEGORY: &str = "UNKNOWN";

/// Default length of `topSlowNodes`.
pub const DEFAULT_TOP_SLOW_NODES: usize = 10;

/// Duration buckets: label, inclusive lower bound, exclusive upper bound (ms).
pub const DURATION_BUCKETS: [(&str, u64, Option<u64>); 7] = [
    ("<1s", 0, Some(1_000)),
    ("1-5s", 1_000, Some(5_000)),
    ("5-10s", 5_000, Some(10_000)),
    ("10-30s", 10_000, Some(30_000)),
    ("30-60s", 30_000, Some(60_000)),
    ("1-5m", 60_000, Some(300_000)),
    (">5m", 300_000, None),
];

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

fn rounded_mean(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let sum: u128 = values.iter().map(|v| *v as u128).sum();
    (sum as f64 / values.len() as f64).round() as u64
}

/// Non-negative wall-clock duration of an execution, when both ends are known.
///
/// A record whose completion precedes its start (clock skew between the
/// hosts that stamped it) has no usable duration: it is left out of
/// `avgDurationMs` and of the duration distribution, but still counted in
/// totals and rates.
fn execution_duration_ms(record: &WorkflowExecutionRecord) -> Option<u64> {
    record
        .duration_ms()
        .and_then(|ms| u64::try_from(ms).ok())
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Start of the bucket containing `ts`. Weeks start on Sunday.
pub fn bucket_start(ts: DateTime<Utc>, granularity: TrendGranularity) -> DateTime<Utc> {
    let hour = ts.duration_trunc(Duration::hours(1)).unwrap_or(ts);
    let day = ts.duration_trunc(Duration::days(1)).unwrap_or(ts);
    match granularity {
        TrendGranularity::Hour => hour,
        TrendGranularity::Day => day,
        TrendGranularity::Week => {
            day - Duration::days(i64::from(day.weekday().num_days_from_sunday()))
        }
    }
}

/// Bucket key: full timestamp for hours, calendar date otherwise.
pub fn bucket_key(start: DateTime<Utc>, granularity: TrendGranularity) -> String {
    match granularity {
        TrendGranularity::Hour => start.to_rfc3339_opts(SecondsFormat::Millis, true),
        TrendGranularity::Day | TrendGranularity::Week => start.format("%Y-%m-%d").to_string(),
    }
}

#[derive(Default)]
struct Counts {
    total: u64,
    success: u64,
    failed: u64,
    canceled: u64,
}

impl Counts {
    fn add(&mut self, status: ExecutionStatus) {
        self.total += 1;
        match status {
            ExecutionStatus::Success => self.success += 1,
            ExecutionStatus::Failed => self.failed += 1,
            ExecutionStatus::Canceled => self.canceled += 1,
            ExecutionStatus::Pending | ExecutionStatus::Running => {}
        }
    }
}

/// Group executions into time buckets and compute the overall record.
///
/// Executions without a start time count toward `overall` but not toward
/// any bucket. Buckets are returned in ascending time order.
pub fn execution_trend(
    records: &[WorkflowExecutionRecord],
    granularity: TrendGranularity,
) -> ExecutionTrend {
    let mut buckets: BTreeMap<DateTime<Utc>, Counts> = BTreeMap::new();
    let mut overall = Counts::default();
    let mut durations = Vec::new();

    for record in records {
        overall.add(record.status);
        if let Some(started) = record.started_at {
            buckets
                .entry(bucket_start(started, granularity))
                .or_default()
                .add(record.status);
        }
        if let Some(ms) = execution_duration_ms(record) {
            durations.push(ms);
        }
    }

    let buckets = buckets
        .into_iter()
        .map(|(start, c)| TrendBucket {
            key: bucket_key(start, granularity),
            bucket_start: start,
            total: c.total,
            success: c.success,
            failed: c.failed,
            canceled: c.canceled,
            success_rate: ratio(c.success, c.total),
        })
        .collect();

    ExecutionTrend {
        granularity,
        buckets,
        overall: OverallStats {
            total: overall.total,
            success: overall.success,
            failed: overall.failed,
            canceled: overall.canceled,
            success_rate: ratio(overall.success, overall.total),
            avg_duration_ms: rounded_mean(&durations),
        },
    }
}

// ---------------------------------------------------------------------------
// Duration distribution
// ---------------------------------------------------------------------------

/// Count SUCCESS executions with both timestamps into the fixed buckets.
///
/// Intervals are half-open (lower bound inclusive), so 1000 ms lands in `1-5s`.
pub fn duration_distribution(records: &[WorkflowExecutionRecord]) -> Vec<DurationBucket> {
    let mut counts = [0u64; DURATION_BUCKETS.len()];
    for ms in records
        .iter()
        .filter(|r| r.status == ExecutionStatus::Success)
        .filter_map(execution_duration_ms)
    {
        let slot = DURATION_BUCKETS
            .iter()
            .position(|(_, min, max)| ms >= *min && max.is_none_or(|max| ms < max));
        if let Some(slot) = slot {
            counts[slot] += 1;
        }
    }

    DURATION_BUCKETS
        .iter()
        .zip(counts)
        .map(|((label, min, max), count)| DurationBucket {
            label: label.to_string(),
            min_ms: *min,
            max_ms: *max,
            count,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Failure categories
// ---------------------------------------------------------------------------

/// Group FAILED executions by category, most frequent first.
///
/// `percentage` is the ratio `count / failed` in 0..=1. Ties keep first-seen order.
pub fn failure_categories(records: &[WorkflowExecutionRecord]) -> Vec<FailureCategoryStat> {
    let mut groups: Vec<(String, u64)> = Vec::new();
    let mut failed = 0u64;

    for record in records.iter().filter(|r| r.status == ExecutionStatus::Failed) {
        failed += 1;
        let category = record
            .failure_category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_FAILURE_CATEGORY);
        match groups.iter_mut().find(|(c, _)| c == category) {
            Some((_, count)) => *count += 1,
            None => groups.push((category.to_string(), 1)),
        }
    }

    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups
        .into_iter()
        .map(|(category, count)| FailureCategoryStat {
            category,
            count,
            percentage: ratio(count, failed),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Node performance
// ---------------------------------------------------------------------------

/// 95th percentile of an ascending list: index `min(floor(n * 0.95), n - 1)`.
/// 0 for an empty list.
pub fn p95(sorted: &[u64]) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let index = ((n as f64 * 0.95).floor() as usize).min(n - 1);
    sorted[index]
}

/// Per node type statistics, by volume, plus the `top_n` slowest types.
pub fn node_performance(records: &[NodeExecutionRecord], top_n: usize) -> NodePerformanceReport {
    struct Group<'a> {
        node_type: &'a str,
        total: u64,
        success: u64,
        failed: u64,
        durations: Vec<u64>,
    }

    let mut groups: Vec<Group<'_>> = Vec::new();
    for record in records {
        let index = match groups.iter().position(|g| g.node_type == record.node_type) {
            Some(index) => index,
            None => {
                groups.push(Group {
                    node_type: &record.node_type,
                    total: 0,
                    success: 0,
                    failed: 0,
                    durations: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[index];
        group.total += 1;
        match record.status {
            NodeExecutionStatus::Success => group.success += 1,
            NodeExecutionStatus::Failed => group.failed += 1,
            NodeExecutionStatus::Skipped => {}
        }
        if let Some(ms) = record.duration_ms {
            group.durations.push(ms);
        }
    }

    let mut by_node_type: Vec<NodeTypePerformance> = groups
        .into_iter()
        .map(|mut g| {
            g.durations.sort_unstable();
            NodeTypePerformance {
                node_type: g.node_type.to_string(),
                total: g.total,
                success: g.success,
                failed: g.failed,
                success_rate: ratio(g.success, g.total),
                avg_duration_ms: rounded_mean(&g.durations),
                max_duration_ms: g.durations.last().copied().unwrap_or(0),
                p95_duration_ms: p95(&g.durations),
            }
        })
        .collect();
    by_node_type.sort_by(|a, b| b.total.cmp(&a.total));

    let mut top_slow_nodes = by_node_type.clone();
    top_slow_nodes.sort_by(|a, b| b.avg_duration_ms.cmp(&a.avg_duration_ms));
    top_slow_nodes.truncate(top_n);

    NodePerformanceReport {
        by_node_type,
        top_slow_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn exec(status: ExecutionStatus, start: Option<DateTime<Utc>>, duration_ms: Option<i64>) -> WorkflowExecutionRecord {
        WorkflowExecutionRecord {
            id: "e".into(),
            workflow_definition_id: "wf".into(),
            owner_id: None,
            status,
            started_at: start,
            completed_at: start.zip(duration_ms).map(|(s, ms)| s + Duration::milliseconds(ms)),
            failure_category: None,
            error_message: None,
        }
    }

    fn failed(category: Option<&str>) -> WorkflowExecutionRecord {
        WorkflowExecutionRecord {
            failure_category: category.map(str::to_string),
            ..exec(ExecutionStatus::Failed, None, None)
        }
    }

    fn node(node_type: &str, status: NodeExecutionStatus, duration_ms: Option<u64>) -> NodeExecutionRecord {
        NodeExecutionRecord {
            execution_id: "e".into(),
            node_id: "n".into(),
            node_type: node_type.into(),
            status,
            duration_ms,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    #[test]
    fn test_bucket_start_per_granularity() {
        // 2026-03-04 is a Wednesday
        let ts = at(2026, 3, 4, 9, 41, 7);
        assert_eq!(bucket_start(ts, TrendGranularity::Hour), at(2026, 3, 4, 9, 0, 0));
        assert_eq!(bucket_start(ts, TrendGranularity::Day), at(2026, 3, 4, 0, 0, 0));
        assert_eq!(bucket_start(ts, TrendGranularity::Week), at(2026, 3, 1, 0, 0, 0));
        assert_eq!(
            bucket_key(at(2026, 3, 4, 9, 0, 0), TrendGranularity::Hour),
            "2026-03-04T09:00:00.000Z"
        );
        assert_eq!(bucket_key(at(2026, 3, 1, 0, 0, 0), TrendGranularity::Week), "2026-03-01");
    }

    #[test]
    fn test_trend_buckets_and_overall() {
        let records = vec![
            exec(ExecutionStatus::Success, Some(at(2026, 3, 4, 9, 0, 0)), Some(1_000)),
            exec(ExecutionStatus::Failed, Some(at(2026, 3, 4, 18, 0, 0)), Some(3_000)),
            exec(ExecutionStatus::Canceled, Some(at(2026, 3, 3, 1, 0, 0)), None),
            exec(ExecutionStatus::Success, None, None),
        ];
        let trend = execution_trend(&records, TrendGranularity::Day);
        assert_eq!(trend.buckets.len(), 2);
        assert_eq!(trend.buckets[0].key, "2026-03-03");
        assert_eq!(trend.buckets[0].canceled, 1);
        assert_eq!(trend.buckets[1].total, 2);
        assert_eq!(trend.buckets[1].success_rate, 0.5);

        assert_eq!(trend.overall.total, 4);
        assert_eq!(trend.overall.success, 2);
        assert_eq!(trend.overall.success_rate, 0.5);
        assert_eq!(trend.overall.avg_duration_ms, 2_000);
    }

    #[test]
    fn test_skewed_execution_has_no_duration() {
        let start = Some(at(2026, 3, 4, 9, 0, 0));
        let records = vec![
            exec(ExecutionStatus::Success, start, Some(4_000)),
            exec(ExecutionStatus::Success, start, Some(-2_000)),
        ];
        let trend = execution_trend(&records, TrendGranularity::Day);
        assert_eq!(trend.overall.total, 2);
        assert_eq!(trend.overall.success, 2);
        assert_eq!(trend.overall.avg_duration_ms, 4_000);
        let counted: u64 = duration_distribution(&records).iter().map(|b| b.count).sum();
        assert_eq!(counted, 1);
    }

    #[test]
    fn test_empty_input_degrades_to_zero() {
        let trend = execution_trend(&[], TrendGranularity::Week);
        assert!(trend.buckets.is_empty());
        assert_eq!(trend.overall, OverallStats::default());
        assert!(duration_distribution(&[]).iter().all(|b| b.count == 0));
        assert!(failure_categories(&[]).is_empty());
        assert!(node_performance(&[], 10).by_node_type.is_empty());
    }

    #[test]
    fn test_duration_buckets_are_half_open() {
        let start = Some(at(2026, 1, 1, 0, 0, 0));
        let records: Vec<_> = [0, 999, 1_000, 4_999, 5_000, 59_999, 60_000, 300_000, 1_000_000]
            .into_iter()
            .map(|ms| exec(ExecutionStatus::Success, start, Some(ms)))
            .chain([
                exec(ExecutionStatus::Failed, start, Some(10)),
                exec(ExecutionStatus::Success, None, None),
            ])
            .collect();
        let counts: Vec<(String, u64)> = duration_distribution(&records)
            .into_iter()
            .map(|b| (b.label, b.count))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("<1s".to_string(), 2),
                ("1-5s".to_string(), 2),
                ("5-10s".to_string(), 1),
                ("10-30s".to_string(), 0),
                ("30-60s".to_string(), 1),
                ("1-5m".to_string(), 1),
                (">5m".to_string(), 2),
            ]
        );
        let total: u64 = counts.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn test_failure_categories_sorted_with_unknown_default() {
        let records = vec![
            failed(Some("TIMEOUT")),
            failed(None),
            failed(Some("RISK_BLOCKED")),
            failed(Some("RISK_BLOCKED")),
            exec(ExecutionStatus::Success, None, None),
        ];
        let stats = failure_categories(&records);
        assert_eq!(stats[0].category, "RISK_BLOCKED");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].percentage, 0.5);
        // ties keep first-seen order
        assert_eq!(stats[1].category, "TIMEOUT");
        assert_eq!(stats[2].category, UNKNOWN_FAILURE_CATEGORY);
        assert_eq!(stats[2].percentage, 0.25);
    }

    #[test]
    fn test_p95_index_convention() {
        assert_eq!(p95(&[]), 0);
        assert_eq!(p95(&[7]), 7);
        // n = 20 -> floor(19.0) = 19
        let twenty: Vec<u64> = (1..=20).collect();
        assert_eq!(p95(&twenty), 20);
        // n = 10 -> floor(9.5) = 9
        let ten: Vec<u64> = (1..=10).collect();
        assert_eq!(p95(&ten), 10);
        // n = 5 -> floor(4.75) = 4
        assert_eq!(p95(&[1, 2, 3, 4, 5]), 5);
        // n = 100 -> index 95
        let hundred: Vec<u64> = (0..100).collect();
        assert_eq!(p95(&hundred), 95);
    }

    #[test]
    fn test_node_performance() {
        let records = vec![
            node("RISK_GATE", NodeExecutionStatus::Success, Some(3)),
            node("RISK_GATE", NodeExecutionStatus::Success, Some(4)),
            node("RISK_GATE", NodeExecutionStatus::Failed, None),
            node("SINGLE_AGENT", NodeExecutionStatus::Success, Some(2_000)),
            node("SINGLE_AGENT", NodeExecutionStatus::Failed, Some(5_001)),
            node("JOIN", NodeExecutionStatus::Success, Some(10)),
        ];
        let report = node_performance(&records, 2);

        let types: Vec<&str> = report.by_node_type.iter().map(|p| p.node_type.as_str()).collect();
        assert_eq!(types, vec!["RISK_GATE", "SINGLE_AGENT", "JOIN"]);

        let gate = &report.by_node_type[0];
        assert_eq!(gate.total, 3);
        assert_eq!(gate.failed, 1);
        // (3 + 4) / 2 = 3.5 -> 4
        assert_eq!(gate.avg_duration_ms, 4);
        assert_eq!(gate.max_duration_ms, 4);
        assert_eq!(gate.p95_duration_ms, 4);

        let slow: Vec<&str> = report.top_slow_nodes.iter().map(|p| p.node_type.as_str()).collect();
        assert_eq!(slow, vec!["SINGLE_AGENT", "JOIN"]);
        assert_eq!(report.top_slow_nodes[0].avg_duration_ms, 3_501);
    }
}
