//! `rflow analytics`: aggregate exported execution history files.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets};
use console::style;

use riskflow_core::analytics::{AnalyticsService, InMemoryHistory};
use riskflow_types::analytics::{
    AnalyticsQuery, AnalyticsReport, NodeExecutionRecord, TrendGranularity,
    WorkflowExecutionRecord,
};
use riskflow_types::config::AnalyticsConfig;

use super::files::read_json_file;

/// Filters and presentation options collected from the command line.
#[derive(Debug, Default)]
pub struct AnalyticsArgs<'a> {
    pub granularity: Option<&'a str>,
    pub owner: Option<String>,
    pub workflow: Option<String>,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub top: Option<usize>,
}

fn parse_instant(raw: &str, flag: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{flag} must be an RFC 3339 timestamp, got '{raw}'"))
}

pub fn build_query(args: &AnalyticsArgs<'_>, defaults: &AnalyticsConfig) -> Result<AnalyticsQuery> {
    let granularity = match args.granularity {
        Some(raw) => raw.parse::<TrendGranularity>().map_err(|e| anyhow!(e))?,
        None => defaults.default_granularity,
    };
    Ok(AnalyticsQuery {
        owner_id: args.owner.clone(),
        workflow_definition_id: args.workflow.clone(),
        start: args.start.map(|s| parse_instant(s, "--start")).transpose()?,
        end: args.end.map(|s| parse_instant(s, "--end")).transpose()?,
        granularity,
    })
}

pub async fn build_report(
    executions: Vec<WorkflowExecutionRecord>,
    nodes: Vec<NodeExecutionRecord>,
    query: &AnalyticsQuery,
    top_slow_nodes: usize,
) -> Result<AnalyticsReport> {
    let service = AnalyticsService::new(InMemoryHistory::new(executions, nodes))
        .with_top_slow_nodes(top_slow_nodes);
    Ok(service.report(query).await?)
}

pub async fn handle_analytics(
    executions: &Path,
    nodes: Option<&Path>,
    args: AnalyticsArgs<'_>,
    defaults: &AnalyticsConfig,
    json: bool,
) -> Result<()> {
    let query = build_query(&args, defaults)?;
    let executions: Vec<WorkflowExecutionRecord> = read_json_file(executions)?;
    let nodes: Vec<NodeExecutionRecord> = match nodes {
        Some(path) => read_json_file(path)?,
        None => Vec::new(),
    };
    let top = args.top.unwrap_or(defaults.top_slow_nodes);

    let report = build_report(executions, nodes, &query, top).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_report(&report);
    Ok(())
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.iter().map(|h| Cell::new(h).fg(Color::White)).collect::<Vec<_>>());
    table
}

fn right(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

fn print_report(report: &AnalyticsReport) {
    let overall = &report.trend.overall;
    println!();
    println!(
        "  {} {} executions, {} success rate, avg {} ms",
        style("*").bold(),
        style(overall.total).bold(),
        style(percent(overall.success_rate)).green(),
        overall.avg_duration_ms
    );
    println!();

    println!("  {}", style(format!("── Trend ({}) ──", report.trend.granularity)).dim());
    let mut trend = table(&["Bucket", "Total", "Success", "Failed", "Canceled", "Success rate"]);
    for bucket in &report.trend.buckets {
        trend.add_row(vec![
            Cell::new(&bucket.key).fg(Color::Cyan),
            right(bucket.total),
            right(bucket.success),
            right(bucket.failed),
            right(bucket.canceled),
            right(percent(bucket.success_rate)),
        ]);
    }
    println!("{trend}");
    println!();

    println!("  {}", style("── Duration (successful runs) ──").dim());
    let mut durations = table(&["Range", "Count"]);
    for bucket in &report.duration_distribution {
        durations.add_row(vec![Cell::new(&bucket.label), right(bucket.count)]);
    }
    println!("{durations}");
    println!();

    println!("  {}", style("── Failures ──").dim());
    if report.failure_categories.is_empty() {
        println!("  {}", style("No failed executions").dim());
    } else {
        let mut failures = table(&["Category", "Count", "Share"]);
        for stat in &report.failure_categories {
            failures.add_row(vec![
                Cell::new(&stat.category).fg(Color::Red),
                right(stat.count),
                right(percent(stat.percentage)),
            ]);
        }
        println!("{failures}");
    }
    println!();

    println!("  {}", style("── Node types ──").dim());
    let mut nodes = table(&["Type", "Total", "Success rate", "Avg ms", "P95 ms", "Max ms"]);
    for perf in &report.node_performance.by_node_type {
        nodes.add_row(vec![
            Cell::new(&perf.node_type).fg(Color::Cyan),
            right(perf.total),
            right(percent(perf.success_rate)),
            right(perf.avg_duration_ms),
            right(perf.p95_duration_ms),
            right(perf.max_duration_ms),
        ]);
    }
    println!("{nodes}");
    if !report.node_performance.top_slow_nodes.is_empty() {
        let slowest: Vec<String> = report
            .node_performance
            .top_slow_nodes
            .iter()
            .map(|p| format!("{} ({} ms)", p.node_type, p.avg_duration_ms))
            .collect();
        println!("  Slowest: {}", slowest.join(", "));
    }
    println!();
}
