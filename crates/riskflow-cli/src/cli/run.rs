//! `rflow run`: execute a graph file end to end.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use riskflow_core::collaborator::fixture::FixtureCollaborators;
use riskflow_core::engine::{GraphRunOutcome, RunRequest, WorkflowEngine};
use riskflow_core::node::NodeDispatcher;
use riskflow_core::node::dispatcher::Collaborators;
use riskflow_types::config::EngineConfig;
use riskflow_types::envelope::Envelope;
use riskflow_types::workflow::{ExecutionStatus, NodeExecutionStatus, WorkflowGraph};

use super::files::{json_arg, json_object_arg, load_fixtures, load_graph};

/// Build an engine whose collaborators all answer from `fixtures`.
pub fn fixture_engine(fixtures: FixtureCollaborators, config: EngineConfig) -> WorkflowEngine {
    let shared = Arc::new(fixtures);
    let dispatcher = NodeDispatcher::standard(
        Collaborators {
            agents: Arc::clone(&shared),
            rule_packs: Arc::clone(&shared),
            data: Arc::clone(&shared),
            subflows: Arc::clone(&shared),
            approvals: shared,
        },
        &config,
    );
    WorkflowEngine::new(Arc::new(dispatcher), config)
}

/// Run `graph` once. Ctrl+C cancels the run.
pub async fn execute(
    engine: &WorkflowEngine,
    graph: &WorkflowGraph,
    request: RunRequest,
) -> Result<GraphRunOutcome> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = engine
        .run(graph, request, &cancel)
        .await
        .with_context(|| format!("Graph '{}' is invalid", graph.id));
    watcher.abort();
    outcome
}

pub async fn handle_run(
    graph_path: &Path,
    input: &str,
    snapshot: Option<&str>,
    fixtures: Option<&Path>,
    user: &str,
    config: EngineConfig,
    json: bool,
) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let input = Envelope::from_value(json_object_arg(input, "--input")?);
    let snapshot = snapshot.map(json_arg).transpose()?;
    let engine = fixture_engine(load_fixtures(fixtures)?, config);

    let request = RunRequest::new(user, input).with_parameter_snapshot(snapshot);
    let outcome = execute(&engine, &graph, request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome)?;
    }

    if !outcome.is_success() {
        bail!(
            "run {} ended {}: {}",
            outcome.execution_id,
            outcome.status,
            outcome.error.as_deref().unwrap_or("no error recorded")
        );
    }
    Ok(())
}

fn print_outcome(outcome: &GraphRunOutcome) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Node").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Duration").fg(Color::White),
        Cell::new("Message").fg(Color::White),
    ]);

    for run in &outcome.node_runs {
        let status_cell = match run.status {
            NodeExecutionStatus::Success => Cell::new("● success").fg(Color::Green),
            NodeExecutionStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
            NodeExecutionStatus::Skipped => Cell::new("○ skipped").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&run.node_id).fg(Color::Cyan),
            Cell::new(run.node_type.as_str()),
            status_cell,
            Cell::new(format!("{} ms", run.duration_ms)).fg(Color::DarkGrey),
            Cell::new(run.message.as_deref().unwrap_or("")),
        ]);
    }

    let status = match outcome.status {
        ExecutionStatus::Success => style(outcome.status.to_string()).green().bold(),
        ExecutionStatus::Canceled => style(outcome.status.to_string()).yellow().bold(),
        _ => style(outcome.status.to_string()).red().bold(),
    };

    println!();
    println!(
        "  {} Graph '{}' {}",
        style("*").bold(),
        style(&outcome.graph_id).cyan(),
        status
    );
    println!("  Execution: {}", style(&outcome.execution_id).dim());
    if let Some(category) = outcome.failure_category {
        println!("  Failure:   {} ({})", category.as_str(), outcome.error.as_deref().unwrap_or(""));
    }
    println!();
    println!("{table}");
    println!();
    println!("  {}", style("── Output ──").dim());
    let output: Value = outcome.output.to_value();
    println!("{}", serde_json::to_string_pretty(&output)?);
    println!();
    Ok(())
}
