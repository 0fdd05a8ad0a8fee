//! CLI command definitions for the `rflow` binary.
//!
//! Uses clap derive macros for argument parsing. Every command reads plain
//! JSON/YAML files, so the engine can be exercised without any services.

pub mod analytics;
pub mod files;
pub mod gate;
pub mod run;
pub mod smoke;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run risk-gated decision graphs and inspect their execution history.
#[derive(Parser)]
#[command(name = "rflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all logs except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logs (-v for engine debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "RFLOW_OTEL")]
    pub otel: bool,

    /// Engine configuration file. Defaults to ./riskflow.toml when present.
    #[arg(long, global = true, env = "RFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow graph against fixture-backed collaborators.
    Run {
        /// Graph definition (.yaml, .yml or .json).
        graph: PathBuf,

        /// Initial envelope: inline JSON or a path to a JSON file.
        #[arg(long, default_value = "{}")]
        input: String,

        /// Parameter snapshot: inline JSON or a path to a JSON file.
        #[arg(long)]
        snapshot: Option<String>,

        /// Collaborator fixtures (agents, data sources, rule packs, ...).
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// User recorded as the trigger of the run.
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Evaluate a single risk gate and print its decision.
    Gate {
        /// Risk gate node config: inline JSON or a path to a JSON file.
        #[arg(long = "node-config")]
        node_config: String,

        /// Envelope to evaluate: inline JSON or a path to a JSON file.
        #[arg(long, default_value = "{}")]
        input: String,

        /// Parameter snapshot: inline JSON or a path to a JSON file.
        #[arg(long)]
        snapshot: Option<String>,
    },

    /// Run the built-in risk gate scenarios.
    Smoke {
        /// Additionally time this many gate evaluations.
        #[arg(long)]
        perf: Option<usize>,
    },

    /// Aggregate exported execution history.
    Analytics {
        /// JSON array of workflow execution records.
        #[arg(long)]
        executions: PathBuf,

        /// JSON array of node execution records.
        #[arg(long)]
        nodes: Option<PathBuf>,

        /// Trend bucket size: HOUR, DAY or WEEK.
        #[arg(long)]
        granularity: Option<String>,

        /// Only executions owned by this user.
        #[arg(long)]
        owner: Option<String>,

        /// Only executions of this workflow definition.
        #[arg(long)]
        workflow: Option<String>,

        /// Earliest start time (RFC 3339), inclusive.
        #[arg(long)]
        start: Option<String>,

        /// Latest start time (RFC 3339), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Number of slowest node types to list.
        #[arg(long)]
        top: Option<usize>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
