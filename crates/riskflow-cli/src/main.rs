//! riskflow command-line entry point.
//!
//! Binary name: `rflow`
//!
//! Parses CLI arguments, initializes tracing and the engine configuration,
//! then dispatches to the command handler.

mod cli;

use clap::Parser;
use clap_complete::generate;

use cli::analytics::AnalyticsArgs;
use cli::{Cli, Commands};
use riskflow_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions need neither tracing nor config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "rflow", &mut std::io::stdout());
        return Ok(());
    }

    let default_filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,riskflow_core=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        default_filter: default_filter.to_string(),
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = cli::files::load_engine_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            graph,
            input,
            snapshot,
            fixtures,
            user,
        } => {
            cli::run::handle_run(
                &graph,
                &input,
                snapshot.as_deref(),
                fixtures.as_deref(),
                &user,
                config,
                cli.json,
            )
            .await
        }

        Commands::Gate {
            node_config,
            input,
            snapshot,
        } => cli::gate::handle_gate(&node_config, &input, snapshot.as_deref(), cli.json).await,

        Commands::Smoke { perf } => cli::smoke::handle_smoke(perf, cli.json).await,

        Commands::Analytics {
            executions,
            nodes,
            granularity,
            owner,
            workflow,
            start,
            end,
            top,
        } => {
            let args = AnalyticsArgs {
                granularity: granularity.as_deref(),
                owner,
                workflow,
                start: start.as_deref(),
                end: end.as_deref(),
                top,
            };
            cli::analytics::handle_analytics(
                &executions,
                nodes.as_deref(),
                args,
                &config.analytics,
                cli.json,
            )
            .await
        }

        Commands::Completions { .. } => Ok(()),
    }
}
