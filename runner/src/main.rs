//! kubench drives short-lived workloads against a Kubernetes cluster and
//! measures how long they take to converge.

mod cleanup;
mod report;
mod run;
mod scenario;

use anyhow::Result;
use clap::{Parser, Subcommand};
use opentelemetry::{global, KeyValue};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(
        long,
        env = "KUBENCH_OTLP_ENDPOINT",
        default_value = "http://localhost:4317"
    )]
    otlp_endpoint: String,
}

/// Available Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a workload scenario against the cluster
    Run(run::Opts),
    /// Delete everything previous runs left behind
    Cleanup(cleanup::Opts),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Run(_) => "run",
            Command::Cleanup(_) => "cleanup",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let metrics = kubench_common::telemetry::init(args.otlp_endpoint.clone()).await?;

    let meter = global::meter("kubench");
    let runs = meter
        .u64_counter("runner_runs")
        .with_description("Number of runs of the runner")
        .init();
    runs.add(1, &[KeyValue::new("command", args.command.name())]);

    info!(?args.command, ?args.otlp_endpoint, "starting runner");
    match args.command {
        Command::Run(opts) => run::run(opts).await?,
        Command::Cleanup(opts) => cleanup::cleanup(opts).await?,
    }
    // Flush traces and metrics before shutdown
    global::shutdown_tracer_provider();
    metrics.shutdown()?;
    Ok(())
}
