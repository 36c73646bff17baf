//! The `run` subcommand: provision the namespace pool, drive scenario
//! iterations, tear down, report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use kube::{Client, Config};
use kubench_common::WaitConfig;
use kubench_engine::ops::{configmap, namespace};
use kubench_engine::selection::{self, SelectionMethod};
use kubench_engine::{Clock, DefaultContext};
use opentelemetry::{global, KeyValue};
use tracing::{error, info, warn};

use crate::report::{IterationReport, Report};
use crate::scenario::{self, Scenario, ScenarioOpts};

/// Options to Run command
#[derive(Args, Debug)]
pub struct Opts {
    /// Scenario to run.
    #[arg(long, value_enum, env = "KUBENCH_SCENARIO")]
    scenario: Scenario,

    /// Number of iterations to drive.
    #[arg(long, default_value_t = 1, env = "KUBENCH_ITERATIONS")]
    iterations: u64,

    /// Number of namespaces in the pre-provisioned pool.
    #[arg(long, default_value_t = 1, env = "KUBENCH_NAMESPACES")]
    namespaces: u32,

    /// How an iteration picks its namespace from the pool.
    #[arg(long, value_enum, default_value_t, env = "KUBENCH_CHOICE_METHOD")]
    choice_method: ChoiceMethod,

    /// Create a service account plus token secret in each pool namespace.
    #[arg(long)]
    with_serviceaccounts: bool,

    /// Container image scenarios deploy.
    #[arg(long, default_value = "registry.k8s.io/pause:3.9", env = "KUBENCH_IMAGE")]
    image: String,

    /// Container command override; repeat the flag per argument.
    #[arg(long)]
    command: Vec<String>,

    /// Replica count for controller scenarios.
    #[arg(long, default_value_t = 2)]
    replicas: i32,

    /// Replica count controller scenarios scale to.
    #[arg(long, default_value_t = 3)]
    scale_replicas: i32,

    /// Container/service port for service scenarios.
    #[arg(long, default_value_t = 80)]
    port: i32,

    /// Mount path for volume scenarios.
    #[arg(long, default_value = "/check")]
    mount_path: String,

    /// Check command exec checks run inside volume pods; repeat the flag per
    /// argument.
    #[arg(long)]
    check_cmd: Vec<String>,

    /// Node path for hostPath and local-PV scenarios.
    #[arg(long, default_value = "/tmp/kubench")]
    volume_path: String,

    /// Node hostname the local-PV scenario pins its volume to.
    #[arg(long)]
    node: Option<String>,

    /// Seconds for a single NodePort probe request before it counts as a
    /// failed attempt.
    #[arg(long)]
    request_timeout: Option<f64>,

    /// Seconds between two status polls.
    #[arg(long, default_value_t = 1.0, env = "KUBENCH_POLL_INTERVAL")]
    poll_interval: f64,

    /// Total status reads before a wait times out.
    #[arg(long, default_value_t = 30, env = "KUBENCH_RETRIES_TOTAL")]
    retries_total: u32,

    /// Seconds slept once before the first status read.
    #[arg(long, default_value_t = 0.0, env = "KUBENCH_PREPOLL_DELAY")]
    prepoll_delay: f64,

    /// Skip convergence waits; only the mutating calls are verified.
    #[arg(long)]
    no_status_wait: bool,

    /// Where to write the JSON report (stdout when omitted).
    #[arg(long)]
    output: Option<PathBuf>,
}

/// CLI surface of the engine's pool selection policy.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ChoiceMethod {
    /// Uniform draw with replacement.
    #[default]
    Random,
    /// `pool[(iteration - 1) % len]`.
    RoundRobin,
}

impl From<ChoiceMethod> for SelectionMethod {
    fn from(method: ChoiceMethod) -> Self {
        match method {
            ChoiceMethod::Random => SelectionMethod::Random,
            ChoiceMethod::RoundRobin => SelectionMethod::RoundRobin,
        }
    }
}

fn none_if_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

pub async fn run(opts: Opts) -> Result<()> {
    let config = Config::infer()
        .await
        .context("inferring cluster configuration")?;
    let cluster_host = config.cluster_url.host().map(str::to_owned);
    let client = Client::try_from(config)?;
    let cx = Arc::new(DefaultContext::new(client)?);

    let wait = WaitConfig {
        poll_interval: Duration::from_secs_f64(opts.poll_interval),
        retries_total: opts.retries_total,
        prepoll_delay: Duration::from_secs_f64(opts.prepoll_delay),
    };
    let status_wait = !opts.no_status_wait;
    let scenario_opts = ScenarioOpts {
        image: opts.image.clone(),
        command: none_if_empty(opts.command.clone()),
        replicas: opts.replicas,
        scale_replicas: opts.scale_replicas,
        port: opts.port,
        mount_path: opts.mount_path.clone(),
        check_cmd: none_if_empty(opts.check_cmd.clone()),
        volume_path: opts.volume_path.clone(),
        node: opts.node.clone(),
        cluster_host,
        request_timeout: opts.request_timeout.map(Duration::from_secs_f64),
    };

    // Setup phase: the pool is created once and read-only afterwards.
    let mut pool = Vec::with_capacity(opts.namespaces as usize);
    for _ in 0..opts.namespaces {
        let name = namespace::create_namespace(cx.clone(), None, &wait, false).await?;
        if opts.with_serviceaccounts {
            namespace::create_serviceaccount(cx.clone(), &name, &name).await?;
            configmap::create_secret(cx.clone(), &name, Some(name.clone())).await?;
        }
        pool.push(name);
    }
    info!(count = pool.len(), "namespace pool ready");

    let meter = global::meter("kubench");
    let iteration_counter = meter
        .u64_counter("runner_iterations")
        .with_description("Number of scenario iterations driven")
        .init();

    let started_at = cx.clock.now().to_rfc3339();
    let mut iterations = Vec::with_capacity(opts.iterations as usize);
    for iteration in 1..=opts.iterations {
        let chosen = {
            let mut rng = cx.rng.lock().expect("rng mutex poisoned");
            selection::select(&pool, opts.choice_method.into(), iteration, &mut *rng)?.clone()
        };
        info!(iteration, namespace = %chosen, "starting iteration");

        let iteration_started = Instant::now();
        let outcome = scenario::dispatch(
            cx.clone(),
            opts.scenario,
            &chosen,
            &scenario_opts,
            &wait,
            status_wait,
        )
        .await;
        let elapsed = iteration_started.elapsed();
        let outcome_label = if outcome.is_ok() { "success" } else { "failure" };
        iteration_counter.add(
            1,
            &[
                KeyValue::new("scenario", opts.scenario.name()),
                KeyValue::new("outcome", outcome_label),
            ],
        );
        match outcome {
            Ok(additive) => {
                info!(iteration, elapsed_secs = elapsed.as_secs_f64(), "iteration succeeded");
                iterations.push(IterationReport::success(iteration, elapsed, additive));
            }
            Err(err) => {
                error!(iteration, %err, "iteration failed");
                iterations.push(IterationReport::failure(iteration, elapsed, err.to_string()));
            }
        }
    }
    let finished_at = cx.clock.now().to_rfc3339();

    // Teardown phase: destroy the pool with full waits. A namespace that
    // will not die should not fail the whole run this late.
    for name in &pool {
        if let Err(err) = namespace::delete_namespace(cx.clone(), name, &wait, true).await {
            warn!(namespace = %name, %err, "pool teardown left a namespace behind");
        }
    }

    let report = Report {
        scenario: opts.scenario.name(),
        started_at,
        finished_at,
        iterations,
    };
    report.write(opts.output.as_deref())
}
