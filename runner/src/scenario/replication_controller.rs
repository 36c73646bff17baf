//! Replication controller scenarios.

use std::sync::Arc;

use anyhow::Result;
use kubench_common::WaitConfig;
use kubench_engine::ops::replication_controller as rc;
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::{workload_options, ScenarioOpts};

/// Create a replication controller, wait ready, delete it.
pub async fn create_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = workload_options(opts);
    let name = rc::create_rc(cx.clone(), namespace, None, &options, wait, status_wait).await?;
    rc::delete_rc(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Create a replication controller, scale it out, scale it back, delete it.
pub async fn create_scale_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = workload_options(opts);
    let name = rc::create_rc(cx.clone(), namespace, None, &options, wait, status_wait).await?;
    rc::scale_rc(cx.clone(), namespace, &name, opts.scale_replicas, wait, status_wait).await?;
    rc::scale_rc(cx.clone(), namespace, &name, opts.replicas, wait, status_wait).await?;
    rc::delete_rc(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}
