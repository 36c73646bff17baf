//! Replica set scenarios.

use std::sync::Arc;

use anyhow::Result;
use kubench_common::WaitConfig;
use kubench_engine::ops::replica_set;
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::{workload_options, ScenarioOpts};

/// Create a replica set, wait ready, delete it.
pub async fn create_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = workload_options(opts);
    let name =
        replica_set::create_replicaset(cx.clone(), namespace, None, &options, wait, status_wait)
            .await?;
    replica_set::delete_replicaset(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Create a replica set, scale it out, scale it back, delete it.
pub async fn create_scale_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = workload_options(opts);
    let name =
        replica_set::create_replicaset(cx.clone(), namespace, None, &options, wait, status_wait)
            .await?;
    replica_set::scale_replicaset(
        cx.clone(),
        namespace,
        &name,
        opts.scale_replicas,
        wait,
        status_wait,
    )
    .await?;
    replica_set::scale_replicaset(cx.clone(), namespace, &name, opts.replicas, wait, status_wait)
        .await?;
    replica_set::delete_replicaset(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}
