//! ReplicaSet lifecycle.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::{ReplicaSet, ReplicaSetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::info;

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::{managed_labels, selector_labels};
use crate::ops::{
    delete_and_wait, scale, wait_ready_replicas, workload_pod_template, WorkloadOptions,
};
use crate::poller::ResourceRef;
use crate::Error;

/// Create a replica set and optionally wait until every replica reports
/// ready.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_replicaset(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    options: &WorkloadOptions,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let app = cx.generate_name();
    let replica_set = ReplicaSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(ReplicaSetSpec {
            replicas: Some(options.replicas),
            selector: LabelSelector {
                match_labels: selector_labels(&app),
                ..LabelSelector::default()
            },
            template: Some(workload_pod_template(&name, &app, options)),
            ..ReplicaSetSpec::default()
        }),
        ..ReplicaSet::default()
    };
    let replica_sets: Api<ReplicaSet> = Api::namespaced(cx.k_client.clone(), namespace);
    replica_sets
        .create(&PostParams::default(), &replica_set)
        .await?;
    info!(name, namespace, replicas = options.replicas, "replica set created");

    if status_wait {
        let resource = ResourceRef::namespaced("ReplicaSet", name.clone(), namespace);
        wait_ready_replicas(&replica_sets, &resource, options.replicas, cfg).await?;
    }
    Ok(name)
}

/// Scale the replica set and optionally wait for the new target.
pub async fn scale_replicaset(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    replicas: i32,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let replica_sets: Api<ReplicaSet> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("ReplicaSet", name, namespace);
    scale(&replica_sets, &resource, replicas, cfg, status_wait).await
}

/// Delete the replica set and optionally wait for its termination.
pub async fn delete_replicaset(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let replica_sets: Api<ReplicaSet> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("ReplicaSet", name, namespace);
    delete_and_wait(&replica_sets, &resource, cfg, status_wait).await
}
