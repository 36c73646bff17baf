//! Per-kind lifecycle operations built on the convergence poller.
//!
//! Every operation has the same shape: build a typed manifest carrying the
//! managed-by discovery label, issue the mutating call, then optionally
//! block until that kind's convergence predicate holds. The predicate is
//! phase-equals for namespaces, pods and volumes, ready-replicas for
//! workload controllers, and absence for every delete.
//!
//! Kinds plug into the generic executors through two small capability
//! traits, [`PhaseReport`] and [`ReplicaReport`], so there is exactly one
//! wait loop per predicate family rather than one per resource kind.

pub mod configmap;
pub mod daemon_set;
pub mod deployment;
pub mod job;
pub mod namespace;
pub mod pod;
pub mod replica_set;
pub mod replication_controller;
pub mod service;
pub mod stateful_set;
pub mod volume;

use std::fmt::Debug;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{
    Container, Namespace, PersistentVolume, PersistentVolumeClaim, Pod, PodSpec, PodTemplateSpec,
    ReplicationController,
};
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

use crate::labels::selector_labels;
use crate::poller::{wait_until, Attempt, ResourceRef};
use crate::Error;

/// Reports the coarse `status.phase` string of a resource.
pub trait PhaseReport {
    /// The phase, when the cluster has reported one.
    fn phase(&self) -> Option<&str>;
}

impl PhaseReport for Namespace {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.phase.as_deref())
    }
}

impl PhaseReport for Pod {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.phase.as_deref())
    }
}

impl PhaseReport for PersistentVolume {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.phase.as_deref())
    }
}

impl PhaseReport for PersistentVolumeClaim {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.phase.as_deref())
    }
}

/// Reports a workload controller's observed and ready instance counts.
pub trait ReplicaReport {
    /// Declared instance count, as observed in status.
    fn desired(&self) -> Option<i32>;
    /// Instances currently passing readiness.
    fn ready(&self) -> Option<i32>;
}

impl ReplicaReport for ReplicationController {
    fn desired(&self) -> Option<i32> {
        self.status.as_ref().map(|status| status.replicas)
    }
    fn ready(&self) -> Option<i32> {
        self.status.as_ref().and_then(|status| status.ready_replicas)
    }
}

impl ReplicaReport for ReplicaSet {
    fn desired(&self) -> Option<i32> {
        self.status.as_ref().map(|status| status.replicas)
    }
    fn ready(&self) -> Option<i32> {
        self.status.as_ref().and_then(|status| status.ready_replicas)
    }
}

impl ReplicaReport for Deployment {
    fn desired(&self) -> Option<i32> {
        self.status.as_ref().and_then(|status| status.replicas)
    }
    fn ready(&self) -> Option<i32> {
        self.status.as_ref().and_then(|status| status.ready_replicas)
    }
}

impl ReplicaReport for StatefulSet {
    fn desired(&self) -> Option<i32> {
        self.status.as_ref().map(|status| status.replicas)
    }
    fn ready(&self) -> Option<i32> {
        self.status.as_ref().and_then(|status| status.ready_replicas)
    }
}

impl ReplicaReport for DaemonSet {
    fn desired(&self) -> Option<i32> {
        self.status
            .as_ref()
            .map(|status| status.desired_number_scheduled)
    }
    fn ready(&self) -> Option<i32> {
        self.status.as_ref().map(|status| status.number_ready)
    }
}

/// Spec fields shared by the workload-controller creates.
#[derive(Clone, Debug, Default)]
pub struct WorkloadOptions {
    /// Container template image.
    pub image: String,
    /// Declared instance count.
    pub replicas: i32,
    /// Container template command, when the image has no entrypoint.
    pub command: Option<Vec<String>>,
    /// Override the default image pull policy.
    pub image_pull_policy: Option<String>,
}

/// Pod template every workload controller stamps out, selectable by `app`.
pub(crate) fn workload_pod_template(
    name: &str,
    app: &str,
    options: &WorkloadOptions,
) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            name: Some(name.to_owned()),
            labels: selector_labels(app),
            ..ObjectMeta::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: name.to_owned(),
                image: Some(options.image.clone()),
                command: options.command.clone(),
                image_pull_policy: options.image_pull_policy.clone(),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
    }
}

/// Block until the resource's phase is one of `phases`.
pub(crate) async fn wait_phase_in<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    phases: &[&str],
    cfg: &WaitConfig,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug + PhaseReport,
{
    let api = api.clone();
    let name = resource.name.clone();
    let wanted: Vec<String> = phases.iter().map(|phase| (*phase).to_owned()).collect();
    wait_until(resource, &phases.join("|"), cfg, move || {
        let api = api.clone();
        let name = name.clone();
        let wanted = wanted.clone();
        async move {
            let object = api.get(&name).await?;
            Ok(match object.phase() {
                Some(observed) if wanted.iter().any(|want| want == observed) => Attempt::Converged,
                observed => Attempt::Pending(observed.unwrap_or("<no phase>").to_owned()),
            })
        }
    })
    .await
}

/// Block until the resource's phase equals `phase`.
pub(crate) async fn wait_phase<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    phase: &str,
    cfg: &WaitConfig,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug + PhaseReport,
{
    wait_phase_in(api, resource, &[phase], cfg).await
}

/// Block until ready replicas and observed desired replicas both equal
/// `replicas`. Missing status fields mean not-yet-converged, not an error.
pub(crate) async fn wait_ready_replicas<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    replicas: i32,
    cfg: &WaitConfig,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug + ReplicaReport,
{
    let api = api.clone();
    let name = resource.name.clone();
    wait_until(
        resource,
        &format!("{replicas} ready replicas"),
        cfg,
        move || {
            let api = api.clone();
            let name = name.clone();
            async move {
                let object = api.get(&name).await?;
                Ok(replica_attempt(&object, Some(replicas)))
            }
        },
    )
    .await
}

/// Block until every observed-desired instance is ready, whatever the count.
/// Used by daemon sets, whose desired count is derived from the node pool.
pub(crate) async fn wait_replicas_settled<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    cfg: &WaitConfig,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug + ReplicaReport,
{
    let api = api.clone();
    let name = resource.name.clone();
    wait_until(resource, "all desired instances ready", cfg, move || {
        let api = api.clone();
        let name = name.clone();
        async move {
            let object = api.get(&name).await?;
            Ok(replica_attempt(&object, None))
        }
    })
    .await
}

fn replica_attempt<K: ReplicaReport>(object: &K, target: Option<i32>) -> Attempt {
    match (object.desired(), object.ready()) {
        (Some(desired), Some(ready))
            if desired == ready && target.map_or(true, |target| ready == target) =>
        {
            Attempt::Converged
        }
        (desired, ready) => Attempt::Pending(format!(
            "{}/{} ready",
            display_count(ready),
            display_count(desired)
        )),
    }
}

fn display_count(count: Option<i32>) -> String {
    count.map_or_else(|| "?".to_owned(), |count| count.to_string())
}

/// Block until reads of the resource report not-found.
pub(crate) async fn wait_gone<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    cfg: &WaitConfig,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug,
{
    let api = api.clone();
    let name = resource.name.clone();
    wait_until(resource, "absence", cfg, move || {
        let api = api.clone();
        let name = name.clone();
        async move {
            match api.get(&name).await {
                Ok(_) => Ok(Attempt::Pending("still present".to_owned())),
                Err(kube::Error::Api(err)) if err.reason == "NotFound" => Ok(Attempt::Converged),
                Err(err) => Err(err),
            }
        }
    })
    .await
}

/// Issue a delete and optionally wait for the absence predicate.
///
/// An already-gone resource is success, not an error.
pub(crate) async fn delete_and_wait<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(&resource.name, &DeleteParams::default()).await {
        Ok(_) => {}
        Err(kube::Error::Api(err)) if err.reason == "NotFound" => {
            info!(kind = resource.kind, name = %resource.name, "already deleted");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }
    info!(kind = resource.kind, name = %resource.name, "delete issued");
    if status_wait {
        wait_gone(api, resource, cfg).await?;
    }
    Ok(())
}

/// Patch `spec.replicas` and optionally wait for convergence on the new
/// target.
pub(crate) async fn scale<K>(
    api: &Api<K>,
    resource: &ResourceRef,
    replicas: i32,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + Debug + ReplicaReport,
{
    api.patch(
        &resource.name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "spec": { "replicas": replicas } })),
    )
    .await?;
    info!(kind = resource.kind, name = %resource.name, replicas, "scale issued");
    if status_wait {
        wait_ready_replicas(api, resource, replicas, cfg).await?;
    }
    Ok(())
}
