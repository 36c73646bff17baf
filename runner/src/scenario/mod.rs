//! Workload scenarios: thin drivers over the engine's lifecycle operations.
//!
//! Each scenario is one iteration's worth of work — create something, wait
//! for it to converge, optionally check it, tear it down — against the
//! namespace the selection policy handed it.

pub mod daemon_set;
pub mod deployment;
pub mod job;
pub mod namespaces;
pub mod pod;
pub mod replica_set;
pub mod replication_controller;
pub mod service;
pub mod stateful_set;
pub mod volumes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use kubench_common::WaitConfig;
use kubench_engine::ops::WorkloadOptions;
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;

/// Workload scenarios the runner can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Create a namespace, wait for Active, delete it.
    CreateAndDeleteNamespace,
    /// List cluster namespaces.
    ListNamespaces,
    /// Create a pod, wait for Running, chart its condition timings, delete it.
    CreateAndDeletePod,
    /// Create a replication controller, wait ready, delete it.
    CreateAndDeleteRc,
    /// Create a replication controller, scale it out and back, delete it.
    CreateScaleAndDeleteRc,
    /// Create a replica set, wait ready, delete it.
    CreateAndDeleteReplicaSet,
    /// Create a replica set, scale it out and back, delete it.
    CreateScaleAndDeleteReplicaSet,
    /// Create a deployment, wait ready, delete it.
    CreateAndDeleteDeployment,
    /// Create a deployment, roll its pod template, delete it.
    CreateRolloutAndDeleteDeployment,
    /// Create a stateful set, wait ready, delete it.
    CreateAndDeleteStatefulSet,
    /// Create a stateful set, scale it out and back, delete it.
    CreateScaleAndDeleteStatefulSet,
    /// Create a daemon set, check per-node coverage, delete it.
    CreateCheckAndDeleteDaemonSet,
    /// Create a job, wait for completion, delete it.
    CreateAndDeleteJob,
    /// Pod behind a ClusterIP service, checked with a curl job.
    PodWithClusterIpService,
    /// Pod behind a selector-less service with hand-made endpoints.
    PodWithClusterIpServiceCustomEndpoints,
    /// Pod behind a NodePort service, probed from outside.
    PodWithNodePortService,
    /// Pod with an emptyDir volume.
    CreateAndDeleteEmptydirVolume,
    /// Pod with an emptyDir volume plus an in-pod exec check.
    CreateCheckAndDeleteEmptydirVolume,
    /// Pod with a secret volume.
    CreateAndDeleteSecretVolume,
    /// Pod with a secret volume plus an in-pod exec check.
    CreateCheckAndDeleteSecretVolume,
    /// Pod with a hostPath volume.
    CreateAndDeleteHostPathVolume,
    /// Pod with a configMap volume.
    CreateAndDeleteConfigmapVolume,
    /// Pod with a configMap volume plus an in-pod exec check.
    CreateCheckAndDeleteConfigmapVolume,
    /// Full local-PV flow: storage class, volume, claim, consuming pod.
    CreateAndDeleteLocalPvcPod,
}

impl Scenario {
    /// CLI-facing name of the scenario.
    pub fn name(&self) -> String {
        self.to_possible_value()
            .map(|value| value.get_name().to_owned())
            .unwrap_or_else(|| format!("{self:?}"))
    }
}

/// Per-scenario knobs, shared read-only across iterations.
#[derive(Clone, Debug)]
pub struct ScenarioOpts {
    /// Container image workloads run.
    pub image: String,
    /// Container command, when the image has no entrypoint.
    pub command: Option<Vec<String>>,
    /// Replica count for controller scenarios.
    pub replicas: i32,
    /// Replica count controller scenarios scale to.
    pub scale_replicas: i32,
    /// Container/service port for service scenarios.
    pub port: i32,
    /// Mount path for volume scenarios.
    pub mount_path: String,
    /// Command exec checks run inside volume pods.
    pub check_cmd: Option<Vec<String>>,
    /// Node path for hostPath and local-PV scenarios.
    pub volume_path: String,
    /// Node hostname the local-PV scenario pins its volume to.
    pub node: Option<String>,
    /// Host of the cluster API endpoint, for NodePort probing.
    pub cluster_host: Option<String>,
    /// Per-request timeout for the NodePort probe.
    pub request_timeout: Option<Duration>,
}

pub(crate) fn workload_options(opts: &ScenarioOpts) -> WorkloadOptions {
    WorkloadOptions {
        image: opts.image.clone(),
        replicas: opts.replicas,
        command: opts.command.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
    }
}

/// Run one iteration of `scenario` against `namespace`.
pub async fn dispatch(
    cx: Arc<DefaultContext>,
    scenario: Scenario,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    match scenario {
        Scenario::CreateAndDeleteNamespace => {
            namespaces::create_and_delete(cx, wait, status_wait).await
        }
        Scenario::ListNamespaces => namespaces::list(cx).await,
        Scenario::CreateAndDeletePod => {
            pod::create_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateAndDeleteRc => {
            replication_controller::create_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateScaleAndDeleteRc => {
            replication_controller::create_scale_and_delete(cx, namespace, opts, wait, status_wait)
                .await
        }
        Scenario::CreateAndDeleteReplicaSet => {
            replica_set::create_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateScaleAndDeleteReplicaSet => {
            replica_set::create_scale_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateAndDeleteDeployment => {
            deployment::create_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateRolloutAndDeleteDeployment => {
            deployment::create_rollout_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateAndDeleteStatefulSet => {
            stateful_set::create_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateScaleAndDeleteStatefulSet => {
            stateful_set::create_scale_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateCheckAndDeleteDaemonSet => {
            daemon_set::create_check_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateAndDeleteJob => {
            job::create_and_delete(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::PodWithClusterIpService => {
            service::pod_with_cluster_ip_service(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::PodWithClusterIpServiceCustomEndpoints => {
            service::pod_with_custom_endpoints(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::PodWithNodePortService => {
            service::pod_with_node_port_service(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateAndDeleteEmptydirVolume => {
            volumes::emptydir(cx, namespace, opts, wait, status_wait, false).await
        }
        Scenario::CreateCheckAndDeleteEmptydirVolume => {
            volumes::emptydir(cx, namespace, opts, wait, status_wait, true).await
        }
        Scenario::CreateAndDeleteSecretVolume => {
            volumes::secret(cx, namespace, opts, wait, status_wait, false).await
        }
        Scenario::CreateCheckAndDeleteSecretVolume => {
            volumes::secret(cx, namespace, opts, wait, status_wait, true).await
        }
        Scenario::CreateAndDeleteHostPathVolume => {
            volumes::host_path(cx, namespace, opts, wait, status_wait).await
        }
        Scenario::CreateAndDeleteConfigmapVolume => {
            volumes::config_map(cx, namespace, opts, wait, status_wait, false).await
        }
        Scenario::CreateCheckAndDeleteConfigmapVolume => {
            volumes::config_map(cx, namespace, opts, wait, status_wait, true).await
        }
        Scenario::CreateAndDeleteLocalPvcPod => {
            volumes::local_pvc_pod(cx, namespace, opts, wait, status_wait).await
        }
    }
}
