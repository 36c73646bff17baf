//! Pod lifecycle: Running-phase waits, volume mounts, in-pod checks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, Event,
    HostPathVolumeSource, PersistentVolumeClaimVolumeSource, Pod, PodSpec, SecretVolumeSource,
    Volume, VolumeMount,
};
use kube::api::{ListParams, PostParams};
use kube::client::Client;
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::managed_labels_extend;
use crate::ops::{delete_and_wait, wait_phase, PhaseReport};
use crate::poller::{convergence_timeout, ResourceRef};
use crate::Error;

/// Marker the exec channel reports when the remote command could not run.
pub const EXEC_FAILED_MARKER: &str = "exec failed";

/// Source for the single volume a volume-scenario pod mounts.
#[derive(Clone, Debug)]
pub enum PodVolume {
    /// Node-local scratch space.
    EmptyDir,
    /// Contents of a named secret.
    Secret {
        /// Secret to mount.
        secret_name: String,
    },
    /// A path on the node, with the hostPath type string from the API docs.
    HostPath {
        /// Path on the node.
        path: String,
        /// hostPath type, e.g. `Directory`.
        type_: String,
    },
    /// Keys of a named config map, optionally narrowed to one subPath.
    ConfigMap {
        /// Config map to mount.
        name: String,
        /// Single key to mount instead of the whole map.
        subpath: Option<String>,
    },
    /// A bound persistent volume claim.
    Pvc {
        /// Claim backing the volume.
        claim_name: String,
    },
}

impl PodVolume {
    fn volume(&self, volume_name: &str) -> Volume {
        let mut volume = Volume {
            name: volume_name.to_owned(),
            ..Volume::default()
        };
        match self {
            PodVolume::EmptyDir => {
                volume.empty_dir = Some(EmptyDirVolumeSource::default());
            }
            PodVolume::Secret { secret_name } => {
                volume.secret = Some(SecretVolumeSource {
                    secret_name: Some(secret_name.clone()),
                    ..SecretVolumeSource::default()
                });
            }
            PodVolume::HostPath { path, type_ } => {
                volume.host_path = Some(HostPathVolumeSource {
                    path: path.clone(),
                    type_: Some(type_.clone()),
                });
            }
            PodVolume::ConfigMap { name, .. } => {
                volume.config_map = Some(ConfigMapVolumeSource {
                    name: Some(name.clone()),
                    ..ConfigMapVolumeSource::default()
                });
            }
            PodVolume::Pvc { claim_name } => {
                volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim_name.clone(),
                    ..PersistentVolumeClaimVolumeSource::default()
                });
            }
        }
        volume
    }

    fn subpath(&self) -> Option<String> {
        match self {
            PodVolume::ConfigMap { subpath, .. } => subpath.clone(),
            _ => None,
        }
    }
}

/// Everything a pod create needs besides its name and namespace.
#[derive(Clone, Debug, Default)]
pub struct PodOptions {
    /// Container image.
    pub image: String,
    /// Override the default image pull policy.
    pub image_pull_policy: Option<String>,
    /// Container command, when the image has no entrypoint.
    pub command: Option<Vec<String>>,
    /// Container port to expose.
    pub port: Option<i32>,
    /// Protocol for `port`.
    pub protocol: Option<String>,
    /// Extra labels merged over the managed set (e.g. an `app` selector).
    pub labels: Option<BTreeMap<String, String>>,
    /// Volume to attach and mount.
    pub volume: Option<PodVolume>,
    /// Mount path for `volume`.
    pub mount_path: Option<String>,
}

pub(crate) fn build_pod(name: &str, options: &PodOptions) -> Pod {
    let volume_name = format!("{name}-volume");
    let mut container = Container {
        name: name.to_owned(),
        image: Some(options.image.clone()),
        image_pull_policy: options.image_pull_policy.clone(),
        command: options.command.clone(),
        ..Container::default()
    };
    if let Some(port) = options.port {
        container.ports = Some(vec![ContainerPort {
            container_port: port,
            protocol: options.protocol.clone(),
            ..ContainerPort::default()
        }]);
    }
    let mut volumes = None;
    if let Some(volume) = &options.volume {
        container.volume_mounts = Some(vec![VolumeMount {
            mount_path: options
                .mount_path
                .clone()
                .unwrap_or_else(|| "/data".to_owned()),
            name: volume_name.clone(),
            sub_path: volume.subpath(),
            ..VolumeMount::default()
        }]);
        volumes = Some(vec![volume.volume(&volume_name)]);
    }
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: managed_labels_extend(options.labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes,
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}

/// Create a pod and optionally wait until its phase is `Running`.
///
/// Volume-backed pods additionally have namespace events scanned during the
/// wait: a `CreateContainerError` for the pod fails the wait early, since
/// the mount will not recover on its own.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_pod(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    options: &PodOptions,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let pod = build_pod(&name, options);
    let pods: Api<Pod> = Api::namespaced(cx.k_client.clone(), namespace);
    pods.create(&PostParams::default(), &pod).await?;
    info!(name, namespace, "pod created");

    if status_wait {
        let resource = ResourceRef::namespaced("Pod", name.clone(), namespace);
        if options.volume.is_some() {
            wait_pod_running_mounted(&cx.k_client, &resource, cfg).await?;
        } else {
            wait_phase(&pods, &resource, "Running", cfg).await?;
        }
    }
    Ok(name)
}

/// Read the pod back, e.g. for its IP or its condition timeline.
pub async fn get_pod(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
) -> Result<Pod, Error> {
    let pods: Api<Pod> = Api::namespaced(cx.k_client.clone(), namespace);
    Ok(pods.get(name).await?)
}

/// Delete a pod and optionally wait for its full termination.
pub async fn delete_pod(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let pods: Api<Pod> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Pod", name, namespace);
    delete_and_wait(&pods, &resource, cfg, status_wait).await
}

/// Run `check_cmd` inside the pod over the exec channel.
///
/// The check fails only when the execution channel reports an explicit
/// failure (the `exec failed` marker in the merged output); any other
/// output — including a failing application exit status printed to stdout —
/// counts as success. A loose smoke-test signal, kept as-is on purpose.
pub async fn check_volume_pod_existence(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    check_cmd: &[String],
) -> Result<(), Error> {
    let output = cx
        .exec_client
        .exec(namespace, name, check_cmd)
        .await
        .map_err(|source| Error::ExecTransport {
            pod: name.to_owned(),
            source,
        })?;
    if output.contains(EXEC_FAILED_MARKER) {
        return Err(Error::ExecCheck {
            pod: name.to_owned(),
            output,
        });
    }
    info!(pod = name, %output, "check command response");
    Ok(())
}

/// Wait for Running while watching namespace events for the volume mount.
async fn wait_pod_running_mounted(
    client: &Client,
    resource: &ResourceRef,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let namespace = resource.namespace.as_deref().unwrap_or_default();
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let events: Api<Event> = Api::namespaced(client.clone(), namespace);
    let started = Instant::now();
    let mut last_observed = String::from("<never read>");
    let mut mounted = false;
    if cfg.retries_total > 0 {
        if !cfg.prepoll_delay.is_zero() {
            sleep(cfg.prepoll_delay).await;
        }
        for attempt in 1..=cfg.retries_total {
            match pods.get(&resource.name).await {
                Ok(pod) => {
                    let phase = pod.phase().unwrap_or("<no phase>");
                    if phase == "Running" {
                        return Ok(());
                    }
                    last_observed = phase.to_owned();
                    if !mounted {
                        mounted = scan_mount_events(&events, &resource.name).await?;
                    }
                }
                Err(err) => {
                    debug!(name = %resource.name, attempt, %err, "pod read failed");
                    last_observed = format!("read error: {err}");
                }
            }
            if attempt < cfg.retries_total {
                sleep(cfg.poll_interval).await;
            }
        }
    }
    Err(convergence_timeout(
        resource,
        "Running",
        last_observed,
        cfg.retries_total,
        started.elapsed(),
    ))
}

/// One pass over the namespace events: `Ok(true)` once the volume mount was
/// seen, an error when the container can not be created at all. Listing
/// failures are ignored; the surrounding poll retries anyway.
async fn scan_mount_events(events: &Api<Event>, pod: &str) -> Result<bool, Error> {
    let volume_name = format!("{pod}-volume");
    let Ok(list) = events.list(&ListParams::default()).await else {
        return Ok(false);
    };
    for event in list.items {
        let Some(name) = &event.metadata.name else {
            continue;
        };
        if !name.starts_with(pod) {
            continue;
        }
        match event.reason.as_deref() {
            Some("CreateContainerError") => {
                return Err(Error::VolumeMount {
                    pod: pod.to_owned(),
                })
            }
            Some("SuccessfulMountVolume")
                if event
                    .message
                    .as_deref()
                    .is_some_and(|message| message.contains(&volume_name)) =>
            {
                info!(pod, volume = volume_name, "volume mounted");
                return Ok(true);
            }
            _ => {}
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::stub::{timeout_after_1s, with_phase, MockExec};

    fn options(volume: Option<PodVolume>) -> PodOptions {
        PodOptions {
            image: "busybox".to_owned(),
            command: Some(vec!["sleep".to_owned(), "3600".to_owned()]),
            volume,
            mount_path: Some("/check".to_owned()),
            ..PodOptions::default()
        }
    }

    #[test]
    fn built_pods_carry_the_discovery_label_and_mount() {
        let pod = build_pod(
            "kubench-pod",
            &options(Some(PodVolume::ConfigMap {
                name: "kubench-pod".to_owned(),
                subpath: Some("test.txt".to_owned()),
            })),
        );
        let json = serde_json::to_string_pretty(&pod).unwrap();
        expect![[r#"
            {
              "apiVersion": "v1",
              "kind": "Pod",
              "metadata": {
                "labels": {
                  "managed-by": "kubench"
                },
                "name": "kubench-pod"
              },
              "spec": {
                "containers": [
                  {
                    "command": [
                      "sleep",
                      "3600"
                    ],
                    "image": "busybox",
                    "name": "kubench-pod",
                    "volumeMounts": [
                      {
                        "mountPath": "/check",
                        "name": "kubench-pod-volume",
                        "subPath": "test.txt"
                      }
                    ]
                  }
                ],
                "volumes": [
                  {
                    "configMap": {
                      "name": "kubench-pod"
                    },
                    "name": "kubench-pod-volume"
                  }
                ]
              }
            }"#]]
        .assert_eq(&json);
    }

    #[test]
    fn every_volume_source_lands_in_the_right_field() {
        let volume = PodVolume::EmptyDir.volume("v");
        assert!(volume.empty_dir.is_some());
        let volume = PodVolume::Secret {
            secret_name: "s".to_owned(),
        }
        .volume("v");
        assert_eq!(volume.secret.unwrap().secret_name.as_deref(), Some("s"));
        let volume = PodVolume::HostPath {
            path: "/tmp".to_owned(),
            type_: "Directory".to_owned(),
        }
        .volume("v");
        assert_eq!(volume.host_path.unwrap().path, "/tmp");
        let volume = PodVolume::Pvc {
            claim_name: "c".to_owned(),
        }
        .volume("v");
        assert_eq!(volume.persistent_volume_claim.unwrap().claim_name, "c");
    }

    #[tokio::test]
    async fn create_waits_for_running() {
        let (cx, mut server) = Context::test();
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 3);

        let handle = tokio::spawn(async move {
            server
                .handle(
                    "POST",
                    "/api/v1/namespaces/bench/pods",
                    &with_phase(Pod::default(), "Pending"),
                )
                .await
                .expect("create should be issued");
            server
                .handle(
                    "GET",
                    "/api/v1/namespaces/bench/pods/kubench-fixed",
                    &with_phase(Pod::default(), "Running"),
                )
                .await
                .expect("read should be served");
        });

        let name = create_pod(
            cx,
            "bench",
            Some("kubench-fixed".to_owned()),
            &options(None),
            &cfg,
            true,
        )
        .await
        .unwrap();
        assert_eq!(name, "kubench-fixed");
        timeout_after_1s(handle).await;
    }

    #[tokio::test]
    async fn volume_pod_wait_fails_fast_on_create_container_error() {
        let (cx, mut server) = Context::test();
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 5);

        let handle = tokio::spawn(async move {
            server
                .handle(
                    "POST",
                    "/api/v1/namespaces/bench/pods",
                    &with_phase(Pod::default(), "Pending"),
                )
                .await
                .expect("create should be issued");
            server
                .handle(
                    "GET",
                    "/api/v1/namespaces/bench/pods/kubench-vol",
                    &with_phase(Pod::default(), "Pending"),
                )
                .await
                .expect("pod read should be served");
            let event = Event {
                metadata: kube::core::ObjectMeta {
                    name: Some("kubench-vol.17f0".to_owned()),
                    ..Default::default()
                },
                reason: Some("CreateContainerError".to_owned()),
                ..Default::default()
            };
            server
                .handle_list("GET", "/api/v1/namespaces/bench/events", vec![event])
                .await
                .expect("event list should be served");
        });

        let err = create_pod(
            cx,
            "bench",
            Some("kubench-vol".to_owned()),
            &options(Some(PodVolume::EmptyDir)),
            &cfg,
            true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::VolumeMount { pod } if pod == "kubench-vol"));
        timeout_after_1s(handle).await;
    }

    #[tokio::test]
    async fn exec_check_passes_on_arbitrary_output() {
        let (cx, _server) =
            Context::test_with_exec(MockExec::with_response(Ok("No such file".to_owned())));
        check_volume_pod_existence(
            cx,
            "bench",
            "kubench-vol",
            &["ls".to_owned(), "/check".to_owned()],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn exec_check_fails_only_on_the_channel_failure_marker() {
        let (cx, _server) = Context::test_with_exec(MockExec::with_response(Ok(
            "exec failed: container not found".to_owned(),
        )));
        let err = check_volume_pod_existence(cx, "bench", "kubench-vol", &["ls".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecCheck { .. }));
    }
}
