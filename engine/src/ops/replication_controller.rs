//! ReplicationController lifecycle.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{ReplicationController, ReplicationControllerSpec};
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

/// Create a replication controller and optionally wait until every replica
/// reports ready.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_rc(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    options: &WorkloadOptions,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let app = cx.generate_name();
    let rc = ReplicationController {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(ReplicationControllerSpec {
            replicas: Some(options.replicas),
            selector: selector_labels(&app),
            template: Some(workload_pod_template(&name, &app, options)),
            ..ReplicationControllerSpec::default()
        }),
        ..ReplicationController::default()
    };
    let rcs: Api<ReplicationController> = Api::namespaced(cx.k_client.clone(), namespace);
    rcs.create(&PostParams::default(), &rc).await?;
    info!(name, namespace, replicas = options.replicas, "replication controller created");

    if status_wait {
        let resource = ResourceRef::namespaced("ReplicationController", name.clone(), namespace);
        wait_ready_replicas(&rcs, &resource, options.replicas, cfg).await?;
    }
    Ok(name)
}

/// Scale the controller and optionally wait for the new target.
pub async fn scale_rc(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    replicas: i32,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let rcs: Api<ReplicationController> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("ReplicationController", name, namespace);
    scale(&rcs, &resource, replicas, cfg, status_wait).await
}

/// Delete the controller and optionally wait for its termination.
pub async fn delete_rc(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let rcs: Api<ReplicationController> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("ReplicationController", name, namespace);
    delete_and_wait(&rcs, &resource, cfg, status_wait).await
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ReplicationControllerStatus;

    use super::*;
    use crate::stub::timeout_after_1s;

    fn rc_with_replicas(replicas: i32, ready: Option<i32>) -> ReplicationController {
        ReplicationController {
            status: Some(ReplicationControllerStatus {
                replicas,
                ready_replicas: ready,
                ..ReplicationControllerStatus::default()
            }),
            ..ReplicationController::default()
        }
    }

    #[tokio::test]
    async fn create_waits_until_ready_replicas_match_the_target() {
        let (cx, mut server) = Context::test();
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 4);

        let handle = tokio::spawn(async move {
            let body = server
                .handle_and_return_body(
                    "POST",
                    "/api/v1/namespaces/bench/replicationcontrollers",
                )
                .await
                .expect("create should be issued");
            assert!(body.contains("\"replicas\":2"));
            let read = "/api/v1/namespaces/bench/replicationcontrollers/kubench-rc";
            for response in [
                rc_with_replicas(2, None),
                rc_with_replicas(2, Some(1)),
                rc_with_replicas(2, Some(2)),
            ] {
                server
                    .handle("GET", read, &response)
                    .await
                    .expect("read should be served");
            }
        });

        let options = WorkloadOptions {
            image: "busybox".to_owned(),
            replicas: 2,
            ..WorkloadOptions::default()
        };
        create_rc(cx, "bench", Some("kubench-rc".to_owned()), &options, &cfg, true)
            .await
            .unwrap();
        timeout_after_1s(handle).await;
    }

    #[tokio::test]
    async fn scale_patches_only_the_replica_count() {
        let (cx, mut server) = Context::test();
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 2);

        let handle = tokio::spawn(async move {
            let body = server
                .handle_and_return_body(
                    "PATCH",
                    "/api/v1/namespaces/bench/replicationcontrollers/kubench-rc",
                )
                .await
                .expect("patch should be issued");
            assert_eq!(body, r#"{"spec":{"replicas":5}}"#);
            server
                .handle(
                    "GET",
                    "/api/v1/namespaces/bench/replicationcontrollers/kubench-rc",
                    &rc_with_replicas(5, Some(5)),
                )
                .await
                .expect("read should be served");
        });

        scale_rc(cx, "bench", "kubench-rc", 5, &cfg, true).await.unwrap();
        timeout_after_1s(handle).await;
    }
}
