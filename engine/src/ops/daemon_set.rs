//! DaemonSet lifecycle, including the per-node coverage check.

use std::collections::BTreeSet;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{ListParams, PostParams};
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::info;

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::{managed_labels, selector_labels};
use crate::ops::{delete_and_wait, wait_replicas_settled, workload_pod_template, WorkloadOptions};
use crate::poller::ResourceRef;
use crate::Error;

/// Spec fields for a daemon set create. Replica counts do not apply; the
/// node pool decides how many daemons run.
#[derive(Clone, Debug, Default)]
pub struct DaemonOptions {
    /// Container template image.
    pub image: String,
    /// Container template command, when the image has no entrypoint.
    pub command: Option<Vec<String>>,
    /// Override the default image pull policy.
    pub image_pull_policy: Option<String>,
}

/// Create a daemon set and optionally wait until every scheduled daemon is
/// ready.
///
/// Returns the resolved name and the generated `app` selector label, which
/// [`check_daemonset`] needs to find the daemon's pods.
pub async fn create_daemonset(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    options: &DaemonOptions,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(String, String), Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let app = cx.generate_name();
    let template_options = WorkloadOptions {
        image: options.image.clone(),
        replicas: 0,
        command: options.command.clone(),
        image_pull_policy: options.image_pull_policy.clone(),
    };
    let daemon_set = DaemonSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: selector_labels(&app),
                ..LabelSelector::default()
            },
            template: workload_pod_template(&name, &app, &template_options),
            ..DaemonSetSpec::default()
        }),
        ..DaemonSet::default()
    };
    let daemon_sets: Api<DaemonSet> = Api::namespaced(cx.k_client.clone(), namespace);
    daemon_sets
        .create(&PostParams::default(), &daemon_set)
        .await?;
    info!(name, namespace, "daemon set created");

    if status_wait {
        let resource = ResourceRef::namespaced("DaemonSet", name.clone(), namespace);
        wait_replicas_settled(&daemon_sets, &resource, cfg).await?;
    }
    Ok((name, app))
}

/// Verify one daemon pod landed on every schedulable node.
pub async fn check_daemonset(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    app: &str,
) -> Result<(), Error> {
    let nodes: Api<Node> = Api::all(cx.k_client.clone());
    let schedulable: BTreeSet<String> = nodes
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter(|node| {
            !node
                .spec
                .as_ref()
                .and_then(|spec| spec.unschedulable)
                .unwrap_or(false)
        })
        .filter_map(|node| node.metadata.name)
        .collect();

    let pods: Api<Pod> = Api::namespaced(cx.k_client.clone(), namespace);
    let selector = format!("app={app}");
    let covered: BTreeSet<String> = pods
        .list(&ListParams::default().labels(&selector))
        .await?
        .items
        .iter()
        .filter_map(|pod| pod.spec.as_ref().and_then(|spec| spec.node_name.clone()))
        .collect();

    let missing: Vec<String> = schedulable.difference(&covered).cloned().collect();
    if !missing.is_empty() {
        return Err(Error::DaemonCoverage { missing });
    }
    info!(namespace, app, nodes = schedulable.len(), "daemon set covers every node");
    Ok(())
}

/// Delete the daemon set and optionally wait for its termination.
pub async fn delete_daemonset(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let daemon_sets: Api<DaemonSet> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("DaemonSet", name, namespace);
    delete_and_wait(&daemon_sets, &resource, cfg, status_wait).await
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{NodeSpec, PodSpec};

    use super::*;
    use crate::stub::timeout_after_1s;

    fn node(name: &str, unschedulable: bool) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(NodeSpec {
                unschedulable: Some(unschedulable),
                ..NodeSpec::default()
            }),
            ..Node::default()
        }
    }

    fn daemon_pod(node_name: &str) -> Pod {
        Pod {
            spec: Some(PodSpec {
                node_name: Some(node_name.to_owned()),
                containers: vec![],
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    #[tokio::test]
    async fn coverage_check_ignores_unschedulable_nodes() {
        let (cx, mut server) = Context::test();

        let handle = tokio::spawn(async move {
            server
                .handle_list(
                    "GET",
                    "/api/v1/nodes",
                    vec![node("worker-0", false), node("tainted", true)],
                )
                .await
                .expect("node list should be served");
            server
                .handle_list(
                    "GET",
                    "/api/v1/namespaces/bench/pods",
                    vec![daemon_pod("worker-0")],
                )
                .await
                .expect("pod list should be served");
        });

        check_daemonset(cx, "bench", "kubench-app").await.unwrap();
        timeout_after_1s(handle).await;
    }

    #[tokio::test]
    async fn coverage_check_reports_the_uncovered_nodes() {
        let (cx, mut server) = Context::test();

        let handle = tokio::spawn(async move {
            server
                .handle_list(
                    "GET",
                    "/api/v1/nodes",
                    vec![node("worker-0", false), node("worker-1", false)],
                )
                .await
                .expect("node list should be served");
            server
                .handle_list(
                    "GET",
                    "/api/v1/namespaces/bench/pods",
                    vec![daemon_pod("worker-0")],
                )
                .await
                .expect("pod list should be served");
        });

        let err = check_daemonset(cx, "bench", "kubench-app")
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::DaemonCoverage { missing } if missing == vec!["worker-1".to_owned()])
        );
        timeout_after_1s(handle).await;
    }
}
