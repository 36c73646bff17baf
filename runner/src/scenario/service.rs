//! Service scenarios: endpoint resolution and connectivity checks.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use kubench_common::WaitConfig;
use kubench_engine::labels::selector_labels;
use kubench_engine::ops::pod::{self, PodOptions};
use kubench_engine::ops::service::{self, ServiceKind};
use kubench_engine::ops::job;
use kubench_engine::probe;
use kubench_engine::DefaultContext;
use tokio::time::sleep;
use tracing::info;

use crate::report::ChartEntry;
use crate::scenario::ScenarioOpts;

const CURL_IMAGE: &str = "appropriate/curl";

fn service_pod_options(opts: &ScenarioOpts, labels: Option<std::collections::BTreeMap<String, String>>) -> PodOptions {
    PodOptions {
        image: opts.image.clone(),
        command: opts.command.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
        port: Some(opts.port),
        protocol: Some("TCP".to_owned()),
        labels,
        ..PodOptions::default()
    }
}

/// Pod behind a ClusterIP service: resolve the endpoints and curl them from
/// an in-cluster job.
pub async fn pod_with_cluster_ip_service(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let app = cx.generate_name();
    let labels = selector_labels(&app);

    let name = pod::create_pod(
        cx.clone(),
        namespace,
        None,
        &service_pod_options(opts, labels.clone()),
        wait,
        status_wait,
    )
    .await?;
    service::create_service(
        cx.clone(),
        namespace,
        &name,
        opts.port,
        Some("TCP".to_owned()),
        ServiceKind::ClusterIp,
        labels,
    )
    .await?;

    // Endpoint propagation has the same lag create does; reuse the pre-poll
    // delay before resolving.
    sleep(wait.prepoll_delay).await;

    let backends = service::get_endpoints(cx.clone(), namespace, &name).await?;
    if backends.is_empty() {
        bail!("service {name} resolved to no endpoints");
    }
    info!(%name, ?backends, "resolved service endpoints");

    let mut command = vec!["curl".to_owned()];
    command.extend(backends);
    let checker = job::create_job(cx.clone(), namespace, None, CURL_IMAGE, command, wait, true).await?;

    job::delete_job(cx.clone(), namespace, &checker, wait, status_wait).await?;
    service::delete_service(cx.clone(), namespace, &name, wait).await?;
    pod::delete_pod(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Pod behind a selector-less ClusterIP service pointed at the pod's IP via
/// a hand-made endpoints object.
pub async fn pod_with_custom_endpoints(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let name = pod::create_pod(
        cx.clone(),
        namespace,
        None,
        &service_pod_options(opts, None),
        wait,
        status_wait,
    )
    .await?;
    service::create_service(
        cx.clone(),
        namespace,
        &name,
        opts.port,
        Some("TCP".to_owned()),
        ServiceKind::ClusterIp,
        None,
    )
    .await?;

    let created = pod::get_pod(cx.clone(), namespace, &name).await?;
    let ip = created
        .status
        .and_then(|status| status.pod_ip)
        .ok_or_else(|| anyhow!("pod {name} has no IP yet"))?;
    service::create_endpoints(cx.clone(), namespace, &name, &ip, opts.port).await?;

    let command = vec!["curl".to_owned(), format!("{ip}:{}", opts.port)];
    let checker = job::create_job(cx.clone(), namespace, None, CURL_IMAGE, command, wait, true).await?;

    job::delete_job(cx.clone(), namespace, &checker, wait, status_wait).await?;
    service::delete_endpoints(cx.clone(), namespace, &name, wait).await?;
    service::delete_service(cx.clone(), namespace, &name, wait).await?;
    pod::delete_pod(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Pod behind a NodePort service, probed over HTTP from where the runner
/// sits.
pub async fn pod_with_node_port_service(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let app = cx.generate_name();
    let labels = selector_labels(&app);

    let name = pod::create_pod(
        cx.clone(),
        namespace,
        None,
        &service_pod_options(opts, labels.clone()),
        wait,
        status_wait,
    )
    .await?;
    service::create_service(
        cx.clone(),
        namespace,
        &name,
        opts.port,
        Some("TCP".to_owned()),
        ServiceKind::NodePort,
        labels,
    )
    .await?;

    let created = service::get_service(cx.clone(), namespace, &name).await?;
    let node_port = service::node_port(&created)
        .ok_or_else(|| anyhow!("service {name} has no node port allocated"))?;
    let host = opts
        .cluster_host
        .as_deref()
        .ok_or_else(|| anyhow!("cluster host unknown; cannot reach the node port"))?;
    let url = format!("http://{host}:{node_port}/");

    let client = reqwest::Client::new();
    probe::probe_http(&client, &url, opts.request_timeout, wait).await?;

    service::delete_service(cx.clone(), namespace, &name, wait).await?;
    pod::delete_pod(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}
