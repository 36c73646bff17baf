//! Namespace lifecycle: the Active-phase wait and termination to absence.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use kube::api::{ListParams, PostParams};
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::info;

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::managed_labels;
use crate::ops::{delete_and_wait, wait_phase};
use crate::poller::ResourceRef;
use crate::Error;

/// Create a namespace and optionally wait until its phase is `Active`.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_namespace(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: Option<String>,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    };
    let namespaces: Api<Namespace> = Api::all(cx.k_client.clone());
    namespaces.create(&PostParams::default(), &namespace).await?;
    info!(name, "namespace created");

    if status_wait {
        let resource = ResourceRef::cluster("Namespace", name.clone());
        wait_phase(&namespaces, &resource, "Active", cfg).await?;
    }
    Ok(name)
}

/// Delete a namespace and optionally wait for its full termination.
pub async fn delete_namespace(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let namespaces: Api<Namespace> = Api::all(cx.k_client.clone());
    let resource = ResourceRef::cluster("Namespace", name);
    delete_and_wait(&namespaces, &resource, cfg, status_wait).await
}

/// List the names of all namespaces visible to the client.
pub async fn list_namespaces(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
) -> Result<Vec<String>, Error> {
    let namespaces: Api<Namespace> = Api::all(cx.k_client.clone());
    Ok(namespaces
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter_map(|namespace| namespace.metadata.name)
        .collect())
}

/// Create a service account in `namespace`.
pub async fn create_serviceaccount(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: &str,
    namespace: &str,
) -> Result<(), Error> {
    let account = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        ..ServiceAccount::default()
    };
    let accounts: Api<ServiceAccount> = Api::namespaced(cx.k_client.clone(), namespace);
    accounts.create(&PostParams::default(), &account).await?;
    info!(name, namespace, "service account created");
    Ok(())
}
