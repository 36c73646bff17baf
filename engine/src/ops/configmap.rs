//! ConfigMap and Secret creation for volume-backed pods and service
//! accounts.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::info;

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::managed_labels;
use crate::ops::delete_and_wait;
use crate::poller::ResourceRef;
use crate::Error;

/// Create a config map holding `data`.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_configmap(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    data: BTreeMap<String, String>,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let config_map = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    };
    let config_maps: Api<ConfigMap> = Api::namespaced(cx.k_client.clone(), namespace);
    config_maps
        .create(&PostParams::default(), &config_map)
        .await?;
    info!(name, namespace, "config map created");
    Ok(name)
}

/// Delete the config map.
pub async fn delete_configmap(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let config_maps: Api<ConfigMap> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("ConfigMap", name, namespace);
    delete_and_wait(&config_maps, &resource, cfg, false).await
}

/// Create a token secret bound to the same-named service account.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_secret(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            annotations: Some(BTreeMap::from_iter(vec![(
                "kubernetes.io/service-account.name".to_owned(),
                name.clone(),
            )])),
            ..ObjectMeta::default()
        },
        ..Secret::default()
    };
    let secrets: Api<Secret> = Api::namespaced(cx.k_client.clone(), namespace);
    secrets.create(&PostParams::default(), &secret).await?;
    info!(name, namespace, "secret created");
    Ok(name)
}

/// Delete the secret.
pub async fn delete_secret(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let secrets: Api<Secret> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Secret", name, namespace);
    delete_and_wait(&secrets, &resource, cfg, false).await
}
