//! The `cleanup` subcommand: enumerate and delete everything carrying the
//! kubench discovery label, for recovery after an abnormal exit.

use std::fmt::Debug;

use anyhow::Result;
use clap::Args;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, PersistentVolume, PersistentVolumeClaim, Pod,
    ReplicationController, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client, Resource, ResourceExt};
use kubench_engine::labels::MANAGED_BY_LABEL_SELECTOR;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// Options to Cleanup command
#[derive(Args, Debug)]
pub struct Opts {
    /// Namespaces to sweep; labeled namespaces found in the cluster are
    /// always included. Repeat the flag per namespace.
    #[arg(long)]
    namespace: Vec<String>,
}

pub async fn cleanup(opts: Opts) -> Result<()> {
    let client = Client::try_default().await?;

    let namespaces: Api<Namespace> = Api::all(client.clone());
    let labeled: Vec<String> = namespaces
        .list(&ListParams::default().labels(MANAGED_BY_LABEL_SELECTOR))
        .await?
        .items
        .into_iter()
        .filter_map(|namespace| namespace.metadata.name)
        .collect();

    let mut targets = opts.namespace.clone();
    for name in &labeled {
        if !targets.contains(name) {
            targets.push(name.clone());
        }
    }

    for namespace in &targets {
        sweep_namespaced::<Pod>(&client, namespace).await?;
        sweep_namespaced::<Deployment>(&client, namespace).await?;
        sweep_namespaced::<ReplicaSet>(&client, namespace).await?;
        sweep_namespaced::<ReplicationController>(&client, namespace).await?;
        sweep_namespaced::<StatefulSet>(&client, namespace).await?;
        sweep_namespaced::<DaemonSet>(&client, namespace).await?;
        sweep_namespaced::<Job>(&client, namespace).await?;
        sweep_namespaced::<Service>(&client, namespace).await?;
        sweep_namespaced::<Endpoints>(&client, namespace).await?;
        sweep_namespaced::<ConfigMap>(&client, namespace).await?;
        sweep_namespaced::<Secret>(&client, namespace).await?;
        sweep_namespaced::<ServiceAccount>(&client, namespace).await?;
        sweep_namespaced::<PersistentVolumeClaim>(&client, namespace).await?;
    }

    sweep(&Api::<PersistentVolume>::all(client.clone())).await?;
    sweep(&Api::<StorageClass>::all(client.clone())).await?;
    // Namespaces go last, once their contents are already draining.
    sweep(&namespaces).await?;

    info!(namespaces = targets.len(), "cleanup sweep finished");
    Ok(())
}

async fn sweep_namespaced<K>(client: &Client, namespace: &str) -> Result<()>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    sweep(&api).await
}

/// Delete every listed object carrying the discovery label. Individual
/// delete failures are logged, not escalated; the sweep keeps going.
async fn sweep<K>(api: &Api<K>) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).into_owned();
    let selector = ListParams::default().labels(MANAGED_BY_LABEL_SELECTOR);
    for object in api.list(&selector).await?.items {
        let name = object.name_any();
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => info!(kind, name, "deleted leftover"),
            Err(kube::Error::Api(err)) if err.reason == "NotFound" => {}
            Err(err) => warn!(kind, name, %err, "failed to delete leftover"),
        }
    }
    Ok(())
}
