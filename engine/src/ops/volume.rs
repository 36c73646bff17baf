//! Local persistent-volume plumbing: storage class, volume, claim, and the
//! reverse teardown sequence.
//!
//! The create order is storage class → persistent volume → claim → consuming
//! pod. The volume waits for `Available`/`Released`; the claim has no
//! explicit wait — with `WaitForFirstConsumer` binding its convergence is
//! observed indirectly through the consuming pod reaching `Running`.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{
    LocalVolumeSource, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeSpec, Pod, ResourceRequirements, VolumeNodeAffinity,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::{info, warn};

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::managed_labels;
use crate::ops::pod::delete_pod;
use crate::ops::{delete_and_wait, wait_phase_in, PhaseReport};
use crate::poller::ResourceRef;
use crate::Error;

/// Create the no-provisioner storage class local volumes bind through.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_local_storageclass(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: Option<String>,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let storage_class = StorageClass {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        provisioner: "kubernetes.io/no-provisioner".to_owned(),
        volume_binding_mode: Some("WaitForFirstConsumer".to_owned()),
        ..StorageClass::default()
    };
    let storage_classes: Api<StorageClass> = Api::all(cx.k_client.clone());
    storage_classes
        .create(&PostParams::default(), &storage_class)
        .await?;
    info!(name, "local storage class created");
    Ok(name)
}

/// Delete the storage class. It has no status to wait on.
pub async fn delete_local_storageclass(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: &str,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let storage_classes: Api<StorageClass> = Api::all(cx.k_client.clone());
    let resource = ResourceRef::cluster("StorageClass", name);
    delete_and_wait(&storage_classes, &resource, cfg, false).await
}

/// Spec fields for a local persistent volume.
#[derive(Clone, Debug, Default)]
pub struct LocalVolumeOptions {
    /// Storage class the volume and its claim bind through.
    pub storage_class: String,
    /// Capacity, e.g. `1Gi`.
    pub size: String,
    /// `Filesystem` or `Block`.
    pub volume_mode: String,
    /// Backing path on the node.
    pub local_path: String,
    /// Access modes, e.g. `ReadWriteOnce`.
    pub access_modes: Vec<String>,
    /// Node the volume is pinned to. Local volumes require one.
    pub node_affinity: Option<VolumeNodeAffinity>,
}

/// Create a local persistent volume and optionally wait until its phase is
/// `Available` or `Released`.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_local_pv(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: Option<String>,
    options: &LocalVolumeOptions,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let volume = PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeSpec {
            capacity: Some(BTreeMap::from_iter(vec![(
                "storage".to_owned(),
                Quantity(options.size.clone()),
            )])),
            volume_mode: Some(options.volume_mode.clone()),
            access_modes: Some(options.access_modes.clone()),
            persistent_volume_reclaim_policy: Some("Retain".to_owned()),
            storage_class_name: Some(options.storage_class.clone()),
            local: Some(LocalVolumeSource {
                path: options.local_path.clone(),
                fs_type: None,
            }),
            node_affinity: options.node_affinity.clone(),
            ..PersistentVolumeSpec::default()
        }),
        ..PersistentVolume::default()
    };
    let volumes: Api<PersistentVolume> = Api::all(cx.k_client.clone());
    volumes.create(&PostParams::default(), &volume).await?;
    info!(name, "local persistent volume created");

    if status_wait {
        let resource = ResourceRef::cluster("PersistentVolume", name.clone());
        wait_phase_in(&volumes, &resource, &["Available", "Released"], cfg).await?;
    }
    Ok(name)
}

/// Delete the persistent volume and optionally wait for its termination.
pub async fn delete_local_pv(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let volumes: Api<PersistentVolume> = Api::all(cx.k_client.clone());
    let resource = ResourceRef::cluster("PersistentVolume", name);
    delete_and_wait(&volumes, &resource, cfg, status_wait).await
}

/// Create a claim against the storage class. No wait: with
/// `WaitForFirstConsumer` the claim stays `Pending` until a pod consumes it.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_local_pvc(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    storage_class: &str,
    access_modes: Vec<String>,
    size: &str,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let claim = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(access_modes),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from_iter(vec![(
                    "storage".to_owned(),
                    Quantity(size.to_owned()),
                )])),
                ..ResourceRequirements::default()
            }),
            storage_class_name: Some(storage_class.to_owned()),
            ..PersistentVolumeClaimSpec::default()
        }),
        ..PersistentVolumeClaim::default()
    };
    let claims: Api<PersistentVolumeClaim> = Api::namespaced(cx.k_client.clone(), namespace);
    claims.create(&PostParams::default(), &claim).await?;
    info!(name, namespace, "persistent volume claim created");
    Ok(name)
}

/// Delete the claim and optionally wait for its termination.
pub async fn delete_local_pvc(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let claims: Api<PersistentVolumeClaim> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("PersistentVolumeClaim", name, namespace);
    delete_and_wait(&claims, &resource, cfg, status_wait).await
}

/// Tear down the four-object local volume sequence in reverse.
///
/// A `Failed` phase observed along the way is surfaced as a warning, not an
/// error; the teardown keeps going.
pub async fn teardown_local_volume(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    pod: &str,
    claim: &str,
    volume: &str,
    storage_class: &str,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let pods: Api<Pod> = Api::namespaced(cx.k_client.clone(), namespace);
    warn_if_failed("Pod", pod, pods.get(pod).await.as_ref().ok());
    delete_pod(cx.clone(), namespace, pod, cfg, true).await?;

    let claims: Api<PersistentVolumeClaim> = Api::namespaced(cx.k_client.clone(), namespace);
    warn_if_failed("PersistentVolumeClaim", claim, claims.get(claim).await.as_ref().ok());
    delete_local_pvc(cx.clone(), namespace, claim, cfg, true).await?;

    let volumes: Api<PersistentVolume> = Api::all(cx.k_client.clone());
    warn_if_failed("PersistentVolume", volume, volumes.get(volume).await.as_ref().ok());
    delete_local_pv(cx.clone(), volume, cfg, true).await?;

    delete_local_storageclass(cx, storage_class, cfg).await
}

fn warn_if_failed<K: PhaseReport>(kind: &str, name: &str, object: Option<&K>) {
    if let Some(object) = object {
        if object.phase() == Some("Failed") {
            warn!(kind, name, "object is in Failed phase during teardown");
        }
    }
}
