//! Volume-backed pod scenarios, from emptyDir up to the full local-PV flow.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use k8s_openapi::api::core::v1::{
    NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, VolumeNodeAffinity,
};
use kubench_common::WaitConfig;
use kubench_engine::ops::configmap;
use kubench_engine::ops::pod::{self, PodOptions, PodVolume};
use kubench_engine::ops::volume::{self, LocalVolumeOptions};
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::ScenarioOpts;

async fn volume_pod(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
    volume: PodVolume,
    check: bool,
) -> Result<String> {
    let options = PodOptions {
        image: opts.image.clone(),
        command: opts.command.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
        volume: Some(volume),
        mount_path: Some(opts.mount_path.clone()),
        ..PodOptions::default()
    };
    let name = pod::create_pod(cx.clone(), namespace, None, &options, wait, status_wait).await?;
    if check {
        let check_cmd = opts
            .check_cmd
            .clone()
            .unwrap_or_else(|| vec!["ls".to_owned(), opts.mount_path.clone()]);
        pod::check_volume_pod_existence(cx, namespace, &name, &check_cmd).await?;
    }
    Ok(name)
}

/// Pod with an emptyDir volume, optionally exec-checked.
pub async fn emptydir(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
    check: bool,
) -> Result<Vec<ChartEntry>> {
    let name = volume_pod(
        cx.clone(),
        namespace,
        opts,
        wait,
        status_wait,
        PodVolume::EmptyDir,
        check,
    )
    .await?;
    pod::delete_pod(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Pod with a secret volume, optionally exec-checked.
pub async fn secret(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
    check: bool,
) -> Result<Vec<ChartEntry>> {
    let secret_name = configmap::create_secret(cx.clone(), namespace, None).await?;
    let name = volume_pod(
        cx.clone(),
        namespace,
        opts,
        wait,
        status_wait,
        PodVolume::Secret {
            secret_name: secret_name.clone(),
        },
        check,
    )
    .await?;
    pod::delete_pod(cx.clone(), namespace, &name, wait, status_wait).await?;
    configmap::delete_secret(cx, namespace, &secret_name, wait).await?;
    Ok(Vec::new())
}

/// Pod with a hostPath volume.
pub async fn host_path(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let name = volume_pod(
        cx.clone(),
        namespace,
        opts,
        wait,
        status_wait,
        PodVolume::HostPath {
            path: opts.volume_path.clone(),
            type_: "DirectoryOrCreate".to_owned(),
        },
        false,
    )
    .await?;
    pod::delete_pod(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Pod with a configMap volume, optionally exec-checked.
pub async fn config_map(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
    check: bool,
) -> Result<Vec<ChartEntry>> {
    let data = BTreeMap::from_iter(vec![(
        "test.txt".to_owned(),
        "kubench check file".to_owned(),
    )]);
    let config_map = configmap::create_configmap(cx.clone(), namespace, None, data).await?;
    let name = volume_pod(
        cx.clone(),
        namespace,
        opts,
        wait,
        status_wait,
        PodVolume::ConfigMap {
            name: config_map.clone(),
            subpath: None,
        },
        check,
    )
    .await?;
    pod::delete_pod(cx.clone(), namespace, &name, wait, status_wait).await?;
    configmap::delete_configmap(cx, namespace, &config_map, wait).await?;
    Ok(Vec::new())
}

/// Full local-PV flow: storage class → volume → claim → consuming pod, torn
/// down in reverse.
pub async fn local_pvc_pod(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let storage_class = volume::create_local_storageclass(cx.clone(), None).await?;
    let pv = volume::create_local_pv(
        cx.clone(),
        None,
        &LocalVolumeOptions {
            storage_class: storage_class.clone(),
            size: "1Gi".to_owned(),
            volume_mode: "Filesystem".to_owned(),
            local_path: opts.volume_path.clone(),
            access_modes: vec!["ReadWriteOnce".to_owned()],
            node_affinity: opts.node.as_deref().map(affinity_for_node),
        },
        wait,
        status_wait,
    )
    .await?;
    let claim = volume::create_local_pvc(
        cx.clone(),
        namespace,
        None,
        &storage_class,
        vec!["ReadWriteOnce".to_owned()],
        "1Gi",
    )
    .await?;

    let name = volume_pod(
        cx.clone(),
        namespace,
        opts,
        wait,
        status_wait,
        PodVolume::Pvc {
            claim_name: claim.clone(),
        },
        opts.check_cmd.is_some(),
    )
    .await?;

    volume::teardown_local_volume(cx, namespace, &name, &claim, &pv, &storage_class, wait).await?;
    Ok(Vec::new())
}

fn affinity_for_node(node: &str) -> VolumeNodeAffinity {
    VolumeNodeAffinity {
        required: Some(NodeSelector {
            node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: Some(vec![NodeSelectorRequirement {
                    key: "kubernetes.io/hostname".to_owned(),
                    operator: "In".to_owned(),
                    values: Some(vec![node.to_owned()]),
                }]),
                ..NodeSelectorTerm::default()
            }],
        }),
    }
}
