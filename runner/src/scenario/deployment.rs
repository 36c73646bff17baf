//! Deployment scenarios.

use std::sync::Arc;

use anyhow::Result;
use k8s_openapi::api::core::v1::EnvVar;
use kubench_common::WaitConfig;
use kubench_engine::ops::deployment::{self, DeploymentOptions, RolloutChanges};
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::ScenarioOpts;

fn deployment_options(opts: &ScenarioOpts) -> DeploymentOptions {
    DeploymentOptions {
        image: opts.image.clone(),
        replicas: opts.replicas,
        command: opts.command.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
        ..DeploymentOptions::default()
    }
}

/// Create a deployment, wait ready, delete it.
pub async fn create_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = deployment_options(opts);
    let name =
        deployment::create_deployment(cx.clone(), namespace, None, &options, wait, status_wait)
            .await?;
    deployment::delete_deployment(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// Create a deployment, roll its pod template once, delete it.
pub async fn create_rollout_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = deployment_options(opts);
    let name =
        deployment::create_deployment(cx.clone(), namespace, None, &options, wait, status_wait)
            .await?;

    // An env replacement rolls the template without needing a second image.
    let changes = RolloutChanges {
        env: Some(vec![EnvVar {
            name: "KUBENCH_ROLLOUT".to_owned(),
            value: Some("1".to_owned()),
            ..EnvVar::default()
        }]),
        ..RolloutChanges::default()
    };
    deployment::rollout_deployment(
        cx.clone(),
        namespace,
        &name,
        changes,
        opts.replicas,
        wait,
        status_wait,
    )
    .await?;

    deployment::delete_deployment(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}
