//! Deployment lifecycle, including the single-change rollout contract.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::ObjectMeta;
use kube::Api;
use kubench_common::WaitConfig;
use rand::RngCore;
use tracing::info;

use crate::context::{Clock, Context};
use crate::exec::PodExec;
use crate::labels::{managed_labels, selector_labels};
use crate::ops::{delete_and_wait, scale, wait_ready_replicas};
use crate::poller::ResourceRef;
use crate::Error;

/// Spec fields for a deployment create.
#[derive(Clone, Debug, Default)]
pub struct DeploymentOptions {
    /// Container template image.
    pub image: String,
    /// Declared replica count.
    pub replicas: i32,
    /// Container template command, when the image has no entrypoint.
    pub command: Option<Vec<String>>,
    /// Override the default image pull policy.
    pub image_pull_policy: Option<String>,
    /// Container template environment.
    pub env: Option<Vec<EnvVar>>,
    /// Container template resource requirements.
    pub resources: Option<ResourceRequirements>,
}

/// One aspect of the pod template a rollout replaces.
///
/// Exactly one must be supplied per rollout; the fields are mutually
/// exclusive.
#[derive(Clone, Debug, Default)]
pub struct RolloutChanges {
    /// Replace the container image.
    pub image: Option<String>,
    /// Replace the container environment.
    pub env: Option<Vec<EnvVar>>,
    /// Replace the container resource requirements.
    pub resources: Option<ResourceRequirements>,
}

/// Create a deployment and optionally wait until every replica reports
/// ready.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_deployment(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    options: &DeploymentOptions,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let app = cx.generate_name();
    let deployment = Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(options.replicas),
            selector: LabelSelector {
                match_labels: selector_labels(&app),
                ..LabelSelector::default()
            },
            template: k8s_openapi::api::core::v1::PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(name.clone()),
                    labels: selector_labels(&app),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.clone(),
                        image: Some(options.image.clone()),
                        command: options.command.clone(),
                        image_pull_policy: options.image_pull_policy.clone(),
                        env: options.env.clone(),
                        resources: options.resources.clone(),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    };
    let deployments: Api<Deployment> = Api::namespaced(cx.k_client.clone(), namespace);
    deployments
        .create(&PostParams::default(), &deployment)
        .await?;
    info!(name, namespace, replicas = options.replicas, "deployment created");

    if status_wait {
        let resource = ResourceRef::namespaced("Deployment", name.clone(), namespace);
        wait_ready_replicas(&deployments, &resource, options.replicas, cfg).await?;
    }
    Ok(name)
}

/// Patch one aspect of the pod template and optionally wait for the rollout
/// to converge back to `replicas` ready.
///
/// Supplying zero or more than one change is a caller error, rejected
/// before any API call is made.
pub async fn rollout_deployment(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    changes: RolloutChanges,
    replicas: i32,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let supplied = [
        changes.image.is_some(),
        changes.env.is_some(),
        changes.resources.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if supplied != 1 {
        return Err(Error::InvalidArguments(
            "rollout changes must set exactly one of image, env, resources".to_owned(),
        ));
    }

    let deployments: Api<Deployment> = Api::namespaced(cx.k_client.clone(), namespace);
    let mut deployment = deployments.get(name).await?;
    let container = deployment
        .spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
        .and_then(|pod| pod.containers.first_mut())
        .ok_or_else(|| {
            Error::InvalidArguments(format!("deployment {name} has no container to roll out"))
        })?;
    if let Some(image) = changes.image {
        container.image = Some(image);
    } else if let Some(env) = changes.env {
        container.env = Some(env);
    } else if let Some(resources) = changes.resources {
        container.resources = Some(resources);
    }

    deployments
        .patch(name, &PatchParams::default(), &Patch::Merge(&deployment))
        .await?;
    info!(name, namespace, "deployment rollout issued");

    if status_wait {
        let resource = ResourceRef::namespaced("Deployment", name, namespace);
        wait_ready_replicas(&deployments, &resource, replicas, cfg).await?;
    }
    Ok(())
}

/// Scale the deployment and optionally wait for the new target.
pub async fn scale_deployment(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    replicas: i32,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let deployments: Api<Deployment> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Deployment", name, namespace);
    scale(&deployments, &resource, replicas, cfg, status_wait).await
}

/// Delete the deployment and optionally wait for its termination.
pub async fn delete_deployment(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let deployments: Api<Deployment> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Deployment", name, namespace);
    delete_and_wait(&deployments, &resource, cfg, status_wait).await
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::DeploymentStatus;

    use super::*;
    use crate::stub::timeout_after_1s;

    fn changes_image() -> RolloutChanges {
        RolloutChanges {
            image: Some("busybox:1.36".to_owned()),
            ..RolloutChanges::default()
        }
    }

    fn changes_env() -> RolloutChanges {
        RolloutChanges {
            env: Some(vec![EnvVar {
                name: "MODE".to_owned(),
                value: Some("bench".to_owned()),
                ..EnvVar::default()
            }]),
            ..RolloutChanges::default()
        }
    }

    #[tokio::test]
    async fn rollout_with_multiple_changes_fails_before_any_api_call() {
        let (cx, server) = Context::test();
        // Dropping the handle closes the mock service: any request the
        // rollout issued would surface as a kube transport error instead of
        // the argument error asserted here.
        drop(server);

        let changes = RolloutChanges {
            image: changes_image().image,
            env: changes_env().env,
            ..RolloutChanges::default()
        };
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 1);
        let err = rollout_deployment(cx, "bench", "kubench-dep", changes, 2, &cfg, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)), "{err:?}");
    }

    #[tokio::test]
    async fn rollout_with_no_changes_fails_before_any_api_call() {
        let (cx, server) = Context::test();
        drop(server);

        let cfg = WaitConfig::new(std::time::Duration::ZERO, 1);
        let err = rollout_deployment(
            cx,
            "bench",
            "kubench-dep",
            RolloutChanges::default(),
            2,
            &cfg,
            true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)), "{err:?}");
    }

    #[tokio::test]
    async fn rollout_patches_the_image_and_waits_for_convergence() {
        let (cx, mut server) = Context::test();
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 3);

        let current = Deployment {
            metadata: ObjectMeta {
                name: Some("kubench-dep".to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                template: k8s_openapi::api::core::v1::PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "kubench-dep".to_owned(),
                            image: Some("busybox:1.35".to_owned()),
                            ..Container::default()
                        }],
                        ..PodSpec::default()
                    }),
                    ..Default::default()
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        };
        let converged = Deployment {
            status: Some(DeploymentStatus {
                replicas: Some(2),
                ready_replicas: Some(2),
                ..DeploymentStatus::default()
            }),
            ..Deployment::default()
        };

        let path = "/apis/apps/v1/namespaces/bench/deployments/kubench-dep";
        let handle = tokio::spawn(async move {
            server
                .handle("GET", path, &current.clone())
                .await
                .expect("read should be served");
            let body = server
                .handle_and_return_body("PATCH", path)
                .await
                .expect("patch should be issued");
            assert!(body.contains("busybox:1.36"), "{body}");
            assert!(!body.contains("busybox:1.35"), "{body}");
            server
                .handle("GET", path, &converged)
                .await
                .expect("status read should be served");
        });

        rollout_deployment(cx, "bench", "kubench-dep", changes_image(), 2, &cfg, true)
            .await
            .unwrap();
        timeout_after_1s(handle).await;
    }
}
