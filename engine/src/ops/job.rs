//! Job lifecycle: run-to-completion workloads.

use std::sync::Arc;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
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
use crate::poller::{wait_until, Attempt, ResourceRef};
use crate::Error;

/// Create a job (restart policy `Never`) and optionally wait until it has
/// at least one succeeded completion.
///
/// Returns the resolved name (generated when `name` is `None`).
pub async fn create_job(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: Option<String>,
    image: &str,
    command: Vec<String>,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<String, Error> {
    let name = name.unwrap_or_else(|| cx.generate_name());
    let job = Job {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: managed_labels(),
            ..ObjectMeta::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(name.clone()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_owned()),
                    containers: vec![Container {
                        name: name.clone(),
                        image: Some(image.to_owned()),
                        command: Some(command),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..JobSpec::default()
        }),
        ..Job::default()
    };
    let jobs: Api<Job> = Api::namespaced(cx.k_client.clone(), namespace);
    jobs.create(&PostParams::default(), &job).await?;
    info!(name, namespace, "job created");

    if status_wait {
        let resource = ResourceRef::namespaced("Job", name.clone(), namespace);
        wait_job_succeeded(&jobs, &resource, cfg).await?;
    }
    Ok(name)
}

/// Delete the job and optionally wait for its termination.
pub async fn delete_job(
    cx: Arc<Context<impl PodExec, impl RngCore, impl Clock>>,
    namespace: &str,
    name: &str,
    cfg: &WaitConfig,
    status_wait: bool,
) -> Result<(), Error> {
    let jobs: Api<Job> = Api::namespaced(cx.k_client.clone(), namespace);
    let resource = ResourceRef::namespaced("Job", name, namespace);
    delete_and_wait(&jobs, &resource, cfg, status_wait).await
}

async fn wait_job_succeeded(
    api: &Api<Job>,
    resource: &ResourceRef,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let api = api.clone();
    let name = resource.name.clone();
    wait_until(resource, "at least one succeeded pod", cfg, move || {
        let api = api.clone();
        let name = name.clone();
        async move {
            let job = api.get(&name).await?;
            let succeeded = job
                .status
                .as_ref()
                .and_then(|status| status.succeeded)
                .unwrap_or(0);
            Ok(if succeeded > 0 {
                Attempt::Converged
            } else {
                Attempt::Pending(format!("{succeeded} succeeded"))
            })
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::batch::v1::JobStatus;

    use super::*;
    use crate::stub::timeout_after_1s;

    #[tokio::test]
    async fn create_waits_for_a_succeeded_completion() {
        let (cx, mut server) = Context::test();
        let cfg = WaitConfig::new(std::time::Duration::ZERO, 3);

        let succeeded = Job {
            status: Some(JobStatus {
                succeeded: Some(1),
                ..JobStatus::default()
            }),
            ..Job::default()
        };

        let handle = tokio::spawn(async move {
            let body = server
                .handle_and_return_body("POST", "/apis/batch/v1/namespaces/bench/jobs")
                .await
                .expect("create should be issued");
            assert!(body.contains("\"restartPolicy\":\"Never\""));
            server
                .handle(
                    "GET",
                    "/apis/batch/v1/namespaces/bench/jobs/kubench-job",
                    &Job::default(),
                )
                .await
                .expect("first read should be served");
            server
                .handle(
                    "GET",
                    "/apis/batch/v1/namespaces/bench/jobs/kubench-job",
                    &succeeded,
                )
                .await
                .expect("second read should be served");
        });

        create_job(
            cx,
            "bench",
            Some("kubench-job".to_owned()),
            "appropriate/curl",
            vec!["curl".to_owned(), "10.0.0.1:80".to_owned()],
            &cfg,
            true,
        )
        .await
        .unwrap();
        timeout_after_1s(handle).await;
    }
}
