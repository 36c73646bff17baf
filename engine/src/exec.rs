//! Remote command execution inside pods.
//!
//! The exec channel is a seam: lifecycle operations talk to it through the
//! [`PodExec`] trait so tests can script responses without a cluster.

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{api::AttachParams, Api, Client};
use tokio::io::AsyncReadExt;

/// Capability to run a command inside a running pod and collect its output.
#[async_trait]
pub trait PodExec {
    /// Run `command` in the pod's first container, returning the merged
    /// stdout/stderr output. A failure reported by the execution channel is
    /// appended to the output as an `exec failed: ...` line; transport
    /// failures are errors.
    async fn exec(&self, namespace: &str, pod: &str, command: &[String]) -> Result<String>;
}

/// Executes commands over the Kubernetes pod exec subresource.
pub struct KubeExec {
    client: Client,
}

impl KubeExec {
    /// Exec client borrowing the given API client handle.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodExec for KubeExec {
    async fn exec(&self, namespace: &str, pod: &str, command: &[String]) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(true);
        let mut attached = pods.exec(pod, command.to_vec(), &params).await?;

        let mut output = String::new();
        if let Some(mut stdout) = attached.stdout() {
            stdout.read_to_string(&mut output).await?;
        }
        if let Some(mut stderr) = attached.stderr() {
            stderr.read_to_string(&mut output).await?;
        }
        if let Some(status) = attached.take_status() {
            if let Some(status) = status.await {
                if status.status.as_deref() == Some("Failure") {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str("exec failed: ");
                    output.push_str(status.message.as_deref().unwrap_or("<no message>"));
                }
            }
        }
        attached.join().await?;
        Ok(output)
    }
}
