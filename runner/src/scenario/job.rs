//! Job scenario.

use std::sync::Arc;

use anyhow::Result;
use kubench_common::WaitConfig;
use kubench_engine::ops::job;
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::ScenarioOpts;

/// Create a job, wait for a succeeded completion, delete it.
pub async fn create_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let command = opts
        .command
        .clone()
        .unwrap_or_else(|| vec!["echo".to_owned(), "kubench".to_owned()]);
    let name = job::create_job(
        cx.clone(),
        namespace,
        None,
        &opts.image,
        command,
        wait,
        status_wait,
    )
    .await?;
    job::delete_job(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}
