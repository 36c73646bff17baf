//! Daemon set scenario.

use std::sync::Arc;

use anyhow::Result;
use kubench_common::WaitConfig;
use kubench_engine::ops::daemon_set::{self, DaemonOptions};
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::ScenarioOpts;

/// Create a daemon set, verify it covers every schedulable node, delete it.
pub async fn create_check_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = DaemonOptions {
        image: opts.image.clone(),
        command: opts.command.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
    };
    let (name, app) =
        daemon_set::create_daemonset(cx.clone(), namespace, None, &options, wait, status_wait)
            .await?;
    daemon_set::check_daemonset(cx.clone(), namespace, &app).await?;
    daemon_set::delete_daemonset(cx, namespace, &name, wait, status_wait).await?;
    Ok(Vec::new())
}
