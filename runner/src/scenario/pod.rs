//! Pod scenario: create, chart the condition timeline, delete.

use std::sync::Arc;

use anyhow::Result;
use kubench_common::WaitConfig;
use kubench_engine::events;
use kubench_engine::ops::pod::{self, PodOptions};
use kubench_engine::DefaultContext;

use crate::report::ChartEntry;
use crate::scenario::ScenarioOpts;

/// Create a pod, wait until it runs, derive the initialize/schedule/ready
/// intervals from its conditions, then delete it.
pub async fn create_and_delete(
    cx: Arc<DefaultContext>,
    namespace: &str,
    opts: &ScenarioOpts,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let options = PodOptions {
        image: opts.image.clone(),
        command: opts.command.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
        ..PodOptions::default()
    };
    let name = pod::create_pod(cx.clone(), namespace, None, &options, wait, status_wait).await?;

    let created = pod::get_pod(cx.clone(), namespace, &name).await?;
    let intervals = events::correlate_pod(&created)?;
    let entries = intervals
        .durations()
        .into_iter()
        .map(|(label, duration)| ChartEntry::new(label, duration))
        .collect();

    pod::delete_pod(cx, namespace, &name, wait, status_wait).await?;
    Ok(entries)
}
