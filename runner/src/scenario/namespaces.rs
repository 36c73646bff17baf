//! Namespace scenarios.

use std::sync::Arc;

use anyhow::Result;
use kubench_common::WaitConfig;
use kubench_engine::ops::namespace;
use kubench_engine::DefaultContext;
use tracing::info;

use crate::report::ChartEntry;

/// Create a namespace, wait until it is Active, delete it and wait for its
/// termination.
pub async fn create_and_delete(
    cx: Arc<DefaultContext>,
    wait: &WaitConfig,
    status_wait: bool,
) -> Result<Vec<ChartEntry>> {
    let name = namespace::create_namespace(cx.clone(), None, wait, status_wait).await?;
    namespace::delete_namespace(cx, &name, wait, status_wait).await?;
    Ok(Vec::new())
}

/// List cluster namespaces.
pub async fn list(cx: Arc<DefaultContext>) -> Result<Vec<ChartEntry>> {
    let names = namespace::list_namespaces(cx).await?;
    info!(count = names.len(), "listed namespaces");
    Ok(Vec::new())
}
