//! Typed failures surfaced by lifecycle operations and waits.

use std::time::Duration;

use k8s_openapi::chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced by the engine.
///
/// Read errors inside a poll loop are never surfaced on their own; they
/// consume attempts until the budget runs out and the wait fails with
/// [`Error::ConvergenceTimeout`]. Errors from the mutating calls themselves
/// pass through as [`Error::Kube`] and are fatal immediately.
#[derive(Debug, Error)]
pub enum Error {
    /// The API server rejected or failed a call outside of a poll loop.
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    /// A bounded wait ran out of attempts before the target condition held.
    #[error(
        "{kind} {name:?} did not reach \"{desired}\" after {attempts} attempts \
         over {elapsed:?}; last observed: {last_observed}"
    )]
    ConvergenceTimeout {
        /// Kind of the polled resource.
        kind: &'static str,
        /// Name of the polled resource.
        name: String,
        /// Namespace, for namespaced kinds.
        namespace: Option<String>,
        /// The condition the wait was polling for.
        desired: String,
        /// Rendering of the last state the poll observed.
        last_observed: String,
        /// Attempts the budget allowed.
        attempts: u32,
        /// Wall-clock time spent waiting.
        elapsed: Duration,
    },

    /// Caller supplied a contradictory or empty set of arguments.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A selection was requested from an empty pool.
    #[error("selection pool is empty")]
    EmptyPool,

    /// A condition timeline produced an interval that ends before it starts.
    #[error("interval {interval} finishes at {finished_at} before it starts at {started_at}")]
    NegativeInterval {
        /// Name of the defective interval.
        interval: &'static str,
        /// Observed start transition.
        started_at: DateTime<Utc>,
        /// Observed finish transition.
        finished_at: DateTime<Utc>,
    },

    /// A connectivity probe exhausted its retry budget without any response.
    #[error("no response from {url} after {attempts} attempts: {last_error}")]
    ProbeTimeout {
        /// Probed URL.
        url: String,
        /// Attempts the budget allowed.
        attempts: u32,
        /// Rendering of the last connection failure.
        last_error: String,
    },

    /// The remote execution channel reported an explicit failure.
    #[error("exec check in pod {pod} failed: {output}")]
    ExecCheck {
        /// Pod the command ran in.
        pod: String,
        /// Merged command output.
        output: String,
    },

    /// The remote execution channel itself could not be established.
    #[error("exec transport error in pod {pod}: {source}")]
    ExecTransport {
        /// Pod the command was meant to run in.
        pod: String,
        /// Underlying transport failure.
        #[source]
        source: anyhow::Error,
    },

    /// A volume never mounted into its pod.
    #[error("volume failed to mount into pod {pod}")]
    VolumeMount {
        /// Pod the mount failed for.
        pod: String,
    },

    /// A daemon set left some schedulable nodes without a pod.
    #[error("daemon pods missing on nodes: {missing:?}")]
    DaemonCoverage {
        /// Nodes with no daemon pod.
        missing: Vec<String>,
    },
}
