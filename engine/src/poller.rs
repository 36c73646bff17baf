//! Bounded-retry convergence polling.

use std::future::Future;
use std::time::{Duration, Instant};

use kubench_common::WaitConfig;
use tokio::time::sleep;
use tracing::debug;

use crate::Error;

/// Identifies the cluster object a wait is polling, for error reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRef {
    /// Kubernetes kind, e.g. `Pod`.
    pub kind: &'static str,
    /// Object name.
    pub name: String,
    /// Namespace for namespaced kinds, `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// Reference to a namespaced object.
    pub fn namespaced(
        kind: &'static str,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Reference to a cluster-scoped object.
    pub fn cluster(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }
}

/// Outcome of one convergence check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attempt {
    /// The target condition holds; the wait is over.
    Converged,
    /// Not converged yet; carries a short rendering of the observed state.
    Pending(String),
}

/// Poll `check` until it reports convergence or the retry budget is spent.
///
/// The schedule is: sleep `prepoll_delay` once, then up to `retries_total`
/// checks with `poll_interval` between them. A zero budget fails immediately
/// without checking or sleeping; a zero interval busy-polls.
///
/// Error policy is uniform: every failed read consumes one attempt and is
/// retried — the check decides which errors mean success instead (absence
/// waits map not-found to [`Attempt::Converged`] before the error reaches
/// this loop). Only an exhausted budget fails the wait, as
/// [`Error::ConvergenceTimeout`] carrying the last observed state.
///
/// Cancellation is the caller's: dropping the returned future aborts any
/// in-flight sleep promptly, and nothing here spawns detached work.
pub async fn wait_until<F, Fut>(
    resource: &ResourceRef,
    desired: &str,
    cfg: &WaitConfig,
    mut check: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt, kube::Error>>,
{
    let started = Instant::now();
    let mut last_observed = String::from("<never read>");
    if cfg.retries_total > 0 {
        if !cfg.prepoll_delay.is_zero() {
            sleep(cfg.prepoll_delay).await;
        }
        for attempt in 1..=cfg.retries_total {
            match check().await {
                Ok(Attempt::Converged) => return Ok(()),
                Ok(Attempt::Pending(observed)) => {
                    debug!(
                        kind = resource.kind,
                        name = %resource.name,
                        attempt,
                        %observed,
                        "not converged yet"
                    );
                    last_observed = observed;
                }
                Err(err) => {
                    // A failed read consumes an attempt like any other miss;
                    // only the exhausted budget fails the wait.
                    debug!(
                        kind = resource.kind,
                        name = %resource.name,
                        attempt,
                        %err,
                        "status read failed"
                    );
                    last_observed = format!("read error: {err}");
                }
            }
            if attempt < cfg.retries_total {
                sleep(cfg.poll_interval).await;
            }
        }
    }
    Err(convergence_timeout(
        resource,
        desired,
        last_observed,
        cfg.retries_total,
        started.elapsed(),
    ))
}

pub(crate) fn convergence_timeout(
    resource: &ResourceRef,
    desired: &str,
    last_observed: String,
    attempts: u32,
    elapsed: Duration,
) -> Error {
    Error::ConvergenceTimeout {
        kind: resource.kind,
        name: resource.name.clone(),
        namespace: resource.namespace.clone(),
        desired: desired.to_owned(),
        last_observed,
        attempts,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn cfg(retries_total: u32) -> WaitConfig {
        WaitConfig {
            poll_interval: Duration::from_millis(10),
            retries_total,
            prepoll_delay: Duration::ZERO,
        }
    }

    fn resource() -> ResourceRef {
        ResourceRef::namespaced("Pod", "kubench-test", "default")
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_with_exactly_k_reads_when_predicate_turns_true_on_the_kth() {
        for k in 1..=5u32 {
            let reads = Arc::new(AtomicU32::new(0));
            let counter = reads.clone();
            let result = wait_until(&resource(), "Running", &cfg(5), move || {
                let counter = counter.clone();
                async move {
                    let read = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(if read == k {
                        Attempt::Converged
                    } else {
                        Attempt::Pending("Pending".to_owned())
                    })
                }
            })
            .await;
            assert!(result.is_ok());
            assert_eq!(reads.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_exactly_the_budget_when_predicate_never_turns_true() {
        let reads = Arc::new(AtomicU32::new(0));
        let counter = reads.clone();
        let err = wait_until(&resource(), "Running", &cfg(7), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Attempt::Pending("Pending".to_owned()))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(reads.load(Ordering::SeqCst), 7);
        match err {
            Error::ConvergenceTimeout {
                kind,
                name,
                desired,
                last_observed,
                attempts,
                ..
            } => {
                assert_eq!(kind, "Pod");
                assert_eq!(name, "kubench-test");
                assert_eq!(desired, "Running");
                assert_eq!(last_observed, "Pending");
                assert_eq!(attempts, 7);
            }
            other => panic!("expected convergence timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_fails_immediately_without_reading_or_sleeping() {
        let reads = Arc::new(AtomicU32::new(0));
        let counter = reads.clone();
        let mut budget = cfg(0);
        budget.prepoll_delay = Duration::from_secs(3600);
        let before = tokio::time::Instant::now();
        let err = wait_until(&resource(), "Running", &budget, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Attempt::Pending("Pending".to_owned()))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(tokio::time::Instant::now(), before);
        assert!(matches!(err, Error::ConvergenceTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_are_retried_within_the_budget() {
        let reads = Arc::new(AtomicU32::new(0));
        let counter = reads.clone();
        let result = wait_until(&resource(), "Running", &cfg(5), move || {
            let counter = counter.clone();
            async move {
                let read = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if read < 3 {
                    Err(kube::Error::Api(kube::error::ErrorResponse {
                        status: "Failure".to_owned(),
                        message: "etcd leader changed".to_owned(),
                        reason: "ServiceUnavailable".to_owned(),
                        code: 503,
                    }))
                } else {
                    Ok(Attempt::Converged)
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_surface_in_the_timeout() {
        let err = wait_until(&resource(), "Running", &cfg(2), move || async move {
            Err(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_owned(),
                message: "boom".to_owned(),
                reason: "InternalError".to_owned(),
                code: 500,
            }))
        })
        .await
        .unwrap_err();
        match err {
            Error::ConvergenceTimeout { last_observed, .. } => {
                assert!(last_observed.starts_with("read error:"), "{last_observed}");
            }
            other => panic!("expected convergence timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_wait_future_cancels_promptly() {
        let budget = WaitConfig::new(Duration::from_secs(60), 1000);
        let resource = resource();
        let wait = wait_until(&resource, "Running", &budget, move || async move {
            Ok(Attempt::Pending("Pending".to_owned()))
        });
        tokio::pin!(wait);
        let outcome = tokio::select! {
            _ = &mut wait => "finished",
            _ = tokio::time::sleep(Duration::from_secs(90)) => "cancelled",
        };
        // The wait had ~16 hours of budget left; the caller's select dropped
        // it mid-sleep instead.
        assert_eq!(outcome, "cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_does_not_sleep_beyond_the_prepoll_delay() {
        let mut budget = cfg(10);
        budget.prepoll_delay = Duration::from_secs(2);
        budget.poll_interval = Duration::from_secs(60);
        let before = tokio::time::Instant::now();
        wait_until(&resource(), "absence", &budget, move || async move {
            Ok(Attempt::Converged)
        })
        .await
        .unwrap();
        assert_eq!(
            tokio::time::Instant::now().duration_since(before),
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn prepoll_delay_is_slept_exactly_once() {
        let mut budget = cfg(3);
        budget.prepoll_delay = Duration::from_secs(5);
        budget.poll_interval = Duration::from_secs(1);
        let before = tokio::time::Instant::now();
        let _ = wait_until(&resource(), "Running", &budget, move || async move {
            Ok(Attempt::Pending("Pending".to_owned()))
        })
        .await;
        // One pre-poll sleep plus two inter-attempt sleeps.
        assert_eq!(
            tokio::time::Instant::now().duration_since(before),
            Duration::from_secs(5 + 2)
        );
    }
}
