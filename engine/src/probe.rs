//! Bounded-retry reachability checks against service endpoints.

use std::time::Duration;

use kubench_common::WaitConfig;
use tokio::time::sleep;
use tracing::debug;

use crate::Error;

/// Probe `url` with HTTP GET until anything answers.
///
/// Same retry discipline as the status poller, but the target condition is
/// reachability rather than object status: any HTTP response, whatever its
/// status code, is success; connection errors and timeouts consume an
/// attempt each.
pub async fn probe_http(
    client: &reqwest::Client,
    url: &str,
    request_timeout: Option<Duration>,
    cfg: &WaitConfig,
) -> Result<(), Error> {
    let mut last_error = String::from("<never attempted>");
    if cfg.retries_total > 0 {
        if !cfg.prepoll_delay.is_zero() {
            sleep(cfg.prepoll_delay).await;
        }
        for attempt in 1..=cfg.retries_total {
            let mut request = client.get(url);
            if let Some(timeout) = request_timeout {
                request = request.timeout(timeout);
            }
            match request.send().await {
                Ok(response) => {
                    debug!(url, status = %response.status(), "probe got a response");
                    return Ok(());
                }
                Err(err) => {
                    debug!(url, attempt, %err, "probe attempt failed");
                    last_error = err.to_string();
                }
            }
            if attempt < cfg.retries_total {
                sleep(cfg.poll_interval).await;
            }
        }
    }
    Err(Error::ProbeTimeout {
        url: url.to_owned(),
        attempts: cfg.retries_total,
        last_error,
    })
}
