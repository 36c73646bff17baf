//! Tunables for convergence waits.
//!
//! A single [`WaitConfig`] value is threaded explicitly into every lifecycle
//! operation and poll loop. There is no process-global override; a benchmark
//! context builds one of these at its boundary and passes it down.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry budget and pacing for a status poll loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Sleep between two consecutive status reads. Zero is legal and means
    /// busy polling.
    pub poll_interval: Duration,
    /// Total number of status reads before the wait fails. Zero means the
    /// wait fails immediately without reading at all.
    pub retries_total: u32,
    /// Slept once before the first read, to let the API server catch up
    /// with a mutation that was just issued.
    pub prepoll_delay: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retries_total: 30,
            prepoll_delay: Duration::ZERO,
        }
    }
}

impl WaitConfig {
    /// Config with the given interval and budget and no pre-poll delay.
    pub fn new(poll_interval: Duration, retries_total: u32) -> Self {
        Self {
            poll_interval,
            retries_total,
            prepoll_delay: Duration::ZERO,
        }
    }

    /// Replace the pre-poll delay.
    pub fn with_prepoll_delay(mut self, delay: Duration) -> Self {
        self.prepoll_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_polls_every_second() {
        let cfg = WaitConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.retries_total, 30);
        assert_eq!(cfg.prepoll_delay, Duration::ZERO);
    }

    #[test]
    fn builder_sets_prepoll_delay() {
        let cfg = WaitConfig::new(Duration::from_millis(100), 5)
            .with_prepoll_delay(Duration::from_secs(2));
        assert_eq!(cfg.prepoll_delay, Duration::from_secs(2));
        assert_eq!(cfg.retries_total, 5);
    }
}
