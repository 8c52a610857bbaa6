//! Failure backoff shared by every worker and watcher.

use std::time::Duration;

use crate::infrastructure::config::timing::BackoffConfig;

/// Consecutive-failure counter and the wait it implies.
///
/// Not synchronised; the service only touches it under its state lock.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max_doublings: u32,
    failures: u32,
    wait: Option<Duration>,
}

impl Backoff {
    #[must_use]
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_ms),
            max_doublings: config.max_doublings,
            failures: 0,
            wait: None,
        }
    }

    /// Record a failed exchange with the server.
    pub fn on_failure(&mut self) {
        if self.failures < self.max_doublings {
            self.failures += 1;
        }
        self.recompute();
    }

    /// Record a successful exchange; clears any wait.
    pub fn on_success(&mut self) {
        self.failures = 0;
        self.recompute();
    }

    #[must_use]
    pub fn should_wait(&self) -> bool {
        self.wait.is_some()
    }

    /// Wait required before the next request, if any.
    #[must_use]
    pub fn wait_time(&self) -> Option<Duration> {
        self.wait
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn recompute(&mut self) {
        self.wait = match self.failures {
            0 => None,
            n => {
                let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
                Some(self.initial.saturating_mul(factor))
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(initial_ms: u64, max_doublings: u32) -> Backoff {
        Backoff::new(&BackoffConfig {
            initial_ms,
            max_doublings,
        })
    }

    #[test]
    fn starts_without_wait() {
        let backoff = backoff(1000, 10);
        assert!(!backoff.should_wait());
        assert_eq!(backoff.wait_time(), None);
    }

    #[test]
    fn wait_doubles_per_failure() {
        let mut backoff = backoff(1000, 10);
        for k in 1..=10u32 {
            backoff.on_failure();
            assert_eq!(
                backoff.wait_time(),
                Some(Duration::from_millis(1000 << (k - 1))),
                "after {k} failures"
            );
        }
    }

    #[test]
    fn failures_stop_at_max_doublings() {
        let mut backoff = backoff(1000, 3);
        for _ in 0..8 {
            backoff.on_failure();
        }
        assert_eq!(backoff.failures(), 3);
        assert_eq!(backoff.wait_time(), Some(Duration::from_millis(4000)));
    }

    #[test]
    fn success_always_clears_wait() {
        let mut backoff = backoff(250, 10);
        for _ in 0..7 {
            backoff.on_failure();
        }
        backoff.on_success();
        assert_eq!(backoff.failures(), 0);
        assert!(!backoff.should_wait());
    }
}
