//! Adaptive event-wait poll length.
//!
//! The tuner looks for the longest poll the network path will hold open.
//! A socket timeout means the path dropped the request before the server
//! answered, so the length shrinks at once. A server timeout means the poll
//! ran its full course; the length grows, but only once no socket timeout
//! has been seen for the growth pause.

use std::time::{Duration, Instant};

use crate::infrastructure::config::timing::CometConfig;

#[derive(Debug, Clone)]
pub struct PollTuner {
    initial: u64,
    min: u64,
    max: u64,
    increment: u64,
    decrement: u64,
    growth_pause: Duration,
    current: u64,
    accumulated_decrement: u64,
    last_socket_timeout: Option<Instant>,
}

impl PollTuner {
    #[must_use]
    pub fn new(config: &CometConfig) -> Self {
        Self {
            initial: config.initial_poll_ms,
            min: config.min_poll_ms,
            max: config.max_poll_ms,
            increment: config.increment_ms,
            decrement: config.decrement_ms,
            growth_pause: Duration::from_millis(config.growth_pause_ms),
            current: config.initial_poll_ms,
            accumulated_decrement: 0,
            last_socket_timeout: None,
        }
    }

    /// Poll length to ask the server for.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.current)
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.current
    }

    pub fn on_socket_timeout(&mut self) {
        self.on_socket_timeout_at(Instant::now());
    }

    pub fn on_server_timeout(&mut self) {
        self.on_server_timeout_at(Instant::now());
    }

    pub(crate) fn on_socket_timeout_at(&mut self, now: Instant) {
        self.accumulated_decrement = self.accumulated_decrement.saturating_add(self.decrement);
        self.current = self.current.saturating_sub(self.decrement);

        if self.current < self.min {
            self.current = self.min;
        } else if self.accumulated_decrement >= self.increment && self.current >= self.initial {
            // A length grown well past the initial one drops straight back
            // rather than walking down in small steps.
            self.current = self.initial;
            self.accumulated_decrement = 0;
        }

        self.last_socket_timeout = Some(now);
    }

    pub(crate) fn on_server_timeout_at(&mut self, now: Instant) {
        self.accumulated_decrement = 0;

        let paused = self
            .last_socket_timeout
            .is_some_and(|last| now.saturating_duration_since(last) <= self.growth_pause);
        if !paused {
            self.current = self.current.saturating_add(self.increment).min(self.max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuner() -> PollTuner {
        PollTuner::new(&CometConfig::default())
    }

    #[test]
    fn starts_at_initial_length() {
        assert_eq!(tuner().timeout_ms(), 120_000);
    }

    #[test]
    fn socket_timeouts_never_go_below_min() {
        let mut tuner = tuner();
        let now = Instant::now();
        for _ in 0..50 {
            tuner.on_socket_timeout_at(now);
            assert!(tuner.timeout_ms() >= 60_000);
        }
        assert_eq!(tuner.timeout_ms(), 60_000);
    }

    #[test]
    fn server_timeouts_never_exceed_max() {
        let mut tuner = tuner();
        let now = Instant::now();
        for _ in 0..100 {
            tuner.on_server_timeout_at(now);
            assert!(tuner.timeout_ms() <= 890_000);
        }
        assert_eq!(tuner.timeout_ms(), 890_000);
    }

    #[test]
    fn growth_pauses_after_socket_timeout() {
        let mut tuner = tuner();
        let start = Instant::now();
        tuner.on_socket_timeout_at(start);
        let shrunk = tuner.timeout_ms();

        tuner.on_server_timeout_at(start + Duration::from_secs(60));
        assert_eq!(tuner.timeout_ms(), shrunk);

        tuner.on_server_timeout_at(start + Duration::from_secs(3601));
        assert_eq!(tuner.timeout_ms(), shrunk + 30_000);
    }

    #[test]
    fn grown_length_resets_to_initial_after_a_full_increment_of_shrinkage() {
        let mut tuner = tuner();
        let now = Instant::now();
        tuner.on_server_timeout_at(now);
        tuner.on_server_timeout_at(now);
        assert_eq!(tuner.timeout_ms(), 180_000);

        tuner.on_socket_timeout_at(now);
        tuner.on_socket_timeout_at(now);
        assert_eq!(tuner.timeout_ms(), 160_000);

        tuner.on_socket_timeout_at(now);
        assert_eq!(tuner.timeout_ms(), 120_000);

        // Accumulator restarted, so the next step is a plain decrement.
        tuner.on_socket_timeout_at(now);
        assert_eq!(tuner.timeout_ms(), 110_000);
    }

    #[test]
    fn twelve_socket_timeouts_from_initial_settle_at_min() {
        let mut tuner = tuner();
        let now = Instant::now();
        let mut resets = 0;
        for _ in 0..12 {
            let before = tuner.timeout_ms();
            tuner.on_socket_timeout_at(now);
            if tuner.timeout_ms() > before {
                resets += 1;
            }
        }
        assert_eq!(resets, 0);
        assert_eq!(tuner.timeout_ms(), 60_000);
    }
}
