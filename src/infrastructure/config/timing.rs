//! Backoff and event-wait poll tuning configuration.
//!
//! All durations are in milliseconds.

use serde::Deserialize;

/// Failure backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    /// Wait after the first failure (milliseconds).
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Maximum number of times the wait doubles.
    #[serde(default = "default_max_doublings")]
    pub max_doublings: u32,
}

const fn default_initial_ms() -> u64 {
    1000
}

const fn default_max_doublings() -> u32 {
    10 // caps the wait at 512s with the default initial wait
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_doublings: default_max_doublings(),
        }
    }
}

/// Event-wait (COMET) poll length discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct CometConfig {
    #[serde(default = "default_initial_poll_ms")]
    pub initial_poll_ms: u64,
    #[serde(default = "default_min_poll_ms")]
    pub min_poll_ms: u64,
    #[serde(default = "default_max_poll_ms")]
    pub max_poll_ms: u64,
    /// Growth step after the server completes a poll.
    #[serde(default = "default_increment_ms")]
    pub increment_ms: u64,
    /// Shrink step after a socket timeout.
    #[serde(default = "default_decrement_ms")]
    pub decrement_ms: u64,
    /// How long growth stays paused after a socket timeout.
    #[serde(default = "default_growth_pause_ms")]
    pub growth_pause_ms: u64,
    /// Added to the poll length to get the client read timeout.
    #[serde(default = "default_socket_grace_ms")]
    pub socket_grace_ms: u64,
}

const fn default_initial_poll_ms() -> u64 {
    120_000 // 2 minutes
}

const fn default_min_poll_ms() -> u64 {
    60_000
}

const fn default_max_poll_ms() -> u64 {
    890_000 // just under 15 minutes
}

const fn default_increment_ms() -> u64 {
    30_000
}

const fn default_decrement_ms() -> u64 {
    10_000
}

const fn default_growth_pause_ms() -> u64 {
    3_600_000 // 1 hour
}

const fn default_socket_grace_ms() -> u64 {
    15_000
}

impl Default for CometConfig {
    fn default() -> Self {
        Self {
            initial_poll_ms: default_initial_poll_ms(),
            min_poll_ms: default_min_poll_ms(),
            max_poll_ms: default_max_poll_ms(),
            increment_ms: default_increment_ms(),
            decrement_ms: default_decrement_ms(),
            growth_pause_ms: default_growth_pause_ms(),
            socket_grace_ms: default_socket_grace_ms(),
        }
    }
}
