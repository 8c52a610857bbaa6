//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use crate::infrastructure::config::portal::{NetworkConfig, PortalConfig};
use crate::infrastructure::config::timing::BackoffConfig;
use crate::infrastructure::config::Config;

/// Base URL used by tests that do not care about it.
pub const BASE_URL: &str = "https://portal.test/cust";

/// Config with a 1ms backoff and the interface probe off, so retries happen
/// almost immediately.
pub fn fast_config(base_url: &str) -> Config {
    Config {
        portal: PortalConfig {
            base_url: base_url.to_string(),
            ..PortalConfig::default()
        },
        backoff: BackoffConfig {
            initial_ms: 1,
            max_doublings: 3,
        },
        network: NetworkConfig {
            probe_enabled: false,
            ..NetworkConfig::default()
        },
        ..Config::default()
    }
}

/// [`fast_config`] pointed at [`BASE_URL`].
pub fn config() -> Config {
    fast_config(BASE_URL)
}
