//! Server endpoint and HTTP client configuration.

use serde::Deserialize;

/// Where the portal lives and how to talk to it.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal, e.g. `https://portal.example.com/cust`.
    #[serde(default)]
    pub base_url: String,
    /// Protocol version sent with login and event-wait requests.
    #[serde(default = "default_version")]
    pub version: String,
    /// TCP connect timeout (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read timeout for everything except event-wait requests (milliseconds).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept any server certificate. Test servers only.
    #[serde(default)]
    pub allow_self_signed: bool,
}

fn default_version() -> String {
    "8.0".into()
}

const fn default_connect_timeout_ms() -> u64 {
    2000
}

const fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_user_agent() -> String {
    format!("portalink/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            version: default_version(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
            allow_self_signed: false,
        }
    }
}

/// Host network observation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Poll the host's interfaces for up/down transitions.
    #[serde(default = "default_probe_enabled")]
    pub probe_enabled: bool,
    /// Interval between interface polls (milliseconds).
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
}

const fn default_probe_enabled() -> bool {
    true
}

const fn default_probe_interval_ms() -> u64 {
    5000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_enabled: default_probe_enabled(),
            probe_interval_ms: default_probe_interval_ms(),
        }
    }
}
