//! The `config.toml` document.
//!
//! Every section is optional and falls back to its defaults; only
//! `portal.base_url` must be supplied.
//!
//! ```toml
//! [portal]
//! base_url = "https://portal.example.com/cust"
//!
//! [backoff]
//! initial_ms = 1000
//!
//! [logging]
//! format = "json"
//! ```

use std::path::Path;

use serde::Deserialize;
use url::Url;

use super::logging::LoggingConfig;
use super::portal::{NetworkConfig, PortalConfig};
use super::timing::{BackoffConfig, CometConfig};
use crate::error::{ConfigError, Result};

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server endpoint and HTTP client settings.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Failure backoff.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Event-wait poll length discovery.
    #[serde(default)]
    pub comet: CometConfig,

    /// Host network observation.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Log filter and output format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for bad TOML, or the first invalid field.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFile`] if the file is unreadable, otherwise
    /// as [`Config::parse_toml`].
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&text)
    }

    /// Initialize tracing from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Parse the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is missing, malformed or not http(s).
    #[allow(clippy::result_large_err)]
    pub fn base_url(&self) -> Result<Url> {
        let raw = self.portal.base_url.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingField { field: "base_url" }.into());
        }
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
            field: "base_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("unsupported scheme {}", url.scheme()),
            }
            .into());
        }
        Ok(url)
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        let invalid = |field: &'static str, reason: &str| -> crate::error::Error {
            ConfigError::InvalidValue {
                field,
                reason: reason.to_string(),
            }
            .into()
        };

        if self.portal.version.trim().is_empty() {
            return Err(invalid("version", "must not be empty"));
        }
        if self.portal.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be greater than 0"));
        }
        if self.portal.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be greater than 0"));
        }

        if self.backoff.initial_ms == 0 {
            return Err(invalid("initial_ms", "must be greater than 0"));
        }
        if self.backoff.max_doublings == 0 || self.backoff.max_doublings > 32 {
            return Err(invalid("max_doublings", "must be between 1 and 32"));
        }

        let comet = &self.comet;
        if comet.min_poll_ms == 0 {
            return Err(invalid("min_poll_ms", "must be greater than 0"));
        }
        if !(comet.min_poll_ms <= comet.initial_poll_ms && comet.initial_poll_ms <= comet.max_poll_ms)
        {
            return Err(invalid(
                "initial_poll_ms",
                "must satisfy min_poll_ms <= initial_poll_ms <= max_poll_ms",
            ));
        }
        if comet.increment_ms == 0 {
            return Err(invalid("increment_ms", "must be greater than 0"));
        }
        if comet.decrement_ms == 0 {
            return Err(invalid("decrement_ms", "must be greater than 0"));
        }

        if self.network.probe_enabled && self.network.probe_interval_ms == 0 {
            return Err(invalid("probe_interval_ms", "must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse_toml(
            r#"
[portal]
base_url = "https://portal.example.com/cust"
"#,
        )
        .unwrap();

        assert_eq!(config.portal.version, "8.0");
        assert_eq!(config.backoff.initial_ms, 1000);
        assert_eq!(config.backoff.max_doublings, 10);
        assert_eq!(config.comet.initial_poll_ms, 120_000);
        assert_eq!(config.comet.max_poll_ms, 890_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_base_url_is_rejected() {
        let result = Config::parse_toml("[backoff]\ninitial_ms = 10\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingField { field: "base_url" }))
        ));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let result = Config::parse_toml("[portal]\nbase_url = \"ftp://portal.example.com\"\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue { field: "base_url", .. }))
        ));
    }

    #[test]
    fn poll_bounds_must_be_ordered() {
        let result = Config::parse_toml(
            r#"
[portal]
base_url = "https://portal.example.com"

[comet]
min_poll_ms = 200000
initial_poll_ms = 120000
"#,
        );
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue { field: "initial_poll_ms", .. }))
        ));
    }
}
