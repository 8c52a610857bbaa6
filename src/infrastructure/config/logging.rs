//! Logging configuration and subscriber setup.

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP stack crates are only interesting when something breaks.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive for this crate, e.g. `info` or `portalink=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Include the emitting module in each line.
    #[serde(default)]
    pub with_target: bool,
}

fn default_level() -> String {
    "info".into()
}

impl LoggingConfig {
    /// Build the filter: `RUST_LOG` if set, otherwise the configured level
    /// with the HTTP stack turned down.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directives = std::iter::once(self.level.as_str())
                .chain(QUIET_DEPENDENCIES.iter().copied())
                .collect::<Vec<_>>()
                .join(",");
            EnvFilter::new(directives)
        })
    }

    /// Install the global subscriber. A second call leaves the first one
    /// in place.
    pub fn init(&self) {
        let builder = fmt()
            .with_env_filter(self.filter())
            .with_target(self.with_target);

        let installed = match self.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.try_init(),
        };
        if installed.is_err() {
            tracing::debug!("Tracing subscriber already installed");
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            with_target: false,
        }
    }
}
