//! Crate-level errors.
//!
//! Per-request outcomes live in [`crate::domain::error`]; this type covers
//! setup and API misuse, and wraps a request outcome where a caller wants a
//! single error type.

use thiserror::Error;

use crate::domain::error::RequestError;
use crate::domain::id::Topic;

/// Problems with the `config.toml` contents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config field {field} is required")]
    MissingField { field: &'static str },

    #[error("config field {field} is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("cannot read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("listener not registered for topic {topic}")]
    ListenerNotRegistered { topic: Topic },

    #[error("request failed: {0}")]
    Request(#[from] RequestError),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
