//! Request outcome errors.
//!
//! These are the failures a caller can observe for a single request. Session
//! expiry is deliberately absent: it is handled inside the service and never
//! reaches a caller.

use thiserror::Error;

/// Transient communication failures.
///
/// Surfaced to a caller only when it asked for network errors; otherwise the
/// service absorbs them and retries once backoff or connectivity allows.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// No usable network path to the server.
    #[error("network unavailable")]
    Unavailable,

    /// The server answered with an unexpected status code.
    #[error("server unavailable")]
    ServerUnavailable,

    /// The server answered with a body that could not be understood.
    #[error("server error")]
    ServerError,
}

/// Non-transient failures reported by the server for a specific request.
///
/// Always surfaced to the caller and never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("bad request")]
    BadRequest,

    #[error("not found")]
    NotFound,

    #[error("malformed response")]
    MalformedResponse,

    #[error("application error: {0}")]
    Application(String),
}

impl DataError {
    /// Map an error code embedded in a response body to a data error.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "badRequest" => Self::BadRequest,
            "notFound" | "fileNotFound" => Self::NotFound,
            "malformedResponse" => Self::MalformedResponse,
            other => Self::Application(other.to_string()),
        }
    }

    /// The wire code for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::BadRequest => "badRequest",
            Self::NotFound => "notFound",
            Self::MalformedResponse => "malformedResponse",
            Self::Application(code) => code,
        }
    }
}

/// Terminal outcome of a request that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Data(#[from] DataError),

    /// The service shut down before the request completed.
    #[error("request cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_variants() {
        assert_eq!(DataError::from_code("badRequest"), DataError::BadRequest);
        assert_eq!(DataError::from_code("fileNotFound"), DataError::NotFound);
        assert_eq!(
            DataError::from_code("someAppError"),
            DataError::Application("someAppError".into())
        );
    }

    #[test]
    fn application_code_round_trips() {
        let err = DataError::from_code("quotaExceeded");
        assert_eq!(err.code(), "quotaExceeded");
    }
}
