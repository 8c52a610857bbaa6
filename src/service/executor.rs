//! Request execution and response classification.
//!
//! Classification decides which failures a caller can see: data errors are
//! always reported, session expiry never is, and network errors depend on
//! whether the caller asked for them.

use serde_json::Value;
use tracing::{debug, error, info};

use super::Inner;
use crate::domain::error::{DataError, NetworkError};
use crate::port::transport::{HttpRequest, HttpResponse, TransportError};

/// Error codes that mean the session is gone rather than the data is bad.
const SESSION_EXPIRED: &str = "sessionExpired";
const AUTHENTICATION_FAILED: &str = "authenticationFailed";

/// How a response body is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyShape {
    /// A list of `{"data": .., "errors": [..]}` records.
    Records,
    /// A single `{"events": [..], "errors": [..]}` object.
    Event,
    /// Records, or an empty body meaning success.
    Optional,
}

/// Classified result of one request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Data(Vec<Value>),
    DataError(DataError),
    SessionExpired { authentication_failed: bool },
    Network(NetworkError),
    /// Socket or read timeout; event-wait requests treat this specially.
    Timeout,
}

impl Inner {
    /// Execute one request through the connection gate and classify it.
    pub(crate) async fn execute(&self, request: HttpRequest, shape: BodyShape) -> Outcome {
        let result = {
            let _permit = self.gate.acquire().await;
            self.transport.execute(request).await
        };
        classify(result, shape)
    }
}

pub(crate) fn classify(result: Result<HttpResponse, TransportError>, shape: BodyShape) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Timeout) => {
            debug!("Request timed out");
            return Outcome::Timeout;
        }
        Err(err) => {
            info!(error = %err, "Request failed below HTTP");
            return Outcome::Network(NetworkError::Unavailable);
        }
    };

    match response.status {
        200 => classify_body(&response.body, shape),
        403 | 404 => {
            info!(status = response.status, "Treating status as session expiry");
            Outcome::SessionExpired {
                authentication_failed: false,
            }
        }
        400 => Outcome::DataError(DataError::BadRequest),
        status => {
            info!(status, "Server unavailable");
            Outcome::Network(NetworkError::ServerUnavailable)
        }
    }
}

fn classify_body(body: &str, shape: BodyShape) -> Outcome {
    if shape == BodyShape::Optional && body.trim().is_empty() {
        return Outcome::Data(Vec::new());
    }

    let Some(records) = parse_records(body, shape) else {
        error!(body_len = body.len(), "Unparseable response body");
        return Outcome::Network(NetworkError::ServerError);
    };

    // The first record carrying an error decides the outcome, using that
    // record's first error.
    let Some(code) = records.iter().find_map(first_error_code) else {
        return Outcome::Data(records);
    };
    info!(code, "Server reported an error");
    match code {
        SESSION_EXPIRED => Outcome::SessionExpired {
            authentication_failed: false,
        },
        AUTHENTICATION_FAILED => Outcome::SessionExpired {
            authentication_failed: true,
        },
        other => Outcome::DataError(DataError::from_code(other)),
    }
}

fn parse_records(body: &str, shape: BodyShape) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_str(body).ok()?;
    match (shape, value) {
        (_, Value::Array(records)) => Some(records),
        (BodyShape::Event, object @ Value::Object(_)) => Some(vec![object]),
        (_, Value::Object(mut object)) => match object.remove("data") {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        },
        _ => None,
    }
}

/// Code of the first error in a record. An error entry without a string
/// `type` counts as a malformed response.
fn first_error_code(record: &Value) -> Option<&str> {
    let errors = record.get("errors")?.as_array()?;
    let first = errors.first()?;
    Some(
        first
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("malformedResponse"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::ok(body))
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(code, ""))
    }

    #[test]
    fn plain_records_are_data() {
        let outcome = classify(ok(r#"[{"data":{"a":1}}]"#), BodyShape::Records);
        assert_eq!(outcome, Outcome::Data(vec![serde_json::json!({"data":{"a":1}})]));
    }

    #[test]
    fn wrapped_records_are_unwrapped() {
        let outcome = classify(ok(r#"{"data":[{"data":2}]}"#), BodyShape::Records);
        assert_eq!(outcome, Outcome::Data(vec![serde_json::json!({"data":2})]));
    }

    #[test]
    fn embedded_session_errors_expire_the_session() {
        let expired = classify(
            ok(r#"[{"errors":[{"type":"sessionExpired"}]}]"#),
            BodyShape::Records,
        );
        assert_eq!(
            expired,
            Outcome::SessionExpired {
                authentication_failed: false
            }
        );

        let rejected = classify(
            ok(r#"[{"errors":[{"type":"authenticationFailed"}]}]"#),
            BodyShape::Records,
        );
        assert_eq!(
            rejected,
            Outcome::SessionExpired {
                authentication_failed: true
            }
        );
    }

    #[test]
    fn embedded_application_error_is_data_error() {
        let outcome = classify(
            ok(r#"[{"data":null},{"errors":[{"type":"someAppError"}]}]"#),
            BodyShape::Records,
        );
        assert_eq!(
            outcome,
            Outcome::DataError(DataError::Application("someAppError".into()))
        );
    }

    #[test]
    fn first_erroring_record_decides() {
        let outcome = classify(
            ok(r#"[{"errors":[{"type":"quotaExceeded"},{"type":"badRequest"}]},{"errors":[{"type":"sessionExpired"}]}]"#),
            BodyShape::Records,
        );
        assert_eq!(
            outcome,
            Outcome::DataError(DataError::Application("quotaExceeded".into()))
        );
    }

    #[test]
    fn error_without_type_is_malformed() {
        let outcome = classify(ok(r#"[{"errors":[{}]}]"#), BodyShape::Records);
        assert_eq!(
            outcome,
            Outcome::DataError(DataError::MalformedResponse)
        );
    }

    #[test]
    fn status_codes_are_classified() {
        assert_eq!(
            classify(status(403), BodyShape::Records),
            Outcome::SessionExpired {
                authentication_failed: false
            }
        );
        assert_eq!(
            classify(status(404), BodyShape::Records),
            Outcome::SessionExpired {
                authentication_failed: false
            }
        );
        assert_eq!(
            classify(status(400), BodyShape::Records),
            Outcome::DataError(DataError::BadRequest)
        );
        assert_eq!(
            classify(status(503), BodyShape::Records),
            Outcome::Network(NetworkError::ServerUnavailable)
        );
    }

    #[test]
    fn garbage_body_is_server_error() {
        assert_eq!(
            classify(ok("<html>"), BodyShape::Records),
            Outcome::Network(NetworkError::ServerError)
        );
    }

    #[test]
    fn transport_failures_are_network_errors() {
        assert_eq!(
            classify(Err(TransportError::Timeout), BodyShape::Event),
            Outcome::Timeout
        );
        assert_eq!(
            classify(
                Err(TransportError::Connect("refused".into())),
                BodyShape::Records
            ),
            Outcome::Network(NetworkError::Unavailable)
        );
    }

    #[test]
    fn event_object_is_wrapped() {
        let outcome = classify(ok(r#"{"events":["contacts"]}"#), BodyShape::Event);
        assert_eq!(
            outcome,
            Outcome::Data(vec![serde_json::json!({"events":["contacts"]})])
        );
    }

    #[test]
    fn empty_body_is_success_only_when_optional() {
        assert_eq!(
            classify(ok(""), BodyShape::Optional),
            Outcome::Data(Vec::new())
        );
        assert_eq!(
            classify(ok(""), BodyShape::Records),
            Outcome::Network(NetworkError::ServerError)
        );
    }
}
