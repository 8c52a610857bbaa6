//! [`HttpTransport`] backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use tracing::{debug, error};

use crate::error::Result;
use crate::infrastructure::config::portal::PortalConfig;
use crate::port::transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, TransportError,
};

/// HTTP client for the portal server.
pub struct ReqwestTransport {
    http: HttpClient,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    ///
    /// With `allow_self_signed` set, server certificates are not verified.
    #[allow(clippy::result_large_err)]
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let mut builder = HttpClient::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.clone());
        if config.allow_self_signed {
            error!("=== Allowing self signed certificates ===");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            default_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    fn classify_error(err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        debug!(
            method = ?request.method,
            path = request.url.path(),
            timeout_ms = timeout.as_millis() as u64,
            "Sending request"
        );

        let builder = match request.method {
            Method::Get => self.http.get(request.url),
            Method::Post => self.http.post(request.url),
        };
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::File {
                field,
                file_name,
                contents,
            } => {
                let part = Part::bytes(contents).file_name(file_name);
                builder.multipart(Form::new().part(field, part))
            }
        };

        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| Self::classify_error(&err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| Self::classify_error(&err))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_and_without_certificate_checks() {
        let strict = PortalConfig::default();
        assert!(ReqwestTransport::from_config(&strict).is_ok());

        let relaxed = PortalConfig {
            allow_self_signed: true,
            ..PortalConfig::default()
        };
        let transport = ReqwestTransport::from_config(&relaxed).unwrap();
        assert_eq!(
            transport.default_timeout,
            Duration::from_millis(relaxed.request_timeout_ms)
        );
    }
}
