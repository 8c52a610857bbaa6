//! Mock [`HttpTransport`] for testing.
//!
//! [`ScriptedTransport`] answers every request by calling a closure, so a
//! test can route on the request path and keep its own counters. Every
//! request is logged for later assertions.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::port::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// One scripted reply, optionally delayed.
#[derive(Debug, Clone)]
pub struct Scripted {
    delay: Option<Duration>,
    result: Result<HttpResponse, TransportError>,
}

impl Scripted {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            delay: None,
            result: Ok(HttpResponse::ok(body)),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            delay: None,
            result: Ok(HttpResponse::new(status, "")),
        }
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            delay: None,
            result: Err(error),
        }
    }

    /// A request that never completes within a test's lifetime.
    pub fn hang() -> Self {
        Self::error(TransportError::Timeout).after(Duration::from_secs(3600))
    }

    /// Deliver the reply after `delay`.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

type Script = dyn Fn(&HttpRequest) -> Scripted + Send + Sync;

/// Closure-driven transport with a request log.
pub struct ScriptedTransport {
    script: Box<Script>,
    log: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&HttpRequest) -> Scripted + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with 200 and `body`.
    pub fn always_ok(body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| Scripted::ok(body.clone()))
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().clone()
    }

    /// Requests whose URL path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<HttpRequest> {
        self.log
            .lock()
            .iter()
            .filter(|request| path_ends_with(request, suffix))
            .cloned()
            .collect()
    }

    pub fn count(&self, suffix: &str) -> usize {
        self.requests_to(suffix).len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let scripted = (self.script)(&request);
        self.log.lock().push(request);
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.result
    }
}

/// Route helper for scripts.
pub fn path_ends_with(request: &HttpRequest, suffix: &str) -> bool {
    request.url.path().ends_with(suffix)
}
