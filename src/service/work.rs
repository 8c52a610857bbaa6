//! Work items: one logical operation each.
//!
//! Queued items (fetch, send, upload and login) are executed by a worker and
//! either complete or ask to be retried. The event-wait item belongs to a
//! topic watcher and is never queued.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::executor::{BodyShape, Outcome};
use super::{Inner, Pending};
use crate::domain::{
    DataError, FetchRequest, NetworkError, RequestError, SendRequest, SessionId, Topic,
    UploadRequest,
};
use crate::port::transport::{HttpRequest, RequestBody};

/// Result of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// Done, successfully or with an outcome already delivered.
    Complete,
    /// Not done; keep the item at the head of its queue.
    Retry,
}

/// Caller side of a queued request.
pub(crate) struct Reply<T> {
    sender: Option<oneshot::Sender<Result<T, RequestError>>>,
    report_network_errors: bool,
}

impl<T> Reply<T> {
    fn channel(report_network_errors: bool) -> (Self, Pending<T>) {
        let (sender, receiver) = oneshot::channel();
        let reply = Self {
            sender: Some(sender),
            report_network_errors,
        };
        (reply, Pending::new(receiver))
    }

    fn send(&mut self, result: Result<T, RequestError>) {
        if let Some(sender) = self.sender.take() {
            // The caller may have stopped waiting.
            let _ = sender.send(result);
        }
    }

    fn is_abandoned(&self) -> bool {
        self.sender.as_ref().map_or(true, oneshot::Sender::is_closed)
    }

    /// Deliver a network error if the caller asked for them.
    fn report(&mut self, error: NetworkError) -> bool {
        if self.report_network_errors {
            self.send(Err(error.into()));
        }
        self.report_network_errors
    }
}

pub(crate) struct FetchItem {
    request: FetchRequest,
    reply: Reply<Value>,
}

pub(crate) struct SendItem {
    request: SendRequest,
    reply: Reply<()>,
}

pub(crate) struct UploadItem {
    request: UploadRequest,
    reply: Reply<()>,
}

pub(crate) enum WorkItem {
    /// Obtain a new session. Only ever queued by the session manager.
    Login,
    Fetch(FetchItem),
    Send(SendItem),
    Upload(UploadItem),
}

impl WorkItem {
    pub(crate) fn fetch(request: FetchRequest) -> (Self, Pending<Value>) {
        let (reply, pending) = Reply::channel(request.report_network_errors);
        (Self::Fetch(FetchItem { request, reply }), pending)
    }

    pub(crate) fn send(request: SendRequest) -> (Self, Pending<()>) {
        let (reply, pending) = Reply::channel(request.report_network_errors);
        (Self::Send(SendItem { request, reply }), pending)
    }

    pub(crate) fn upload(request: UploadRequest) -> (Self, Pending<()>) {
        let (reply, pending) = Reply::channel(request.report_network_errors);
        (Self::Upload(UploadItem { request, reply }), pending)
    }

    pub(crate) fn is_login(&self) -> bool {
        matches!(self, Self::Login)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Fetch(_) => "fetch",
            Self::Send(_) => "send",
            Self::Upload(_) => "upload",
        }
    }

    /// Deliver `error` to the caller if it asked for network errors.
    ///
    /// Returns true when the item is finished and must be dropped.
    pub(crate) fn report_network_error(&mut self, error: NetworkError) -> bool {
        match self {
            Self::Login => false,
            Self::Fetch(item) => item.reply.report(error),
            Self::Send(item) => item.reply.report(error),
            Self::Upload(item) => item.reply.report(error),
        }
    }

    pub(crate) async fn execute(&mut self, inner: &Inner) -> Completion {
        match self {
            Self::Login => inner.login().await,
            Self::Fetch(item) => item.execute(inner).await,
            Self::Send(item) => item.execute(inner).await,
            Self::Upload(item) => item.execute(inner).await,
        }
    }
}

impl FetchItem {
    async fn execute(&mut self, inner: &Inner) -> Completion {
        if self.reply.is_abandoned() {
            return Completion::Complete;
        }
        let Some(session) = inner.session_id() else {
            debug!(topic = %self.request.topic, "No session yet for fetch");
            return Completion::Retry;
        };

        let mut url = match inner.session_url(&session, "data.js") {
            Ok(url) => url,
            Err(err) => return inner.unroutable(&err),
        };
        url.query_pairs_mut()
            .append_pair("data", self.request.topic.as_str());

        debug!(topic = %self.request.topic, "Fetching");
        let outcome = inner.execute(HttpRequest::get(url), BodyShape::Records).await;

        let validator = self.request.validator.clone();
        settle(inner, &session, &mut self.reply, outcome, |records| {
            let data = Value::Array(records);
            match validator {
                Some(valid) if !valid(&data) => None,
                _ => Some(data),
            }
        })
    }
}

impl SendItem {
    async fn execute(&mut self, inner: &Inner) -> Completion {
        if self.reply.is_abandoned() {
            return Completion::Complete;
        }
        let Some(session) = inner.session_id() else {
            debug!(topic = %self.request.topic, "No session yet for send");
            return Completion::Retry;
        };

        let mut url = match inner.session_url(&session, "data.js") {
            Ok(url) => url,
            Err(err) => return inner.unroutable(&err),
        };
        url.query_pairs_mut().append_pair("returnerrorsnow", "true");

        let body = envelope(&self.request.topic, (self.request.payload)());
        debug!(topic = %self.request.topic, "Sending");
        let outcome = inner
            .execute(HttpRequest::post(url, RequestBody::Json(body)), BodyShape::Optional)
            .await;

        settle(inner, &session, &mut self.reply, outcome, |_| Some(()))
    }
}

impl UploadItem {
    async fn execute(&mut self, inner: &Inner) -> Completion {
        if self.reply.is_abandoned() {
            return Completion::Complete;
        }

        let contents = match tokio::fs::read(&self.request.file).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(file = %self.request.file.display(), "Upload source missing");
                self.reply.send(Err(DataError::NotFound.into()));
                return Completion::Complete;
            }
            Err(err) => {
                warn!(file = %self.request.file.display(), error = %err, "Failed to read upload source");
                return network_failure(inner, &mut self.reply, NetworkError::Unavailable);
            }
        };

        let Some(session) = inner.session_id() else {
            debug!(destination = %self.request.destination, "No session yet for upload");
            return Completion::Retry;
        };

        let destination = self.request.destination.trim_start_matches('/');
        let url = match inner.session_url(&session, destination) {
            Ok(url) => url,
            Err(err) => return inner.unroutable(&err),
        };

        let body = RequestBody::File {
            field: "file".to_string(),
            file_name: file_name(&self.request.file),
            contents,
        };
        debug!(destination = %self.request.destination, "Uploading");
        let outcome = inner
            .execute(HttpRequest::post(url, body), BodyShape::Optional)
            .await;

        settle(inner, &session, &mut self.reply, outcome, |_| Some(()))
    }
}

/// What one event-wait poll produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Cycle {
    /// The server reported changes on the topic.
    Changed,
    /// The poll ran out without changes.
    Quiet,
    /// Poll again once conditions allow.
    Retry,
    /// Terminal: the topic's listeners must be told and dropped.
    DataError(DataError),
}

/// Long-poll for changes on one topic.
pub(crate) struct EventWait {
    topic: Topic,
}

impl EventWait {
    pub(crate) fn new(topic: Topic) -> Self {
        Self { topic }
    }

    pub(crate) async fn execute(&self, inner: &Inner, session: &SessionId) -> Cycle {
        let poll_ms = inner.state.lock().poll.timeout_ms();
        let line = format!("line{}/events.js", inner.username());

        let mut url = match inner.session_url(session, &line) {
            Ok(url) => url,
            Err(err) => {
                inner.unroutable(&err);
                return Cycle::Retry;
            }
        };
        url.query_pairs_mut()
            .append_pair("version", &inner.config.portal.version)
            .append_pair("events", self.topic.as_str())
            .append_pair("timeout", &poll_ms.to_string());

        // The client waits a little longer than the server so a healthy
        // poll always ends with a server response.
        let read_timeout = Duration::from_millis(poll_ms + inner.config.comet.socket_grace_ms);
        debug!(topic = %self.topic, poll_ms, "Waiting for events");
        let outcome = inner
            .execute(HttpRequest::get(url).with_timeout(read_timeout), BodyShape::Event)
            .await;

        match outcome {
            Outcome::Data(records) => {
                {
                    let mut state = inner.state.lock();
                    state.poll.on_server_timeout();
                    state.backoff.on_success();
                }
                let changed = records
                    .first()
                    .and_then(|record| record.get("events"))
                    .and_then(Value::as_array)
                    .is_some_and(|events| !events.is_empty());
                if changed {
                    Cycle::Changed
                } else {
                    Cycle::Quiet
                }
            }
            Outcome::Timeout => {
                let poll_ms = {
                    let mut state = inner.state.lock();
                    state.poll.on_socket_timeout();
                    state.poll.timeout_ms()
                };
                info!(topic = %self.topic, poll_ms, "Event wait timed out on the client, shortening poll");
                Cycle::Retry
            }
            Outcome::DataError(err) => {
                inner.record_failure();
                Cycle::DataError(err)
            }
            Outcome::SessionExpired { .. } => {
                inner.on_session_expired(session);
                Cycle::Retry
            }
            Outcome::Network(err) => {
                inner.on_network_error(err);
                Cycle::Retry
            }
        }
    }
}

/// Apply a non-event outcome to a queued item.
///
/// `accept` turns response records into the caller's value; `None` means the
/// data was rejected and the request is retried.
fn settle<T>(
    inner: &Inner,
    session: &SessionId,
    reply: &mut Reply<T>,
    outcome: Outcome,
    accept: impl FnOnce(Vec<Value>) -> Option<T>,
) -> Completion {
    match outcome {
        Outcome::Data(records) => match accept(records) {
            Some(value) => {
                inner.record_success();
                reply.send(Ok(value));
                Completion::Complete
            }
            None => {
                info!("Received data was rejected, retrying");
                inner.record_failure();
                Completion::Retry
            }
        },
        Outcome::DataError(err) => {
            inner.record_failure();
            reply.send(Err(err.into()));
            Completion::Complete
        }
        Outcome::SessionExpired { .. } => {
            inner.on_session_expired(session);
            Completion::Retry
        }
        Outcome::Network(err) => network_failure(inner, reply, err),
        Outcome::Timeout => network_failure(inner, reply, NetworkError::Unavailable),
    }
}

/// Report to the caller if it asked, otherwise hand the error to the service.
fn network_failure<T>(inner: &Inner, reply: &mut Reply<T>, error: NetworkError) -> Completion {
    if reply.report(error) {
        Completion::Complete
    } else {
        inner.on_network_error(error);
        Completion::Retry
    }
}

fn envelope(topic: &Topic, payload: Value) -> Value {
    json!({
        "data": [{
            "data": payload,
            "dataType": topic.as_str(),
        }]
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn send_envelope_wraps_payload_with_topic() {
        let body = envelope(&Topic::new("prefs"), json!({"ring": 3}));
        assert_eq!(
            body,
            json!({"data": [{"data": {"ring": 3}, "dataType": "prefs"}]})
        );
    }

    #[test]
    fn file_name_falls_back_when_path_has_none() {
        assert_eq!(file_name(&PathBuf::from("/tmp/logs.zip")), "logs.zip");
        assert_eq!(file_name(&PathBuf::from("/")), "upload");
    }

    #[tokio::test]
    async fn reporting_item_delivers_network_error() {
        let (mut item, pending) = WorkItem::fetch(FetchRequest::new("a").report_network_errors());
        assert!(item.report_network_error(NetworkError::ServerError));
        assert_eq!(
            pending.await,
            Err(RequestError::Network(NetworkError::ServerError))
        );
    }

    #[tokio::test]
    async fn dropped_item_cancels_pending() {
        let (item, pending) = WorkItem::send(SendRequest::with_value("a", json!(1)));
        drop(item);
        assert_eq!(pending.await, Err(RequestError::Cancelled));
    }

    #[test]
    fn login_never_reports_network_errors() {
        let mut item = WorkItem::Login;
        assert!(!item.report_network_error(NetworkError::Unavailable));
    }
}
