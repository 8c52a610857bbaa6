//! Session management and credentials.
//!
//! At most one login is in flight. While there is no session the background
//! queue is paused; the foreground queue carries the login item at its head.

use tracing::{debug, error, info, warn};
use url::Url;

use super::executor::{BodyShape, Outcome};
use super::state::ServiceState;
use super::work::{Completion, WorkItem};
use super::Inner;
use crate::domain::{NetworkError, SessionId};
use crate::port::transport::{HttpRequest, RequestBody};

impl Inner {
    /// Current session, or `None` after making sure a login is queued.
    ///
    /// Never blocks; callers retry once woken.
    pub(crate) fn session_id(&self) -> Option<SessionId> {
        let queued = {
            let mut state = self.state.lock();
            if let Some(session) = &state.session {
                return Some(session.clone());
            }
            queue_login(&mut state)
        };
        if queued {
            debug!("Requested a new session");
            self.foreground.notify_one();
        }
        None
    }

    pub(crate) fn on_session_established(&self, session: SessionId) {
        let watchers: Vec<_> = {
            let mut state = self.state.lock();
            state.session = Some(session);
            state.fetching_session = false;
            state.background.paused = false;
            state.backoff.on_success();
            state.topics.values().map(|topic| topic.waker()).collect()
        };
        info!(watchers = watchers.len(), "Session established");

        self.background.notify_one();
        for watcher in watchers {
            watcher.notify_one();
        }
    }

    /// Drop `expired` if it is still current and queue a fresh login.
    pub(crate) fn on_session_expired(&self, expired: &SessionId) {
        let queued = {
            let mut state = self.state.lock();
            if state.session.as_ref() == Some(expired) {
                state.session = None;
                state.background.paused = true;
                info!("Session expired");
            }
            state.session.is_none() && queue_login(&mut state)
        };
        if queued {
            self.foreground.notify_one();
        }
    }

    /// The login failed for a reason other than the network; try again
    /// once backoff allows.
    fn on_login_failed(&self) {
        {
            let mut state = self.state.lock();
            state.fetching_session = false;
            state.backoff.on_failure();
        }
        let _ = self.session_id();
    }

    pub(crate) fn set_credentials(&self, username: &str, password: &str, remember: bool) {
        {
            let mut state = self.state.lock();
            state.credentials.username = Some(username.to_string());
            state.credentials.password = Some(password.to_string());
        }
        if remember {
            self.credential_store.store_username(username);
            self.credential_store.store_password(password);
        }
        info!(remember, "Credentials updated");
        self.foreground.notify_one();
    }

    /// Forget the password everywhere; the username is kept.
    pub(crate) fn invalidate_credentials(&self) {
        self.state.lock().credentials.password = None;
        self.credential_store.remove_password();
        warn!("Credentials invalidated");
    }

    pub(crate) fn username(&self) -> String {
        let username = self.state.lock().credentials.username.clone();
        username
            .or_else(|| self.credential_store.load_username())
            .unwrap_or_default()
    }

    /// Stored password wins over the in-memory one.
    fn password(&self) -> Option<String> {
        let password = self.state.lock().credentials.password.clone();
        self.credential_store.load_password().or(password)
    }

    fn login_credentials(&self) -> Option<(String, String)> {
        let username = self.username();
        if username.is_empty() {
            return None;
        }
        Some((username, self.password()?))
    }

    /// `<base>/session<id>/<path>`.
    pub(crate) fn session_url(&self, session: &SessionId, path: &str) -> Result<Url, url::ParseError> {
        let base = format!(
            "{}/session{}/",
            self.base_url.as_str().trim_end_matches('/'),
            session.as_str()
        );
        Url::parse(&base)?.join(path)
    }

    fn login_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/login",
            self.base_url.as_str().trim_end_matches('/')
        ))
    }

    pub(crate) async fn login(&self) -> Completion {
        let Some((username, password)) = self.login_credentials() else {
            warn!("No credentials to log in with");
            self.record_failure();
            return Completion::Retry;
        };

        let url = match self.login_url() {
            Ok(url) => url,
            Err(err) => return self.unroutable(&err),
        };
        let form = vec![
            ("AuthUserName".to_string(), username),
            ("AuthPassword".to_string(), password),
            ("version".to_string(), self.config.portal.version.clone()),
        ];

        debug!("Logging in");
        let outcome = self
            .execute(HttpRequest::post(url, RequestBody::Form(form)), BodyShape::Records)
            .await;

        match outcome {
            Outcome::Data(records) => {
                let session = records
                    .first()
                    .and_then(|record| record.get("sessionId"))
                    .and_then(serde_json::Value::as_str)
                    .map(SessionId::new);
                match session {
                    Some(session) => {
                        self.on_session_established(session);
                        Completion::Complete
                    }
                    None => {
                        error!("Login response carried no session id");
                        self.on_network_error(NetworkError::ServerError);
                        Completion::Retry
                    }
                }
            }
            Outcome::SessionExpired {
                authentication_failed: true,
            } => {
                self.invalidate_credentials();
                self.on_login_failed();
                Completion::Complete
            }
            Outcome::SessionExpired { .. } => {
                warn!("Login refused by the server");
                self.record_failure();
                Completion::Retry
            }
            Outcome::DataError(err) => {
                warn!(code = err.code(), "Login failed");
                self.on_login_failed();
                Completion::Complete
            }
            Outcome::Network(err) => {
                self.on_network_error(err);
                Completion::Retry
            }
            Outcome::Timeout => {
                self.on_network_error(NetworkError::Unavailable);
                Completion::Retry
            }
        }
    }

    /// A URL could not be built; count it against backoff and try later.
    pub(crate) fn unroutable(&self, err: &url::ParseError) -> Completion {
        warn!(error = %err, "Failed to build request URL");
        self.record_failure();
        Completion::Retry
    }
}

/// Queue a login at the very front unless one is pending.
fn queue_login(state: &mut ServiceState) -> bool {
    if state.fetching_session || !state.running {
        return false;
    }
    state.fetching_session = true;
    state.background.paused = true;
    state.foreground.items.push_front(WorkItem::Login);
    true
}
