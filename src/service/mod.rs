//! The portal client engine.
//!
//! [`PortalService`] owns a session with one portal server and runs every
//! request on behalf of its callers. Requests are queued on one of two
//! worker tasks; subscriptions get one event-wait watcher task per topic.
//! Callers never retry: transient failures are absorbed and retried once the
//! shared backoff or the network allows, unless the caller asked to hear
//! about network errors.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use portalink::adapter::memory_credentials::MemoryCredentialStore;
//! use portalink::adapter::reqwest_transport::ReqwestTransport;
//! use portalink::domain::FetchRequest;
//! use portalink::infrastructure::config::Config;
//! use portalink::service::PortalService;
//!
//! # async fn run() -> portalink::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let transport = Arc::new(ReqwestTransport::from_config(&config.portal)?);
//! let service = PortalService::start(config, transport, Arc::new(MemoryCredentialStore::new()))?;
//! service.set_credentials("5551234", "secret", false);
//!
//! let contacts = service.fetch(FetchRequest::new("Contacts")).await;
//! println!("{contacts:?}");
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub(crate) mod executor;
pub mod network;
pub mod poll;
pub mod pool;
mod scheduler;
mod session;
mod state;
mod watcher;
pub(crate) mod work;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

pub use network::{InterfaceEvent, Transition};
pub use watcher::Listener;

use self::pool::ConnectionGate;
use self::state::ServiceState;
use self::work::WorkItem;
use crate::domain::{
    FetchRequest, ListenerId, NetworkError, Priority, RequestError, SendRequest, Topic,
    UploadRequest,
};
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::credentials::CredentialStore;
use crate::port::transport::HttpTransport;

/// Outcome of a submitted request, resolved once the service is done with it.
///
/// Resolves to [`RequestError::Cancelled`] if the service shuts down first.
#[derive(Debug)]
#[must_use = "a request's outcome is only observable through its Pending handle"]
pub struct Pending<T> {
    receiver: oneshot::Receiver<std::result::Result<T, RequestError>>,
}

impl<T> Pending<T> {
    fn new(receiver: oneshot::Receiver<std::result::Result<T, RequestError>>) -> Self {
        Self { receiver }
    }
}

impl<T> Future for Pending<T> {
    type Output = std::result::Result<T, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RequestError::Cancelled)))
    }
}

/// State and handles shared by the façade, workers and watchers.
pub(crate) struct Inner {
    pub(crate) config: Config,
    pub(crate) base_url: Url,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) credential_store: Arc<dyn CredentialStore>,
    pub(crate) state: Mutex<ServiceState>,
    pub(crate) foreground: Notify,
    pub(crate) background: Notify,
    pub(crate) gate: ConnectionGate,
}

impl Inner {
    #[allow(clippy::result_large_err)]
    pub(crate) fn new(
        config: Config,
        transport: Arc<dyn HttpTransport>,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;
        let state = ServiceState::new(&config);

        Ok(Self {
            config,
            base_url,
            transport,
            credential_store,
            state: Mutex::new(state),
            foreground: Notify::new(),
            background: Notify::new(),
            gate: ConnectionGate::new(ConnectionGate::capacity_for(0)),
        })
    }

    pub(crate) fn record_success(&self) {
        self.state.lock().backoff.on_success();
    }

    pub(crate) fn record_failure(&self) {
        self.state.lock().backoff.on_failure();
    }

    /// A network error nobody claimed: back off, fail every queued request
    /// that wants to hear about it, and tell interested subscribers.
    pub(crate) fn on_network_error(&self, error: NetworkError) {
        let failed = {
            let mut state = self.state.lock();
            state.backoff.on_failure();
            let failed = state.foreground.fail_reporting(error) + state.background.fail_reporting(error);
            for registration in state.topics.values() {
                registration.notify_network_error(error);
            }
            failed
        };
        warn!(%error, failed, "Network error");
    }

    pub(crate) fn on_interface_event(&self, event: InterfaceEvent) {
        let (transition, watchers) = {
            let mut state = self.state.lock();
            let transition = state.network.apply(event);
            if transition == Some(Transition::Restored) {
                state.restore_epoch += 1;
            }
            let watchers: Vec<_> = state.topics.values().map(|topic| topic.waker()).collect();
            (transition, watchers)
        };

        match transition {
            Some(Transition::Restored) => {
                info!("Network restored, waking all workers");
                self.foreground.notify_one();
                self.background.notify_one();
                for watcher in watchers {
                    watcher.notify_one();
                }
            }
            Some(Transition::Lost) => self.on_network_error(NetworkError::Unavailable),
            None => {}
        }
    }
}

/// Session-based client for one portal server.
///
/// Cheap to clone; every clone drives the same service.
#[derive(Clone)]
pub struct PortalService {
    inner: Arc<Inner>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PortalService {
    /// Validate `config` and start the two queue workers.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    #[allow(clippy::result_large_err)]
    pub fn start(
        config: Config,
        transport: Arc<dyn HttpTransport>,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let inner = Arc::new(Inner::new(config, transport, credential_store)?);
        let workers = [Priority::Foreground, Priority::Background]
            .into_iter()
            .map(|priority| tokio::spawn(scheduler::run_worker(Arc::clone(&inner), priority)))
            .collect();

        info!(base_url = %inner.base_url, "Portal service started");
        Ok(Self {
            inner,
            workers: Arc::new(Mutex::new(workers)),
        })
    }

    /// Fetch a data item. Resolves to the response records as a JSON array.
    pub fn fetch(&self, request: FetchRequest) -> Pending<Value> {
        let priority = request.priority;
        let (item, pending) = WorkItem::fetch(request);
        self.inner.submit(priority, item);
        pending
    }

    pub fn send(&self, request: SendRequest) -> Pending<()> {
        let priority = request.priority;
        let (item, pending) = WorkItem::send(request);
        self.inner.submit(priority, item);
        pending
    }

    pub fn upload(&self, request: UploadRequest) -> Pending<()> {
        let priority = request.priority;
        let (item, pending) = WorkItem::upload(request);
        self.inner.submit(priority, item);
        pending
    }

    /// Listen for changes on `topic`. Subscribing the same listener twice
    /// has no effect.
    pub fn subscribe(&self, topic: impl Into<Topic>, listener: &Listener, report_network_errors: bool) {
        self.inner
            .subscribe(topic.into(), listener.clone(), report_network_errors);
    }

    /// # Errors
    ///
    /// Returns [`Error::ListenerNotRegistered`](crate::error::Error::ListenerNotRegistered)
    /// if the listener is not subscribed to `topic`.
    #[allow(clippy::result_large_err)]
    pub fn unsubscribe(&self, topic: &Topic, listener: ListenerId) -> Result<()> {
        self.inner.unsubscribe(topic, listener)
    }

    /// Replace the login credentials, optionally remembering them in the
    /// credential store.
    pub fn set_credentials(&self, username: &str, password: &str, remember: bool) {
        self.inner.set_credentials(username, password, remember);
    }

    /// The embedding application learned the password is wrong.
    pub fn on_invalid_credentials(&self) {
        self.inner.invalidate_credentials();
    }

    /// Feed a host interface change to the network monitor.
    pub fn on_interface_event(&self, event: InterfaceEvent) {
        self.inner.on_interface_event(event);
    }

    /// Stop all workers and watchers. Requests not yet completed resolve to
    /// [`RequestError::Cancelled`].
    pub async fn shutdown(&self) {
        let watchers: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.running = false;
            state.foreground.items.clear();
            state.background.items.clear();
            state.topics.drain().map(|(_, registration)| registration).collect()
        };
        for registration in &watchers {
            registration.stop();
        }
        drop(watchers);
        self.inner.gate.resize(ConnectionGate::capacity_for(0));
        self.inner.foreground.notify_one();
        self.inner.background.notify_one();

        // A worker blocked on a request would only notice at the next step;
        // dropping its item resolves the caller to Cancelled.
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            worker.abort();
            match worker.await {
                Err(err) if !err.is_cancelled() => warn!(error = %err, "Worker task failed"),
                _ => {}
            }
        }
        info!("Portal service stopped");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner.state.lock().session.is_some()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().network.is_connected()
    }

    /// Current connection pool capacity: two workers plus one per watcher.
    #[must_use]
    pub fn pool_capacity(&self) -> usize {
        self.inner.gate.capacity()
    }

    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.inner.state.lock().topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    #[must_use]
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map_or(0, |registration| registration.listener_count())
    }

    #[must_use]
    pub fn backoff_delay(&self) -> Option<Duration> {
        self.inner.state.lock().backoff.wait_time()
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        self.inner.state.lock().poll.timeout()
    }
}
