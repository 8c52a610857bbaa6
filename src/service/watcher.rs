//! Topic subscriptions and their event-wait watchers.
//!
//! Each subscribed topic has exactly one watcher task, which long-polls the
//! server and fans changes out to every listener on the topic. The watcher
//! stops when the last listener leaves, when the server reports a data error
//! for the topic, or when the service shuts down.

use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use super::pool::ConnectionGate;
use super::scheduler::Pacing;
use super::work::{Cycle, EventWait};
use super::Inner;
use crate::domain::{DataError, ListenerId, NetworkError, Topic, TopicEvent};
use crate::error::{Error, Result};

/// Receives events for the topics it is subscribed to.
#[derive(Debug, Clone)]
pub struct Listener {
    id: ListenerId,
    sender: mpsc::UnboundedSender<TopicEvent>,
}

impl Listener {
    /// Create a listener and the receiver its events arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TopicEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let listener = Self {
            id: ListenerId::generate(),
            sender,
        };
        (listener, receiver)
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    fn notify(&self, event: TopicEvent) {
        if self.sender.send(event).is_err() {
            debug!(listener = %self.id, "Listener receiver dropped");
        }
    }
}

struct Subscriber {
    listener: Listener,
    network_errors: bool,
}

/// Listeners on one topic plus the handles of its watcher.
pub(crate) struct TopicRegistration {
    subscribers: Vec<Subscriber>,
    wake: Arc<Notify>,
    active: Arc<AtomicBool>,
}

impl TopicRegistration {
    fn new(first: Subscriber) -> Self {
        Self {
            subscribers: vec![first],
            wake: Arc::new(Notify::new()),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.subscribers.len()
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.subscribers.iter().any(|s| s.listener.id == id)
    }

    fn belongs_to(&self, active: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.active, active)
    }

    fn notify_all(&self, event: &TopicEvent) {
        for subscriber in &self.subscribers {
            subscriber.listener.notify(event.clone());
        }
    }

    pub(crate) fn notify_network_error(&self, error: NetworkError) {
        for subscriber in self.subscribers.iter().filter(|s| s.network_errors) {
            subscriber.listener.notify(TopicEvent::NetworkError(error));
        }
    }

    /// Tell the watcher to exit at its next check.
    pub(crate) fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.wake.notify_one();
    }
}

impl Inner {
    pub(crate) fn subscribe(self: &Arc<Self>, topic: Topic, listener: Listener, network_errors: bool) {
        let (spawn, connected) = {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            let connected = state.network.is_connected();

            let subscriber = Subscriber {
                listener: listener.clone(),
                network_errors,
            };
            let spawn = match state.topics.entry(topic.clone()) {
                Entry::Occupied(mut entry) => {
                    let registration = entry.get_mut();
                    if registration.contains(listener.id) {
                        debug!(%topic, listener = %listener.id, "Listener already subscribed");
                        return;
                    }
                    registration.subscribers.push(subscriber);
                    None
                }
                Entry::Vacant(entry) => {
                    let registration = entry.insert(TopicRegistration::new(subscriber));
                    Some((registration.waker(), Arc::clone(&registration.active)))
                }
            };
            if spawn.is_some() {
                self.gate
                    .resize(ConnectionGate::capacity_for(state.topics.len()));
            }
            (spawn, connected)
        };

        if !connected && network_errors {
            listener.notify(TopicEvent::NetworkError(NetworkError::Unavailable));
        }

        if let Some((wake, active)) = spawn {
            info!(%topic, "Starting watcher");
            tokio::spawn(run_watcher(Arc::clone(self), topic, wake, active));
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::ListenerNotRegistered`] if the listener is not
    /// subscribed to `topic`.
    pub(crate) fn unsubscribe(&self, topic: &Topic, id: ListenerId) -> Result<()> {
        let not_registered = || Error::ListenerNotRegistered {
            topic: topic.clone(),
        };

        let mut state = self.state.lock();
        let registration = state.topics.get_mut(topic).ok_or_else(not_registered)?;
        let position = registration
            .subscribers
            .iter()
            .position(|s| s.listener.id == id)
            .ok_or_else(not_registered)?;
        registration.subscribers.remove(position);

        if registration.subscribers.is_empty() {
            if let Some(registration) = state.topics.remove(topic) {
                registration.stop();
            }
            self.gate
                .resize(ConnectionGate::capacity_for(state.topics.len()));
            info!(%topic, "Last listener left, stopping watcher");
        }
        Ok(())
    }

    fn fan_out(&self, topic: &Topic, active: &Arc<AtomicBool>, event: &TopicEvent) {
        let state = self.state.lock();
        if let Some(registration) = state.topics.get(topic).filter(|r| r.belongs_to(active)) {
            debug!(%topic, listeners = registration.listener_count(), "Topic changed");
            registration.notify_all(event);
        }
    }

    /// Tell every listener about a terminal error and drop the topic.
    fn end_topic(&self, topic: &Topic, active: &Arc<AtomicBool>, error: DataError) {
        let mut state = self.state.lock();
        let owned = state
            .topics
            .get(topic)
            .is_some_and(|registration| registration.belongs_to(active));
        if !owned {
            return;
        }
        if let Some(registration) = state.topics.remove(topic) {
            warn!(%topic, code = error.code(), listeners = registration.listener_count(), "Event wait failed, unregistering listeners");
            registration.notify_all(&TopicEvent::DataError(error));
            registration.stop();
        }
        self.gate
            .resize(ConnectionGate::capacity_for(state.topics.len()));
    }
}

/// Poll one topic until told to stop.
pub(crate) async fn run_watcher(
    inner: Arc<Inner>,
    topic: Topic,
    wake: Arc<Notify>,
    active: Arc<AtomicBool>,
) {
    let poll = EventWait::new(topic.clone());
    let mut pacing = Pacing::default();

    loop {
        let hold = {
            let state = inner.state.lock();
            if !state.running || !active.load(Ordering::Acquire) {
                break;
            }
            pacing.hold(&state)
        };
        if let Some(deadline) = hold {
            pacing.wait(deadline, &wake).await;
            continue;
        }

        let Some(session) = inner.session_id() else {
            debug!(%topic, "Watcher waiting for a session");
            wake.notified().await;
            continue;
        };

        let cycle = poll.execute(&inner, &session).await;
        pacing.served();
        match cycle {
            Cycle::Changed => inner.fan_out(&topic, &active, &TopicEvent::Changed),
            Cycle::Quiet | Cycle::Retry => {}
            Cycle::DataError(error) => {
                inner.end_topic(&topic, &active, error);
                break;
            }
        }
    }

    info!(%topic, "Watcher stopped");
}
