//! Mutable state shared by workers, watchers and callers.
//!
//! Everything here sits behind the service's single state lock. Holders
//! never await, so every critical section is a handful of field updates.

use std::collections::HashMap;

use super::backoff::Backoff;
use super::network::NetworkMonitor;
use super::poll::PollTuner;
use super::scheduler::WorkQueue;
use super::watcher::TopicRegistration;
use crate::domain::{Priority, SessionId, Topic};
use crate::infrastructure::config::Config;

/// Credentials supplied by the embedding application.
#[derive(Debug, Default, Clone)]
pub(crate) struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub(crate) struct ServiceState {
    /// Cleared once at shutdown; every loop checks it each iteration.
    pub running: bool,
    pub session: Option<SessionId>,
    /// A login item is queued or executing.
    pub fetching_session: bool,
    pub backoff: Backoff,
    pub poll: PollTuner,
    pub network: NetworkMonitor,
    /// Bumped on every network restoration so waiters skip their backoff.
    pub restore_epoch: u64,
    pub foreground: WorkQueue,
    pub background: WorkQueue,
    pub topics: HashMap<Topic, TopicRegistration>,
    pub credentials: Credentials,
}

impl ServiceState {
    pub fn new(config: &Config) -> Self {
        Self {
            running: true,
            session: None,
            fetching_session: false,
            backoff: Backoff::new(&config.backoff),
            poll: PollTuner::new(&config.comet),
            network: NetworkMonitor::new(),
            restore_epoch: 0,
            foreground: WorkQueue::default(),
            background: WorkQueue::default(),
            topics: HashMap::new(),
            credentials: Credentials::default(),
        }
    }

    pub fn queue(&self, priority: Priority) -> &WorkQueue {
        match priority {
            Priority::Foreground => &self.foreground,
            Priority::Background => &self.background,
        }
    }

    pub fn queue_mut(&mut self, priority: Priority) -> &mut WorkQueue {
        match priority {
            Priority::Foreground => &mut self.foreground,
            Priority::Background => &mut self.background,
        }
    }
}
