//! Work queues and the worker loop that drains them.
//!
//! Two queues exist, foreground and background, each drained by one worker
//! task. A worker parks while its queue is empty or paused, sits out the
//! shared backoff before each request, and puts unfinished items back at the
//! head of its queue so submission order is preserved.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use super::state::ServiceState;
use super::work::{Completion, WorkItem};
use super::Inner;
use crate::domain::{NetworkError, Priority};

/// One priority level's pending items.
#[derive(Default)]
pub(crate) struct WorkQueue {
    pub items: VecDeque<WorkItem>,
    /// Set while the queue must not be drained, e.g. without a session.
    pub paused: bool,
}

impl WorkQueue {
    /// Put an unfinished item back at the head, behind any queued login.
    pub fn requeue(&mut self, item: WorkItem) {
        let logins = self.items.iter().take_while(|queued| queued.is_login()).count();
        self.items.insert(logins, item);
    }

    /// Fail and drop every item that reports network errors to its caller.
    pub fn fail_reporting(&mut self, error: NetworkError) -> usize {
        let before = self.items.len();
        self.items.retain_mut(|item| !item.report_network_error(error));
        before - self.items.len()
    }
}

/// Per-task tracking of the backoff wait currently being served.
#[derive(Debug, Default)]
pub(crate) struct Pacing {
    deadline: Option<Instant>,
    epoch: u64,
    /// A notification ended the current wait; the next attempt goes now.
    woken: bool,
}

impl Pacing {
    /// Instant to wait until before the next request, if one is required.
    pub fn hold(&mut self, state: &ServiceState) -> Option<Instant> {
        let Some(delay) = state.backoff.wait_time() else {
            self.deadline = None;
            return None;
        };

        if std::mem::take(&mut self.woken) {
            self.deadline = None;
            return None;
        }

        if state.restore_epoch != self.epoch {
            // Network came back; go now.
            self.epoch = state.restore_epoch;
            self.deadline = None;
            return None;
        }

        let now = Instant::now();
        let deadline = *self.deadline.get_or_insert(now + delay);
        (now < deadline).then_some(deadline)
    }

    /// Sit out `deadline` unless `signal` fires first. A notification
    /// releases the next attempt immediately.
    pub async fn wait(&mut self, deadline: Instant, signal: &Notify) {
        if timeout_at(deadline, signal.notified()).await.is_ok() {
            self.woken = true;
        }
    }

    /// A request went out; the next failure starts a fresh wait.
    pub fn served(&mut self) {
        self.deadline = None;
        self.woken = false;
    }
}

enum Step {
    Stop,
    Park,
    Wait(Instant),
    Run(WorkItem),
}

impl Inner {
    /// Queue an item, or settle it immediately when it cannot run.
    pub(crate) fn submit(&self, priority: Priority, mut item: WorkItem) {
        {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            if !state.network.is_connected() && item.report_network_error(NetworkError::Unavailable)
            {
                debug!(%priority, "Rejected request while network is down");
                return;
            }
            state.queue_mut(priority).items.push_back(item);
        }
        self.wake_worker(priority);
    }

    pub(crate) fn requeue(&self, priority: Priority, item: WorkItem) {
        let mut state = self.state.lock();
        if state.running {
            state.queue_mut(priority).requeue(item);
        }
    }

    pub(crate) fn wake_worker(&self, priority: Priority) {
        match priority {
            Priority::Foreground => self.foreground.notify_one(),
            Priority::Background => self.background.notify_one(),
        }
    }

    fn next_step(&self, priority: Priority, pacing: &mut Pacing) -> Step {
        let mut state = self.state.lock();
        if !state.running {
            return Step::Stop;
        }

        let queue = state.queue(priority);
        if queue.paused || queue.items.is_empty() {
            return Step::Park;
        }

        if let Some(deadline) = pacing.hold(&state) {
            return Step::Wait(deadline);
        }

        match state.queue_mut(priority).items.pop_front() {
            Some(item) => Step::Run(item),
            None => Step::Park,
        }
    }
}

/// Drain one queue until the service stops.
pub(crate) async fn run_worker(inner: Arc<Inner>, priority: Priority) {
    let signal = match priority {
        Priority::Foreground => &inner.foreground,
        Priority::Background => &inner.background,
    };
    let mut pacing = Pacing::default();
    info!(%priority, "Worker started");

    loop {
        match inner.next_step(priority, &mut pacing) {
            Step::Stop => break,
            Step::Park => signal.notified().await,
            Step::Wait(deadline) => {
                debug!(%priority, "Waiting out backoff");
                pacing.wait(deadline, signal).await;
            }
            Step::Run(mut item) => {
                let completion = item.execute(&inner).await;
                pacing.served();
                if completion == Completion::Retry {
                    debug!(%priority, item = item.kind(), "Work item will be retried");
                    inner.requeue(priority, item);
                }
            }
        }
    }

    info!(%priority, "Worker stopped");
}
