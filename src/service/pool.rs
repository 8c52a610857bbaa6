//! Connection pool sizing.
//!
//! Every transport call holds a [`ConnectionPermit`]. The gate's capacity is
//! kept at the number of fixed workers plus active watchers, so each
//! long-running task always has a connection available.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Workers that always exist: one per queue.
pub const FIXED_WORKERS: usize = 2;

#[derive(Debug)]
struct GateState {
    in_use: usize,
    capacity: usize,
}

/// Resizable counting gate for concurrent requests.
#[derive(Debug)]
pub struct ConnectionGate {
    state: Mutex<GateState>,
    released: Notify,
}

impl ConnectionGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                in_use: 0,
                capacity,
            }),
            released: Notify::new(),
        }
    }

    /// Capacity for the fixed workers plus `watchers` event-wait tasks.
    #[must_use]
    pub fn capacity_for(watchers: usize) -> usize {
        FIXED_WORKERS + watchers
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Change capacity. Shrinking below current use only delays new permits.
    pub fn resize(&self, capacity: usize) {
        self.state.lock().capacity = capacity;
        self.released.notify_waiters();
    }

    /// Wait for a free connection slot.
    pub async fn acquire(&self) -> ConnectionPermit<'_> {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.in_use < state.capacity {
                    state.in_use += 1;
                    return ConnectionPermit { gate: self };
                }
            }

            notified.await;
        }
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            state.in_use = state.in_use.saturating_sub(1);
        }
        self.released.notify_waiters();
    }
}

/// A held connection slot, returned to the gate on drop.
#[derive(Debug)]
pub struct ConnectionPermit<'a> {
    gate: &'a ConnectionGate,
}

impl Drop for ConnectionPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
