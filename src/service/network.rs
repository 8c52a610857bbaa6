//! Host connectivity tracking.

use std::collections::HashSet;

/// An interface changed state on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceEvent {
    Up(String),
    Down(String),
}

/// Connectivity change worth acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Restored,
    Lost,
}

/// Set of interfaces currently up.
///
/// Reports connected until the first observation arrives, so a host without
/// an interface feed never blocks requests.
#[derive(Debug, Default)]
pub struct NetworkMonitor {
    up: HashSet<String>,
    observed: bool,
}

impl NetworkMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.observed || !self.up.is_empty()
    }

    /// Apply an interface event, returning the connectivity change it caused.
    pub fn apply(&mut self, event: InterfaceEvent) -> Option<Transition> {
        let was_connected = self.is_connected();
        match event {
            InterfaceEvent::Up(name) => {
                self.up.insert(name);
            }
            InterfaceEvent::Down(name) => {
                self.up.remove(&name);
            }
        }
        self.observed = true;

        match (was_connected, self.is_connected()) {
            (false, true) => Some(Transition::Restored),
            (true, false) => Some(Transition::Lost),
            _ => None,
        }
    }
}
