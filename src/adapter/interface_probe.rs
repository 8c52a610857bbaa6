//! Linux network interface probe.
//!
//! Polls `/sys/class/net/<iface>/operstate` and turns changes into
//! [`InterfaceEvent`]s for the service's network monitor.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::service::{InterfaceEvent, PortalService};

const SYSFS_NET: &str = "/sys/class/net";
const LOOPBACK: &str = "lo";

pub struct InterfaceProbe {
    root: PathBuf,
    interval: Duration,
}

impl InterfaceProbe {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::with_root(SYSFS_NET, interval)
    }

    /// Probe a different sysfs-style directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
        }
    }

    /// Read the up/down state of every non-loopback interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the interface directory cannot be listed.
    pub fn read_states(&self) -> io::Result<BTreeMap<String, bool>> {
        let mut states = BTreeMap::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == LOOPBACK {
                continue;
            }
            states.insert(name, is_up(&entry.path()));
        }
        Ok(states)
    }

    /// Poll until the service stops or the directory becomes unreadable.
    pub fn spawn(self, service: PortalService) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut known: Option<BTreeMap<String, bool>> = None;
            let mut ticker = tokio::time::interval(self.interval);

            while service.is_running() {
                ticker.tick().await;
                let current = match self.read_states() {
                    Ok(current) => current,
                    Err(err) => {
                        warn!(root = %self.root.display(), error = %err, "Interface probe disabled");
                        return;
                    }
                };
                for event in diff(known.as_ref(), &current) {
                    debug!(?event, "Interface changed");
                    service.on_interface_event(event);
                }
                known = Some(current);
            }
        })
    }
}

/// `unknown` covers virtual interfaces without carrier reporting.
fn is_up(path: &Path) -> bool {
    std::fs::read_to_string(path.join("operstate"))
        .map(|state| matches!(state.trim(), "up" | "unknown"))
        .unwrap_or(false)
}

/// Events that move `previous` to `current`. Ups come first so a handover
/// between interfaces never looks like an outage.
fn diff(
    previous: Option<&BTreeMap<String, bool>>,
    current: &BTreeMap<String, bool>,
) -> Vec<InterfaceEvent> {
    let was_up = |name: &str| previous.and_then(|p| p.get(name).copied());

    let mut ups = Vec::new();
    let mut downs = Vec::new();
    for (name, &up) in current {
        match (was_up(name), up) {
            (Some(true), true) | (Some(false), false) => {}
            (_, true) => ups.push(InterfaceEvent::Up(name.clone())),
            (_, false) => downs.push(InterfaceEvent::Down(name.clone())),
        }
    }

    // Interfaces that vanished count as down.
    if let Some(previous) = previous {
        let present: BTreeSet<&String> = current.keys().collect();
        for (name, &up) in previous {
            if up && !present.contains(name) {
                downs.push(InterfaceEvent::Down(name.clone()));
            }
        }
    }

    ups.extend(downs);
    ups
}
