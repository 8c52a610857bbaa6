//! Caller-facing request descriptions.
//!
//! Each request is a plain value handed to the service, which turns it into
//! a work item and reports the outcome through a [`Pending`](crate::service::Pending)
//! handle.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use super::error::{DataError, NetworkError};
use super::id::Topic;

/// Which worker queue a request is placed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// High priority queue, also used for session fetches.
    Foreground,
    /// Normal priority queue; paused while no session exists.
    #[default]
    Background,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foreground => f.write_str("foreground"),
            Self::Background => f.write_str("background"),
        }
    }
}

/// Notification delivered to a subscription listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicEvent {
    /// The topic changed on the server; re-fetch it to see the new data.
    Changed,
    /// The event-wait request failed terminally; the listener is unregistered.
    DataError(DataError),
    /// A transient network problem, only sent to listeners that asked for it.
    NetworkError(NetworkError),
}

/// Checks fetched data; returning `false` marks it invalid and schedules a retry.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Produces the payload of a send request at the moment it is transmitted.
pub type PayloadProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Fetch a named data item.
#[derive(Clone)]
pub struct FetchRequest {
    pub topic: Topic,
    pub priority: Priority,
    /// Report network errors to the caller instead of retrying silently.
    pub report_network_errors: bool,
    pub validator: Option<Validator>,
}

impl FetchRequest {
    pub fn new(topic: impl Into<Topic>) -> Self {
        Self {
            topic: topic.into(),
            priority: Priority::default(),
            report_network_errors: false,
            validator: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn report_network_errors(mut self) -> Self {
        self.report_network_errors = true;
        self
    }

    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("topic", &self.topic)
            .field("priority", &self.priority)
            .field("report_network_errors", &self.report_network_errors)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Send a named data item.
#[derive(Clone)]
pub struct SendRequest {
    pub topic: Topic,
    pub payload: PayloadProvider,
    pub priority: Priority,
    pub report_network_errors: bool,
}

impl SendRequest {
    pub fn new<F>(topic: impl Into<Topic>, payload: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            topic: topic.into(),
            payload: Arc::new(payload),
            priority: Priority::default(),
            report_network_errors: false,
        }
    }

    /// Send a fixed payload.
    pub fn with_value(topic: impl Into<Topic>, value: Value) -> Self {
        Self::new(topic, move || value.clone())
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn report_network_errors(mut self) -> Self {
        self.report_network_errors = true;
        self
    }
}

impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("topic", &self.topic)
            .field("priority", &self.priority)
            .field("report_network_errors", &self.report_network_errors)
            .finish_non_exhaustive()
    }
}

/// Upload a local file to a server path.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: PathBuf,
    /// Destination relative to the session base, e.g. `/line/logupload?filename=x.zip`.
    pub destination: String,
    pub priority: Priority,
    pub report_network_errors: bool,
}

impl UploadRequest {
    pub fn new(file: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            destination: destination.into(),
            priority: Priority::default(),
            report_network_errors: false,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn report_network_errors(mut self) -> Self {
        self.report_network_errors = true;
        self
    }
}
