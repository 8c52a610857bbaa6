//! Builders for portal response bodies used across tests.
//!
//! Keeps the wire shapes in one place so tests focus on behaviour rather
//! than JSON construction.

use serde_json::{json, Value};

/// Successful login carrying `session`.
pub fn login_ok(session: &str) -> String {
    json!([{ "sessionId": session }]).to_string()
}

/// A single data record.
pub fn records(data: Value) -> String {
    json!([{ "data": data }]).to_string()
}

/// A record carrying an embedded application error.
pub fn embedded_error(code: &str) -> String {
    json!([{ "errors": [{ "type": code }] }]).to_string()
}

/// An event-wait response listing changed topics.
pub fn events(topics: &[&str]) -> String {
    json!({ "events": topics }).to_string()
}

/// An event-wait response carrying an error.
pub fn event_error(code: &str) -> String {
    json!({ "events": [], "errors": [{ "type": code }] }).to_string()
}
