//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] - [`ScriptedTransport`](transport::ScriptedTransport), a
//!   closure-driven fake [`HttpTransport`](crate::port::transport::HttpTransport).
//! - [`domain`] - Builders for portal response bodies.
//! - [`config`] - Canonical test configurations (fast backoff, no probe).

pub mod config;
pub mod domain;
pub mod transport;
