//! Portalink - a resilient session-based client for one portal server.
//!
//! The crate runs fetch, send and upload requests on behalf of many
//! independent callers, and long-polls the server so subscribers learn when
//! data changes. Session expiry, flaky networks and server throttling are
//! handled inside the service; callers only ever see their own outcome.
//!
//! # Architecture
//!
//! - **`domain`** - Identifiers, request descriptions and the request error
//!   taxonomy
//! - **`port`** - Trait seams: [`HttpTransport`](port::HttpTransport) and
//!   [`CredentialStore`](port::CredentialStore)
//! - **`adapter`** - `reqwest` transport, in-memory credential store and the
//!   Linux interface probe
//! - **`service`** - The engine: backoff, poll tuning, network monitor,
//!   work queues, session manager, topic watchers and pool sizing
//! - **`infrastructure`** - TOML configuration, logging and wiring
//! - **`cli`** - The `portalink` command line
//!
//! # Example
//!
//! ```no_run
//! use portalink::domain::FetchRequest;
//! use portalink::infrastructure::bootstrap::build_service;
//! use portalink::infrastructure::config::Config;
//!
//! # async fn run() -> portalink::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let service = build_service(&config)?;
//! service.set_credentials("5551234", "secret", false);
//! let data = service.fetch(FetchRequest::new("Contacts")).await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod service;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
