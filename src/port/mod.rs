//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points the service is built against. Adapters
//! implement them to integrate with a concrete HTTP client or credential
//! store.
//!
//! # Available Ports
//!
//! - [`HttpTransport`] - Executes one HTTP request against the portal
//! - [`CredentialStore`] - Remembers the username and password

pub mod credentials;
pub mod transport;

pub use credentials::CredentialStore;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, TransportError};
