//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use portalink::adapter::memory_credentials::MemoryCredentialStore;
use portalink::service::PortalService;
use portalink::testkit;
use portalink::testkit::transport::ScriptedTransport;

pub const USERNAME: &str = "5551234";
pub const PASSWORD: &str = "secret";

/// Start a service on `transport` with credentials already set.
pub fn start(transport: Arc<ScriptedTransport>) -> PortalService {
    let service = start_without_credentials(transport);
    service.set_credentials(USERNAME, PASSWORD, false);
    service
}

pub fn start_without_credentials(transport: Arc<ScriptedTransport>) -> PortalService {
    start_with_store(transport, Arc::new(MemoryCredentialStore::new()))
}

pub fn start_with_store(
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryCredentialStore>,
) -> PortalService {
    PortalService::start(testkit::config::config(), transport, store).unwrap()
}

/// Await `future`, failing the test if it takes more than five seconds.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
