//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::adapter::interface_probe::InterfaceProbe;
use crate::adapter::memory_credentials::MemoryCredentialStore;
use crate::adapter::reqwest_transport::ReqwestTransport;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::credentials::CredentialStore;
use crate::service::PortalService;

/// Build the production service: reqwest transport, in-memory credential
/// store and, when enabled, the interface probe.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
#[allow(clippy::result_large_err)]
pub fn build_service(config: &Config) -> Result<PortalService> {
    build_service_with_store(config, Arc::new(MemoryCredentialStore::new()))
}

/// Same as [`build_service`] with a caller-supplied credential store.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client
/// cannot be built.
#[allow(clippy::result_large_err)]
pub fn build_service_with_store(
    config: &Config,
    credential_store: Arc<dyn CredentialStore>,
) -> Result<PortalService> {
    let transport = Arc::new(ReqwestTransport::from_config(&config.portal)?);
    let service = PortalService::start(config.clone(), transport, credential_store)?;

    if config.network.probe_enabled {
        let interval = Duration::from_millis(config.network.probe_interval_ms);
        info!(interval_ms = config.network.probe_interval_ms, "Starting interface probe");
        InterfaceProbe::new(interval).spawn(service.clone());
    }

    Ok(service)
}
