//! Implementations of ports (hexagonal adapters).

pub mod interface_probe;
pub mod memory_credentials;
pub mod reqwest_transport;
