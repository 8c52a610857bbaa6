//! Infrastructure layer.
//!
//! Provides technical concerns that support the service without containing
//! client policy: configuration loading, logging setup and runtime wiring.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation

pub mod bootstrap;
pub mod config;
