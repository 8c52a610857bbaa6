//! Infrastructure configuration modules.

pub mod logging;
pub mod portal;
pub mod settings;
pub mod timing;

pub use settings::Config;
