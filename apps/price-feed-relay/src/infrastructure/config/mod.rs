//! Configuration Module
//!
//! Configuration loading for the relay service.

mod settings;

pub use settings::{BusSettings, ConfigError, RegistrySettings, RelayConfig, ServerSettings};
