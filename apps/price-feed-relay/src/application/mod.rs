//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for client connections, the bus, and event handling.
pub mod ports;

/// Registry, broadcaster, and connection session services.
pub mod services;
