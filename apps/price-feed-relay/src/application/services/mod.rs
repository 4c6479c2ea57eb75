//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SubscriptionRegistry`: Tracks connections and fans out price events
//! - `ConnectionSession`: Drives one client connection's control loop

/// Connection registry and broadcaster.
pub mod registry;

/// Per-connection control loop.
pub mod session;

pub use registry::{
    BroadcastError, BroadcastReport, RegistryConfig, RegistryStats, SharedRegistry,
    SubscriptionRegistry,
};
pub use session::{ConnectionSession, SessionSummary};
