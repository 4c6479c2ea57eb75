#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Feed Relay - Live Price Fan-out
//!
//! Consumes price ticks from a Kafka topic and relays each one to the
//! browser clients subscribed to its instrument over WebSocket.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `streaming`: Supported instruments and price events
//!   - `subscription`: Client control frames and error frames
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Connection, bus source, and event handler contracts
//!   - `services`: Subscription registry/broadcaster, connection session
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bus`: Kafka source, translation, consumer loop
//!   - `broadcast`: Registry as the consumer's event handler
//!   - `websocket`: Axum upgrade endpoint
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`, `telemetry`: Operational surfaces
//!
//! # Data Flow
//!
//! ```text
//!                                                 ┌──► Client 1 (BTC-USD)
//! Kafka ──► BusConsumer ──► translate ──► Registry┼──► Client 2 (BTC-USD)
//!                                                 └──✗ Client 3 (write failed → evicted)
//!
//! Client ──► ConnectionSession ──► subscribe / unsubscribe ──► Registry
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{Instrument, PriceEvent};
pub use domain::subscription::{Action, ControlCommand, ErrorFrame, ValidationError};

// Ports
pub use application::ports::{
    BusMessage, BusReadError, BusSource, ClientHandle, Connection, PriceEventHandler,
    TransportError,
};

// Services
pub use application::services::{
    BroadcastError, BroadcastReport, ConnectionSession, RegistryConfig, RegistryStats,
    SessionSummary, SharedRegistry, SubscriptionRegistry,
};

// Infrastructure config
pub use infrastructure::config::{
    BusSettings, ConfigError, RegistrySettings, RelayConfig, ServerSettings,
};

// Broadcast adapter
pub use infrastructure::broadcast::RegistryBroadcaster;

// Bus ingestion
pub use infrastructure::bus::{
    BusConsumer, BusStatus, BusStatusSnapshot, ConsumerError, TickerRecord, TranslationError,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// WebSocket endpoint
pub use infrastructure::websocket::{ServerError, WsConnection, WsServer};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
