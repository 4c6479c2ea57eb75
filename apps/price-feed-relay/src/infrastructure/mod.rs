//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains adapters for the message bus, the client websocket
//! endpoint, and the operational surfaces (config, telemetry, metrics,
//! health).

/// Registry-backed event handler.
pub mod broadcast;

/// Kafka ingestion: wire records, translation, consumer loop.
pub mod bus;

/// Configuration loading.
pub mod config;

/// Health check HTTP server.
pub mod health;

/// Prometheus metrics.
pub mod metrics;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;

/// Client websocket endpoint.
pub mod websocket;
