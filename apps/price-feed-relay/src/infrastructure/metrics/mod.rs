//! Prometheus Metrics Module
//!
//! Exposes relay metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: Bus messages received, dropped, and read errors
//! - **Delivery**: Frames sent, evictions, broadcast latency
//! - **Clients**: Live connections and per-instrument subscriptions
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! functions are no-ops until [`init_metrics`] installs the recorder.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::services::{BroadcastReport, RegistryStats};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the already installed handle.
///
/// # Errors
///
/// Returns an error if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Ingestion
    describe_counter!(
        "price_relay_messages_received_total",
        "Total messages read from the price bus"
    );
    describe_counter!(
        "price_relay_messages_dropped_total",
        "Total bus messages dropped before broadcast, by reason"
    );
    describe_counter!(
        "price_relay_bus_read_errors_total",
        "Total transient bus read errors"
    );

    // Delivery
    describe_counter!(
        "price_relay_frames_sent_total",
        "Total price frames written to subscribers"
    );
    describe_counter!(
        "price_relay_evictions_total",
        "Total subscribers evicted after a failed or late write"
    );
    describe_histogram!(
        "price_relay_broadcast_seconds",
        "Time to fan one event out to all of its subscribers"
    );

    // Clients
    describe_gauge!(
        "price_relay_connections",
        "Number of live client connections"
    );
    describe_gauge!(
        "price_relay_subscriptions",
        "Number of subscribers per instrument"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Reasons a bus message is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload failed translation.
    Translation,
    /// Handler rejected the event.
    Handler,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Handler => "handler",
        }
    }
}

/// Record a message read from the bus.
pub fn record_message_received() {
    counter!("price_relay_messages_received_total").increment(1);
}

/// Record a dropped bus message.
pub fn record_message_dropped(reason: DropReason) {
    counter!(
        "price_relay_messages_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a transient bus read error.
pub fn record_bus_read_error() {
    counter!("price_relay_bus_read_errors_total").increment(1);
}

/// Record the outcome of one broadcast.
pub fn record_broadcast(report: &BroadcastReport, duration: Duration) {
    counter!("price_relay_frames_sent_total").increment(report.delivered as u64);
    if report.evicted > 0 {
        counter!("price_relay_evictions_total").increment(report.evicted as u64);
    }
    histogram!("price_relay_broadcast_seconds").record(duration.as_secs_f64());
}

/// Refresh the connection and per-instrument subscriber gauges.
#[allow(clippy::cast_precision_loss)]
pub fn record_registry_stats(stats: &RegistryStats) {
    gauge!("price_relay_connections").set(stats.connections as f64);
    for (instrument, count) in &stats.subscriptions {
        gauge!(
            "price_relay_subscriptions",
            "instrument" => instrument.as_str()
        )
        .set(*count as f64);
    }
}

// =============================================================================
// Tests
// =============================================================================
