//! Broadcast Adapter
//!
//! Plugs the subscription registry into the bus consumer as its
//! [`PriceEventHandler`] and records fan-out metrics from each
//! [`BroadcastReport`](crate::application::services::BroadcastReport).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::application::ports::PriceEventHandler;
use crate::application::services::SharedRegistry;
use crate::domain::streaming::PriceEvent;
use crate::infrastructure::metrics;

/// Event handler that fans events out through the registry.
#[derive(Debug, Clone)]
pub struct RegistryBroadcaster {
    registry: SharedRegistry,
}

impl RegistryBroadcaster {
    /// Wrap a registry.
    #[must_use]
    pub const fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Wrap a registry, ready to hand to the consumer.
    #[must_use]
    pub fn shared(registry: SharedRegistry) -> Arc<Self> {
        Arc::new(Self::new(registry))
    }

    /// The wrapped registry.
    #[must_use]
    pub const fn registry(&self) -> &SharedRegistry {
        &self.registry
    }
}

#[async_trait]
impl PriceEventHandler for RegistryBroadcaster {
    async fn handle(&self, event: &PriceEvent) -> anyhow::Result<()> {
        let started = Instant::now();
        let report = self.registry.broadcast(event).await?;
        metrics::record_broadcast(&report, started.elapsed());
        metrics::record_registry_stats(&self.registry.stats());

        tracing::debug!(
            instrument = %report.instrument,
            delivered = report.delivered,
            evicted = report.evicted,
            sequence = event.sequence,
            "Broadcast event"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
