//! Price Event Handler Port (Driver Port)
//!
//! The single sink the bus consumer hands each translated event to.

use async_trait::async_trait;

use crate::domain::streaming::PriceEvent;

/// Port for consuming translated price events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceEventHandler: Send + Sync {
    /// Handle one event. An error is logged by the caller and never stops
    /// ingestion.
    async fn handle(&self, event: &PriceEvent) -> anyhow::Result<()>;
}
