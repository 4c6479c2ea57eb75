//! Bus Port (Driven Port)
//!
//! Interface for reading raw price messages from the message bus.

use async_trait::async_trait;

/// One raw message read from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Message payload bytes.
    pub payload: Vec<u8>,
    /// Partition the message was read from.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

impl BusMessage {
    /// Create a message with no partition metadata.
    #[must_use]
    pub fn from_payload(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            partition: 0,
            offset: 0,
        }
    }
}

/// Transient failure reading from the bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusReadError {
    /// Broker or client reported an error.
    #[error("bus read failed: {0}")]
    Broker(String),

    /// Message arrived with no payload.
    #[error("message at partition {partition} offset {offset} has no payload")]
    EmptyPayload {
        /// Partition of the empty message.
        partition: i32,
        /// Offset of the empty message.
        offset: i64,
    },
}

/// Port for a bus subscription.
///
/// Reconnection is the implementation's concern; a read error is expected
/// to be transient.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BusSource: Send {
    /// Wait for the next message.
    async fn next_message(&mut self) -> Result<BusMessage, BusReadError>;

    /// Release bus resources.
    async fn close(&mut self);
}
