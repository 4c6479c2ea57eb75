//! Connection Port (Driven Port)
//!
//! Capability contract for one accepted client connection, and the shared
//! handle the registry and the session both hold onto.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

/// Failure on a client transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection, or it was closed locally.
    #[error("connection closed")]
    Closed,

    /// The operation did not complete before its deadline.
    #[error("transport deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Port for a bidirectional text-frame connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one text frame.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Wait for the next inbound text frame.
    async fn recv_text(&self) -> Result<String, TransportError>;

    /// Remote peer address.
    fn remote_addr(&self) -> SocketAddr;

    /// Close the transport. Must tolerate being called on a dead transport.
    async fn close(&self);
}

// =============================================================================
// Client Handle
// =============================================================================

struct ClientSlot {
    connection: Arc<dyn Connection>,
    closed: AtomicBool,
}

/// Shared handle to a connection.
///
/// Identity is the handle allocation, never the payload: two handles are
/// equal only if one was cloned from the other. The transport is closed at
/// most once across all clones.
#[derive(Clone)]
pub struct ClientHandle {
    slot: Arc<ClientSlot>,
}

impl ClientHandle {
    /// Wrap a connection in a new handle.
    #[must_use]
    pub fn new<C: Connection + 'static>(connection: C) -> Self {
        Self::from_arc(Arc::new(connection))
    }

    /// Wrap an already shared connection in a new handle.
    #[must_use]
    pub fn from_arc(connection: Arc<dyn Connection>) -> Self {
        Self {
            slot: Arc::new(ClientSlot {
                connection,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Remote peer address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.slot.connection.remote_addr()
    }

    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the handle has been closed, or
    /// whatever the transport reports.
    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.slot.connection.send_text(text).await
    }

    /// Wait for the next inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the handle has been closed, or
    /// whatever the transport reports.
    pub async fn recv_text(&self) -> Result<String, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.slot.connection.recv_text().await
    }

    /// Whether the close has been claimed by any holder.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::Acquire)
    }

    /// Claim the right to close. Returns true for exactly one caller.
    pub(crate) fn claim_close(&self) -> bool {
        !self.slot.closed.swap(true, Ordering::AcqRel)
    }

    /// Close the underlying transport without claiming.
    pub(crate) async fn close_transport(&self) {
        self.slot.connection.close().await;
    }

    /// Close the transport if nobody has yet. Returns true if this call
    /// performed the close.
    pub async fn close(&self) -> bool {
        if self.claim_close() {
            self.close_transport().await;
            true
        } else {
            false
        }
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for ClientHandle {}

impl Hash for ClientHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.slot), state);
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("remote_addr", &self.remote_addr())
            .field("closed", &self.is_closed())
            .finish()
    }
}
