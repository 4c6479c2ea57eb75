//! Subscription Registry & Broadcaster
//!
//! Tracks every live client connection and, per instrument, the subset of
//! connections subscribed to it. Fans each price event out to exactly the
//! subscribers of its instrument and evicts any subscriber whose write
//! fails or misses its deadline.
//!
//! # Locking
//!
//! - `connections` and each per-instrument set have their own `RwLock`.
//! - Lock order is always `connections` before any instrument set.
//! - A broadcast holds only its instrument's read lock, and only long
//!   enough to snapshot the subscriber handles. No lock is held across a
//!   transport write.
//! - Eviction and removal hold the `connections` write lock while they
//!   clear the handle from every instrument set, so subscribe can never
//!   re-insert a handle that is mid-eviction.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;

use crate::application::ports::{ClientHandle, TransportError};
use crate::domain::streaming::{Instrument, PriceEvent};

// =============================================================================
// Configuration
// =============================================================================

/// Registry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Deadline for a single subscriber write during broadcast.
    pub write_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Errors & Reports
// =============================================================================

/// Failure of a whole broadcast call.
///
/// Individual subscriber failures are never reported here; they are
/// handled by eviction.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The event could not be encoded.
    #[error("failed to serialize price event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Instrument the event was routed by.
    pub instrument: Instrument,
    /// Subscribers written to successfully.
    pub delivered: usize,
    /// Subscribers evicted after a failed or late write.
    pub evicted: usize,
}

impl BroadcastReport {
    const fn empty(instrument: Instrument) -> Self {
        Self {
            instrument,
            delivered: 0,
            evicted: 0,
        }
    }
}

/// Registry statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Live connections.
    pub connections: usize,
    /// Subscriber count per instrument.
    pub subscriptions: BTreeMap<Instrument, usize>,
    /// Frames delivered since start.
    pub frames_sent: u64,
    /// Subscribers evicted since start.
    pub evictions: u64,
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrent connection registry and per-instrument broadcaster.
pub struct SubscriptionRegistry {
    config: RegistryConfig,
    connections: RwLock<HashSet<ClientHandle>>,
    subscribers: [RwLock<HashSet<ClientHandle>>; Instrument::COUNT],
    frames_sent: AtomicU64,
    evictions: AtomicU64,
}

/// Shared reference to the registry.
pub type SharedRegistry = Arc<SubscriptionRegistry>;

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            connections: RwLock::new(HashSet::new()),
            subscribers: std::array::from_fn(|_| RwLock::new(HashSet::new())),
            frames_sent: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a shared registry.
    #[must_use]
    pub fn shared(config: RegistryConfig) -> SharedRegistry {
        Arc::new(Self::new(config))
    }

    /// Registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn set_for(&self, instrument: Instrument) -> &RwLock<HashSet<ClientHandle>> {
        &self.subscribers[instrument.index()]
    }

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    /// Record a connection. Returns true if it was not already present.
    ///
    /// A handle that has already been closed is never recorded.
    pub fn add_client(&self, handle: &ClientHandle) -> bool {
        let mut conns = self.connections.write();
        if handle.is_closed() {
            return false;
        }
        let added = conns.insert(handle.clone());
        drop(conns);

        if added {
            tracing::info!(remote = %handle.remote_addr(), "Client connected");
        }
        added
    }

    /// Forget a connection and every subscription it holds.
    ///
    /// Returns true if the handle was known to the registry at all.
    pub fn remove_client(&self, handle: &ClientHandle) -> bool {
        let mut conns = self.connections.write();
        let mut known = conns.remove(handle);
        for instrument in Instrument::all() {
            let mut set = self.set_for(*instrument).write();
            known |= set.remove(handle);
        }
        drop(conns);

        if known {
            tracing::info!(remote = %handle.remote_addr(), "Client removed");
        }
        known
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    /// Subscribe a connection to an instrument.
    ///
    /// Idempotent. A connection not yet recorded is recorded implicitly, so
    /// every subscriber is always a connection. A closed handle is ignored.
    /// Returns true if the subscription is new.
    pub fn subscribe(&self, handle: &ClientHandle, instrument: Instrument) -> bool {
        let mut conns = self.connections.write();
        if handle.is_closed() {
            return false;
        }
        conns.insert(handle.clone());

        let mut set = self.set_for(instrument).write();
        let added = set.insert(handle.clone());
        drop(set);
        drop(conns);

        tracing::info!(
            remote = %handle.remote_addr(),
            instrument = %instrument,
            new = added,
            "Subscribed"
        );
        added
    }

    /// Unsubscribe a connection from an instrument.
    ///
    /// Returns true if the connection was subscribed. Never an error.
    pub fn unsubscribe(&self, handle: &ClientHandle, instrument: Instrument) -> bool {
        let mut set = self.set_for(instrument).write();
        let removed = set.remove(handle);
        drop(set);

        tracing::info!(
            remote = %handle.remote_addr(),
            instrument = %instrument,
            removed,
            "Unsubscribed"
        );
        removed
    }

    // -------------------------------------------------------------------------
    // Broadcast
    // -------------------------------------------------------------------------

    /// Deliver an event to every current subscriber of its instrument.
    ///
    /// The event is serialized once. Writes run concurrently, each under the
    /// configured deadline; a subscriber whose write fails or times out is
    /// evicted and closed without affecting the others.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Serialize`] if the event cannot be encoded.
    /// Subscriber failures are never returned as errors.
    pub async fn broadcast(&self, event: &PriceEvent) -> Result<BroadcastReport, BroadcastError> {
        let instrument = event.instrument();
        let targets: Vec<ClientHandle> = self.set_for(instrument).read().iter().cloned().collect();

        if targets.is_empty() {
            return Ok(BroadcastReport::empty(instrument));
        }

        let frame = serde_json::to_string(event)?;
        let deadline = self.config.write_timeout;

        let results = join_all(targets.iter().map(|handle| {
            let frame = frame.as_str();
            async move {
                match tokio::time::timeout(deadline, handle.send_text(frame)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(deadline)),
                }
            }
        }))
        .await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (handle, result) in targets.into_iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        remote = %handle.remote_addr(),
                        instrument = %instrument,
                        error = %e,
                        "Subscriber write failed, evicting"
                    );
                    failed.push(handle);
                }
            }
        }

        let evicted = failed.len();
        if !failed.is_empty() {
            self.evict(&failed).await;
        }

        self.frames_sent.fetch_add(delivered as u64, Ordering::Relaxed);

        Ok(BroadcastReport {
            instrument,
            delivered,
            evicted,
        })
    }

    /// Remove failed handles everywhere, then close each one whose close
    /// this call claimed. Transports are closed after all locks drop.
    async fn evict(&self, handles: &[ClientHandle]) {
        let mut to_close = Vec::with_capacity(handles.len());
        {
            let mut conns = self.connections.write();
            for handle in handles {
                if handle.claim_close() {
                    to_close.push(handle.clone());
                }
                conns.remove(handle);
                for set in &self.subscribers {
                    set.write().remove(handle);
                }
            }
        }

        self.evictions
            .fetch_add(handles.len() as u64, Ordering::Relaxed);

        for handle in &to_close {
            handle.close_transport().await;
        }
    }

    /// Drop every connection and subscription, then close each transport
    /// not already closed. Used on shutdown. Returns the number closed here.
    pub async fn close_all(&self) -> usize {
        let handles: Vec<ClientHandle> = {
            let mut conns = self.connections.write();
            for set in &self.subscribers {
                set.write().clear();
            }
            conns.drain().collect()
        };

        let mut closed = 0;
        for handle in &handles {
            if handle.close().await {
                closed += 1;
            }
        }
        tracing::info!(connections = handles.len(), closed, "Closed all client connections");
        closed
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Copy of all live connections.
    #[must_use]
    pub fn connections(&self) -> Vec<ClientHandle> {
        self.connections.read().iter().cloned().collect()
    }

    /// Copy of the subscribers of an instrument.
    #[must_use]
    pub fn subscribers(&self, instrument: Instrument) -> Vec<ClientHandle> {
        self.set_for(instrument).read().iter().cloned().collect()
    }

    /// Whether the handle is a live connection.
    #[must_use]
    pub fn is_connected(&self, handle: &ClientHandle) -> bool {
        self.connections.read().contains(handle)
    }

    /// Whether the handle is subscribed to the instrument.
    #[must_use]
    pub fn is_subscribed(&self, handle: &ClientHandle, instrument: Instrument) -> bool {
        self.set_for(instrument).read().contains(handle)
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Number of subscribers of an instrument.
    #[must_use]
    pub fn subscriber_count(&self, instrument: Instrument) -> usize {
        self.set_for(instrument).read().len()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            connections: self.connection_count(),
            subscriptions: Instrument::all()
                .iter()
                .map(|i| (*i, self.subscriber_count(*i)))
                .collect(),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
