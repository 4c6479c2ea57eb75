//! Bus Consumer Loop
//!
//! Reads raw messages from a [`BusSource`], translates each into a
//! [`PriceEvent`], and hands it to the registered [`PriceEventHandler`].
//!
//! # Failure Policy
//!
//! - Read errors are logged, counted, and retried after a short backoff.
//! - Translation failures drop the message (at-most-once).
//! - Handler failures are logged; the next message is processed normally.
//! - Cancellation ends the loop cleanly. The source is closed on every exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::codec::{self, TranslationError};
use crate::application::ports::{BusMessage, BusSource, PriceEventHandler};
use crate::domain::streaming::PriceEvent;
use crate::infrastructure::metrics::{self, DropReason};

// =============================================================================
// Errors
// =============================================================================

/// Consumer errors.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// `run` or `process_message` was called before `set_handler`.
    #[error("no price event handler registered")]
    HandlerNotSet,

    /// A message failed translation and was dropped.
    #[error("dropped message at partition {partition} offset {offset}")]
    Translation {
        /// Partition of the dropped message.
        partition: i32,
        /// Offset of the dropped message.
        offset: i64,
        /// Why translation failed.
        #[source]
        source: TranslationError,
    },

    /// The handler rejected a translated event.
    #[error("price event handler failed: {0:#}")]
    Handler(anyhow::Error),
}

// =============================================================================
// Status
// =============================================================================

/// Live consumer status shared with the health server.
#[derive(Debug, Default)]
pub struct BusStatus {
    running: AtomicBool,
    messages_received: AtomicU64,
    events_handled: AtomicU64,
    dropped: AtomicU64,
    read_errors: AtomicU64,
    consecutive_read_errors: AtomicU64,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`BusStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusStatusSnapshot {
    /// Whether the consumer loop is running.
    pub running: bool,
    /// Messages read from the bus.
    pub messages_received: u64,
    /// Events accepted by the handler.
    pub events_handled: u64,
    /// Messages dropped by translation or handler failure.
    pub dropped: u64,
    /// Read errors since start.
    pub read_errors: u64,
    /// Read errors since the last successful read.
    pub consecutive_read_errors: u64,
    /// Time of the last successful read.
    pub last_message_at: Option<DateTime<Utc>>,
}

impl BusStatus {
    /// Create a shared status.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether the consumer loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Read errors since the last successful read.
    #[must_use]
    pub fn consecutive_read_errors(&self) -> u64 {
        self.consecutive_read_errors.load(Ordering::Relaxed)
    }

    /// Take a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BusStatusSnapshot {
        BusStatusSnapshot {
            running: self.is_running(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            events_handled: self.events_handled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            consecutive_read_errors: self.consecutive_read_errors(),
            last_message_at: *self.last_message_at.read(),
        }
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.consecutive_read_errors.store(0, Ordering::Relaxed);
        *self.last_message_at.write() = Some(Utc::now());
    }

    fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
        self.consecutive_read_errors.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// Default pause after a failed read.
pub const DEFAULT_READ_ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// Bus consumer loop.
pub struct BusConsumer<S> {
    source: S,
    handler: Option<Arc<dyn PriceEventHandler>>,
    status: Arc<BusStatus>,
    read_error_backoff: Duration,
}

impl<S: BusSource> BusConsumer<S> {
    /// Create a consumer over a bus source.
    #[must_use]
    pub fn new(source: S, status: Arc<BusStatus>) -> Self {
        Self {
            source,
            handler: None,
            status,
            read_error_backoff: DEFAULT_READ_ERROR_BACKOFF,
        }
    }

    /// Set the pause after a failed read.
    #[must_use]
    pub const fn with_read_error_backoff(mut self, backoff: Duration) -> Self {
        self.read_error_backoff = backoff;
        self
    }

    /// Register the event handler. Call once before [`run`](Self::run).
    pub fn set_handler(&mut self, handler: Arc<dyn PriceEventHandler>) {
        self.handler = Some(handler);
    }

    /// Shared status.
    #[must_use]
    pub fn status(&self) -> Arc<BusStatus> {
        Arc::clone(&self.status)
    }

    /// Translate one message and hand the event to the handler.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::HandlerNotSet`] without a handler,
    /// [`ConsumerError::Translation`] if the payload is rejected, or
    /// [`ConsumerError::Handler`] if the handler fails.
    pub async fn process_message(&self, message: &BusMessage) -> Result<PriceEvent, ConsumerError> {
        let handler = self.handler.as_ref().ok_or(ConsumerError::HandlerNotSet)?;

        let event = codec::decode_event(&message.payload).map_err(|source| {
            ConsumerError::Translation {
                partition: message.partition,
                offset: message.offset,
                source,
            }
        })?;

        handler.handle(&event).await.map_err(ConsumerError::Handler)?;
        Ok(event)
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::HandlerNotSet`] if no handler was registered.
    /// Every other failure is logged and the loop continues.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ConsumerError> {
        if self.handler.is_none() {
            self.source.close().await;
            return Err(ConsumerError::HandlerNotSet);
        }

        self.status.set_running(true);
        tracing::info!("Bus consumer started");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = self.source.next_message() => next,
            };

            match next {
                Ok(message) => {
                    self.status.record_message();
                    metrics::record_message_received();
                    self.dispatch(&message).await;
                }
                Err(e) => {
                    self.status.record_read_error();
                    metrics::record_bus_read_error();
                    tracing::warn!(
                        error = %e,
                        consecutive = self.status.consecutive_read_errors(),
                        "Bus read failed"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.read_error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("Bus consumer cancelled, releasing source");
        self.source.close().await;
        self.status.set_running(false);
        Ok(())
    }

    async fn dispatch(&self, message: &BusMessage) {
        match self.process_message(message).await {
            Ok(event) => {
                self.status.events_handled.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(sequence = event.sequence, "Price event handled");
            }
            Err(ConsumerError::Translation {
                partition,
                offset,
                source,
            }) => {
                self.status.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_message_dropped(DropReason::Translation);
                tracing::warn!(partition, offset, error = %source, "Dropping untranslatable message");
            }
            Err(e) => {
                self.status.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_message_dropped(DropReason::Handler);
                tracing::error!(error = %e, "Price event handler failed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
