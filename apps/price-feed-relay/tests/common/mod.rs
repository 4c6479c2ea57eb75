//! Shared fakes for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use price_feed_relay::{
    BusMessage, BusReadError, BusSource, Connection, Instrument, PriceEvent, TransportError,
};

// =============================================================================
// Fake Connection
// =============================================================================

/// In-memory client connection.
///
/// Records outbound frames, replays inbound frames pushed through the
/// sender returned by [`FakeConnection::new`], and can be told to fail or
/// stall writes.
pub struct FakeConnection {
    remote: SocketAddr,
    sent: Mutex<Vec<String>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    closed: CancellationToken,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    closes: AtomicUsize,
}

impl FakeConnection {
    pub fn new(port: u16) -> (Arc<Self>, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            remote: SocketAddr::from(([127, 0, 0, 1], port)),
            sent: Mutex::new(Vec::new()),
            inbound: tokio::sync::Mutex::new(rx),
            closed: CancellationToken::new(),
            fail_writes: AtomicBool::new(false),
            write_delay: Mutex::new(None),
            closes: AtomicUsize::new(0),
        });
        (conn, tx)
    }

    pub fn failing(port: u16) -> Arc<Self> {
        let (conn, _tx) = Self::new(port);
        conn.fail_writes.store(true, Ordering::SeqCst);
        conn
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Io("connection reset by peer".into()));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    async fn recv_text(&self) -> Result<String, TransportError> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            frame = inbound.recv() => frame.ok_or(TransportError::Closed),
        }
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
    }
}

// =============================================================================
// Channel Bus Source
// =============================================================================

/// Bus source fed from a channel. A closed channel parks forever, like an
/// idle topic.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<BusMessage, BusReadError>>,
    closed: Arc<AtomicBool>,
}

impl ChannelSource {
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<Result<BusMessage, BusReadError>>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx,
                closed: Arc::clone(&closed),
            },
            tx,
            closed,
        )
    }
}

#[async_trait]
impl BusSource for ChannelSource {
    async fn next_message(&mut self) -> Result<BusMessage, BusReadError> {
        match self.rx.recv().await {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub const TICK_JSON: &str = r#"{"type":"ticker","sequence":100,"product_id":"BTC-USD","price":"100.0","open_24h":"100.0","volume_24h":"100.0","low_24h":"100.0","high_24h":"100.0","volume_30d":"100.0","best_bid":"100.0","best_bid_size":"100.0","best_ask":"100.0","best_ask_size":"100.0","side":"buy","time":"2023-11-18T12:34:56Z","trade_id":100,"last_size":"100.0"}"#;

pub const SUBSCRIBE_BTC: &str = r#"{"action":"subscribe","stock":"BTC-USD"}"#;
pub const UNSUBSCRIBE_BTC: &str = r#"{"action":"unsubscribe","stock":"BTC-USD"}"#;

pub fn fixture_event(sequence: i64) -> PriceEvent {
    PriceEvent {
        kind: "ticker".into(),
        sequence,
        product_id: Instrument::BtcUsd,
        price: 100.0,
        open_24h: 100.0,
        volume_24h: 100.0,
        low_24h: 100.0,
        high_24h: 100.0,
        volume_30d: 100.0,
        best_bid: 100.0,
        best_bid_size: 100.0,
        best_ask: 100.0,
        best_ask_size: 100.0,
        side: "buy".into(),
        time: DateTime::parse_from_rfc3339("2023-11-18T12:34:56Z").unwrap(),
        trade_id: 100,
        last_size: 100.0,
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
