//! Axum WebSocket Connection Adapter
//!
//! Implements the [`Connection`] port over an upgraded axum socket. The
//! socket is split so a broadcast write never waits behind the session's
//! pending read.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Connection, TransportError};

/// Upper bound on sending the close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One upgraded client websocket.
pub struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    remote: SocketAddr,
    closed: CancellationToken,
}

impl WsConnection {
    /// Wrap an upgraded socket.
    #[must_use]
    pub fn new(socket: WebSocket, remote: SocketAddr) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            remote,
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv_text(&self) -> Result<String, TransportError> {
        let mut stream = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Err(TransportError::Closed),
            guard = self.stream.lock() => guard,
        };

        loop {
            let next = tokio::select! {
                biased;
                () = self.closed.cancelled() => return Err(TransportError::Closed),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    async fn close(&self) {
        self.closed.cancel();
        let close = async {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.close().await {
                tracing::debug!(remote = %self.remote, error = %e, "Close frame not delivered");
            }
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
            tracing::debug!(remote = %self.remote, "Timed out closing websocket");
        }
    }
}
