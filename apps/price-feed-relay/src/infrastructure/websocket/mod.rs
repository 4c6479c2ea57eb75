//! WebSocket Endpoint
//!
//! The single upgrade path clients connect to. Each upgraded socket becomes
//! a [`ClientHandle`] driven by its own [`ConnectionSession`] task.
//!
//! # Endpoint
//!
//! - `GET {ws_path}` - WebSocket upgrade (default `/ws/livepricesfeed`)

mod connection;

use std::net::SocketAddr;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use connection::WsConnection;

use crate::application::ports::ClientHandle;
use crate::application::services::{ConnectionSession, SharedRegistry};
use crate::infrastructure::config::ServerSettings;

// =============================================================================
// Router
// =============================================================================

#[derive(Clone)]
struct WsState {
    registry: SharedRegistry,
}

/// Build the upgrade router. `path` must start with `/`.
#[must_use]
pub fn router(path: &str, registry: SharedRegistry) -> Router {
    Router::new()
        .route(path, get(upgrade_handler))
        .with_state(WsState { registry })
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<WsState>,
) -> Response {
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(remote = %remote, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        let handle = ClientHandle::new(WsConnection::new(socket, remote));
        ConnectionSession::new(handle, state.registry).run().await;
    })
}

// =============================================================================
// Server
// =============================================================================

/// WebSocket HTTP server.
pub struct WsServer {
    port: u16,
    router: Router,
    cancel: CancellationToken,
}

impl WsServer {
    /// Create a server for the configured port and path.
    #[must_use]
    pub fn new(settings: &ServerSettings, registry: SharedRegistry, cancel: CancellationToken) -> Self {
        Self {
            port: settings.port,
            router: router(&settings.ws_path, registry),
            cancel,
        }
    }

    /// Bind the configured port and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ServerFailed` if the HTTP server fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(local) = listener.local_addr() {
            tracing::info!(addr = %local, "WebSocket server listening");
        }

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(self.cancel.cancelled_owned())
        .await
        .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}

/// WebSocket server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
