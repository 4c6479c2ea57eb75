//! Connection Session
//!
//! Drives one accepted connection: registers it, turns inbound control
//! frames into registry calls, answers rejected frames with an error frame
//! to that client only, and cleans up exactly once when the transport ends.

use std::time::Duration;

use tracing::Instrument as _;
use uuid::Uuid;

use crate::application::ports::{ClientHandle, TransportError};
use crate::application::services::registry::SharedRegistry;
use crate::domain::subscription::{Action, ControlCommand, ValidationError};

/// What happened over the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identifier used in logs.
    pub id: Uuid,
    /// Inbound frames read.
    pub frames_received: u64,
    /// Control commands forwarded to the registry.
    pub commands_applied: u64,
    /// Frames rejected with an error frame.
    pub rejected: u64,
    /// Transport condition that ended the session.
    pub ended_by: TransportError,
    /// Whether this session performed the transport close, rather than a
    /// concurrent eviction.
    pub closed_by_session: bool,
}

/// Per-connection read loop.
pub struct ConnectionSession {
    id: Uuid,
    handle: ClientHandle,
    registry: SharedRegistry,
    write_timeout: Duration,
}

impl ConnectionSession {
    /// Create a session for an accepted connection.
    #[must_use]
    pub fn new(handle: ClientHandle, registry: SharedRegistry) -> Self {
        let write_timeout = registry.config().write_timeout;
        Self {
            id: Uuid::new_v4(),
            handle,
            registry,
            write_timeout,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Run until the transport fails or closes.
    ///
    /// On exit the connection is always removed from the registry and its
    /// transport closed, unless an eviction already closed it.
    pub async fn run(self) -> SessionSummary {
        let span = tracing::info_span!(
            "session",
            id = %self.id,
            remote = %self.handle.remote_addr()
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> SessionSummary {
        tracing::info!("Client session started");
        self.registry.add_client(&self.handle);

        let mut frames_received = 0;
        let mut commands_applied = 0;
        let mut rejected = 0;

        let ended_by = loop {
            let frame = match self.handle.recv_text().await {
                Ok(frame) => frame,
                Err(e) => break e,
            };
            frames_received += 1;

            match ControlCommand::parse(&frame) {
                Ok(command) => {
                    self.apply(command);
                    commands_applied += 1;
                }
                Err(err) => {
                    rejected += 1;
                    tracing::debug!(error = %err, "Rejected control frame");
                    if let Err(e) = self.send_error(&err).await {
                        break e;
                    }
                }
            }
        };

        self.registry.remove_client(&self.handle);
        let closed_by_session = self.handle.close().await;

        tracing::info!(
            reason = %ended_by,
            frames_received,
            commands_applied,
            rejected,
            "Client session ended"
        );

        SessionSummary {
            id: self.id,
            frames_received,
            commands_applied,
            rejected,
            ended_by,
            closed_by_session,
        }
    }

    fn apply(&self, command: ControlCommand) {
        match command.action {
            Action::Subscribe => {
                self.registry.subscribe(&self.handle, command.instrument);
            }
            Action::Unsubscribe => {
                self.registry.unsubscribe(&self.handle, command.instrument);
            }
        }
    }

    async fn send_error(&self, err: &ValidationError) -> Result<(), TransportError> {
        let json = match err.to_frame().to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error frame");
                return Ok(());
            }
        };

        tokio::time::timeout(self.write_timeout, self.handle.send_text(&json))
            .await
            .map_err(|_| TransportError::Timeout(self.write_timeout))?
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
