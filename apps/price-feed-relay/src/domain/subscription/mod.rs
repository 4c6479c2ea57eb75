//! Client Control Messages
//!
//! Domain types for the control frames a connected client sends to manage
//! its instrument subscriptions, and the error frame returned to that one
//! client when a control frame is rejected.
//!
//! # Wire Format
//!
//! ```text
//! inbound : {"action": "subscribe" | "unsubscribe", "stock": "<instrument-id>"}
//! outbound: {"type": "error", "message": "<description>"}
//! ```
//!
//! Validation order is fixed: the frame must decode, then the instrument
//! must be supported, then the action must be known.

use serde::{Deserialize, Serialize};

use crate::domain::streaming::Instrument;

// =============================================================================
// Types
// =============================================================================

/// Subscription action requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Start receiving events for an instrument.
    Subscribe,
    /// Stop receiving events for an instrument.
    Unsubscribe,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }

    fn from_wire(action: &str) -> Option<Self> {
        match action {
            "subscribe" => Some(Self::Subscribe),
            "unsubscribe" => Some(Self::Unsubscribe),
            _ => None,
        }
    }
}

/// Raw control frame as received from the client.
#[derive(Debug, Deserialize)]
struct ControlFrame {
    #[serde(default)]
    action: String,
    #[serde(default)]
    stock: String,
}

/// A validated control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCommand {
    /// Requested action.
    pub action: Action,
    /// Target instrument.
    pub instrument: Instrument,
}

impl ControlCommand {
    /// Parse and validate one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the frame is not a JSON control
    /// object, names an unsupported instrument, or carries an unknown action.
    pub fn parse(frame: &str) -> Result<Self, ValidationError> {
        let raw: ControlFrame =
            serde_json::from_str(frame).map_err(|_| ValidationError::MalformedFrame)?;

        let instrument = Instrument::from_wire(&raw.stock)
            .ok_or(ValidationError::UnsupportedInstrument(raw.stock))?;

        let action =
            Action::from_wire(&raw.action).ok_or(ValidationError::UnknownAction(raw.action))?;

        Ok(Self { action, instrument })
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Rejection of a client control frame.
///
/// Reported only to the offending connection; never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Frame is not a decodable control object.
    #[error("malformed control frame")]
    MalformedFrame,

    /// Instrument is outside the supported set.
    #[error("unsupported instrument: {0:?}")]
    UnsupportedInstrument(String),

    /// Action is neither subscribe nor unsubscribe.
    #[error("unknown action: {0:?}")]
    UnknownAction(String),
}

impl ValidationError {
    /// Message shown to the client in the error frame.
    #[must_use]
    pub const fn client_message(&self) -> &'static str {
        match self {
            Self::MalformedFrame => "Invalid message format.",
            Self::UnsupportedInstrument(_) => "Unsupported stock symbol",
            Self::UnknownAction(_) => "Unknown action",
        }
    }

    /// Build the error frame for this rejection.
    #[must_use]
    pub fn to_frame(&self) -> ErrorFrame {
        ErrorFrame::new(self.client_message())
    }
}

/// Error frame sent back to a single client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Always `"error"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorFrame {
    /// Create an error frame with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
