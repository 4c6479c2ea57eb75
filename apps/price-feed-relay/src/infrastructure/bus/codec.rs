//! Bus Codec Module
//!
//! Decodes bus payloads into [`TickerRecord`]s and translates records into
//! validated [`PriceEvent`]s. Translation is pure: no state, no I/O, and
//! no partial events.
//!
//! Checks run in a fixed order: instrument first, then each numeric field
//! in wire order, then the timestamp. The first failure wins.

use std::num::ParseFloatError;

use chrono::DateTime;

use super::messages::TickerRecord;
use crate::domain::streaming::{Instrument, PriceEvent};

/// Translation errors.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    /// Payload is not a JSON ticker record.
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Instrument is outside the supported set.
    #[error("unsupported instrument: {0:?}")]
    UnsupportedInstrument(String),

    /// A numeric field did not parse.
    #[error("failed to parse field `{field}`: {cause}")]
    FieldParse {
        /// Wire name of the offending field.
        field: &'static str,
        /// Parser error.
        #[source]
        cause: ParseFloatError,
    },

    /// A numeric field parsed to NaN or an infinity, which has no JSON
    /// number form.
    #[error("field `{field}` is not a finite number: {value:?}")]
    NonFinite {
        /// Wire name of the offending field.
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// The timestamp did not parse as RFC 3339.
    #[error("failed to parse time {value:?}: {cause}")]
    TimeParse {
        /// Raw timestamp.
        value: String,
        /// Parser error.
        #[source]
        cause: chrono::ParseError,
    },
}

impl TranslationError {
    /// Wire name of the field that failed to parse, if any.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::FieldParse { field, .. } | Self::NonFinite { field, .. } => Some(*field),
            Self::TimeParse { .. } => Some("time"),
            Self::Decode(_) | Self::UnsupportedInstrument(_) => None,
        }
    }
}

/// Decode a raw payload into a ticker record.
///
/// # Errors
///
/// Returns [`TranslationError::Decode`] if the payload is not valid JSON for
/// a ticker record.
pub fn decode(payload: &[u8]) -> Result<TickerRecord, TranslationError> {
    Ok(serde_json::from_slice(payload)?)
}

fn parse_field(field: &'static str, raw: &str) -> Result<f64, TranslationError> {
    let value = raw
        .parse::<f64>()
        .map_err(|cause| TranslationError::FieldParse { field, cause })?;
    if !value.is_finite() {
        return Err(TranslationError::NonFinite {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// Translate a ticker record into a validated price event.
///
/// # Errors
///
/// Returns the first validation failure: an unsupported instrument, a
/// numeric field that does not parse (named by its wire key), or a
/// malformed timestamp.
pub fn translate(record: TickerRecord) -> Result<PriceEvent, TranslationError> {
    let product_id = Instrument::from_wire(&record.product_id)
        .ok_or_else(|| TranslationError::UnsupportedInstrument(record.product_id.clone()))?;

    let price = parse_field("price", &record.price)?;
    let open_24h = parse_field("open_24h", &record.open_24h)?;
    let volume_24h = parse_field("volume_24h", &record.volume_24h)?;
    let low_24h = parse_field("low_24h", &record.low_24h)?;
    let high_24h = parse_field("high_24h", &record.high_24h)?;
    let volume_30d = parse_field("volume_30d", &record.volume_30d)?;
    let best_bid = parse_field("best_bid", &record.best_bid)?;
    let best_bid_size = parse_field("best_bid_size", &record.best_bid_size)?;
    let best_ask = parse_field("best_ask", &record.best_ask)?;
    let best_ask_size = parse_field("best_ask_size", &record.best_ask_size)?;
    let last_size = parse_field("last_size", &record.last_size)?;

    let time = DateTime::parse_from_rfc3339(&record.time).map_err(|cause| {
        TranslationError::TimeParse {
            value: record.time.clone(),
            cause,
        }
    })?;

    Ok(PriceEvent {
        kind: record.kind,
        sequence: record.sequence,
        product_id,
        price,
        open_24h,
        volume_24h,
        low_24h,
        high_24h,
        volume_30d,
        best_bid,
        best_bid_size,
        best_ask,
        best_ask_size,
        side: record.side,
        time,
        trade_id: record.trade_id,
        last_size,
    })
}

/// Decode and translate a raw payload in one step.
///
/// # Errors
///
/// See [`decode`] and [`translate`].
pub fn decode_event(payload: &[u8]) -> Result<PriceEvent, TranslationError> {
    translate(decode(payload)?)
}

// =============================================================================
// Tests
// =============================================================================
