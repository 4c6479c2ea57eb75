//! Price Streaming Types
//!
//! Core domain types for the relayed price stream: the closed set of
//! supported instruments and the validated tick snapshot fanned out to
//! subscribers. These types are codec-agnostic; the bus wire format lives
//! in the infrastructure layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// =============================================================================
// Instrument
// =============================================================================

/// A supported instrument.
///
/// The set of instruments the relay accepts is closed and fixed at compile
/// time. Anything outside it is rejected both on ingestion and on client
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Instrument {
    /// Bitcoin quoted in US dollars.
    #[serde(rename = "BTC-USD")]
    BtcUsd,
}

impl Instrument {
    /// Number of supported instruments.
    pub const COUNT: usize = 1;

    /// Get all supported instruments.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::BtcUsd]
    }

    /// Wire identifier (product id) of the instrument.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BtcUsd => "BTC-USD",
        }
    }

    /// Dense index in `0..COUNT`, used to address per-instrument state.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::BtcUsd => 0,
        }
    }

    /// Look up an instrument by its exact wire identifier.
    #[must_use]
    pub fn from_wire(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|i| i.as_str() == id)
    }

    /// Whether `id` names a supported instrument.
    #[must_use]
    pub fn is_supported(id: &str) -> bool {
        Self::from_wire(id).is_some()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier outside the supported instrument set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported instrument: {0:?}")]
pub struct UnsupportedInstrument(pub String);

impl FromStr for Instrument {
    type Err = UnsupportedInstrument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| UnsupportedInstrument(s.to_string()))
    }
}

// =============================================================================
// Price Event
// =============================================================================

/// Validated snapshot of a single instrument tick.
///
/// Built once by the event translator and then only shared by reference;
/// the broadcaster serializes it once per broadcast.
///
/// # Wire Format (JSON, outbound)
/// ```json
/// {
///   "type": "ticker", "sequence": 100, "product_id": "BTC-USD",
///   "price": 100.0, "open_24h": 100.0, "volume_24h": 100.0,
///   "low_24h": 100.0, "high_24h": 100.0, "volume_30d": 100.0,
///   "best_bid": 100.0, "best_bid_size": 100.0,
///   "best_ask": 100.0, "best_ask_size": 100.0,
///   "side": "buy", "time": "2023-11-18T12:34:56Z",
///   "trade_id": 100, "last_size": 100.0
/// }
/// ```
///
/// Keys deliberately mirror the inbound bus record, not capitalized field
/// names such as `Price` or `ProductID`. Numbers go out as JSON numbers,
/// and `time` keeps its source offset in RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    /// Upstream message type (e.g. "ticker").
    #[serde(rename = "type")]
    pub kind: String,
    /// Upstream sequence number.
    pub sequence: i64,
    /// Instrument this tick belongs to.
    pub product_id: Instrument,
    /// Last trade price.
    pub price: f64,
    /// Opening price over the trailing 24 hours.
    pub open_24h: f64,
    /// Volume over the trailing 24 hours.
    pub volume_24h: f64,
    /// Low over the trailing 24 hours.
    pub low_24h: f64,
    /// High over the trailing 24 hours.
    pub high_24h: f64,
    /// Volume over the trailing 30 days.
    pub volume_30d: f64,
    /// Best bid price.
    pub best_bid: f64,
    /// Size at the best bid.
    pub best_bid_size: f64,
    /// Best ask price.
    pub best_ask: f64,
    /// Size at the best ask.
    pub best_ask_size: f64,
    /// Taker side of the last trade.
    pub side: String,
    /// Exchange timestamp of the tick.
    pub time: DateTime<FixedOffset>,
    /// Identifier of the last trade.
    pub trade_id: i64,
    /// Size of the last trade.
    pub last_size: f64,
}

impl PriceEvent {
    /// Instrument the event is routed by.
    #[must_use]
    pub const fn instrument(&self) -> Instrument {
        self.product_id
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_wire_roundtrip() {
        for instrument in Instrument::all() {
            assert_eq!(Instrument::from_wire(instrument.as_str()), Some(*instrument));
        }
    }

    #[test]
    fn instrument_lookup_is_exact() {
        assert_eq!(Instrument::from_wire("BTC-USD"), Some(Instrument::BtcUsd));
        assert_eq!(Instrument::from_wire("btc-usd"), None);
        assert_eq!(Instrument::from_wire(" BTC-USD"), None);
        assert_eq!(Instrument::from_wire(""), None);
        assert!(!Instrument::is_supported("ETH-USD"));
    }

    #[test]
    fn instrument_indexes_are_dense() {
        let mut seen = [false; Instrument::COUNT];
        for instrument in Instrument::all() {
            seen[instrument.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(Instrument::all().len(), Instrument::COUNT);
    }

    #[test]
    fn instrument_from_str_error_names_input() {
        let err = "DOGE-USD".parse::<Instrument>().unwrap_err();
        assert_eq!(err, UnsupportedInstrument("DOGE-USD".to_string()));
        assert!(err.to_string().contains("DOGE-USD"));
    }

    #[test]
    fn instrument_serializes_as_product_id() {
        assert_eq!(
            serde_json::to_string(&Instrument::BtcUsd).unwrap(),
            "\"BTC-USD\""
        );
        let parsed: Instrument = serde_json::from_str("\"BTC-USD\"").unwrap();
        assert_eq!(parsed, Instrument::BtcUsd);
        assert!(serde_json::from_str::<Instrument>("\"ETH-USD\"").is_err());
    }

    #[test]
    fn price_event_serializes_wire_field_names() {
        let event = PriceEvent {
            kind: "ticker".to_string(),
            sequence: 7,
            product_id: Instrument::BtcUsd,
            price: 36_000.5,
            open_24h: 35_000.0,
            volume_24h: 1_200.25,
            low_24h: 34_500.0,
            high_24h: 36_500.0,
            volume_30d: 40_000.0,
            best_bid: 36_000.0,
            best_bid_size: 0.5,
            best_ask: 36_001.0,
            best_ask_size: 0.25,
            side: "sell".to_string(),
            time: DateTime::parse_from_rfc3339("2023-11-18T12:34:56Z").unwrap(),
            trade_id: 42,
            last_size: 0.01,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ticker");
        assert_eq!(value["product_id"], "BTC-USD");
        assert_eq!(value["price"], 36_000.5);
        assert_eq!(value["trade_id"], 42);
        assert_eq!(value["time"], "2023-11-18T12:34:56Z");
        assert!(value.get("Price").is_none());
        assert!(value.get("ProductID").is_none());
        assert_eq!(event.instrument(), Instrument::BtcUsd);
    }
}
