//! Bus Wire Message Types
//!
//! Loosely-typed record as published on the price topic. Numeric fields
//! arrive as decimal strings; absent fields decode to their zero value
//! and are rejected later by translation if they matter.
//!
//! # Example
//!
//! ```json
//! {
//!   "type": "ticker", "sequence": 100, "product_id": "BTC-USD",
//!   "price": "100.0", "open_24h": "100.0", "volume_24h": "100.0",
//!   "low_24h": "100.0", "high_24h": "100.0", "volume_30d": "100.0",
//!   "best_bid": "100.0", "best_bid_size": "100.0",
//!   "best_ask": "100.0", "best_ask_size": "100.0",
//!   "side": "buy", "time": "2023-11-18T12:34:56Z",
//!   "trade_id": 100, "last_size": "100.0"
//! }
//! ```

use serde::{Deserialize, Serialize};

/// One ticker record from the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerRecord {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sequence number.
    pub sequence: i64,
    /// Instrument identifier.
    pub product_id: String,
    /// Last price.
    pub price: String,
    /// 24h open.
    pub open_24h: String,
    /// 24h volume.
    pub volume_24h: String,
    /// 24h low.
    pub low_24h: String,
    /// 24h high.
    pub high_24h: String,
    /// 30d volume.
    pub volume_30d: String,
    /// Best bid.
    pub best_bid: String,
    /// Best bid size.
    pub best_bid_size: String,
    /// Best ask.
    pub best_ask: String,
    /// Best ask size.
    pub best_ask_size: String,
    /// Taker side.
    pub side: String,
    /// RFC 3339 timestamp.
    pub time: String,
    /// Trade identifier.
    pub trade_id: i64,
    /// Last trade size.
    pub last_size: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_zero_values() {
        let record: TickerRecord =
            serde_json::from_str(r#"{"product_id":"BTC-USD","sequence":5}"#).unwrap();
        assert_eq!(record.product_id, "BTC-USD");
        assert_eq!(record.sequence, 5);
        assert_eq!(record.trade_id, 0);
        assert!(record.price.is_empty());
    }

    #[test]
    fn numeric_strings_stay_strings() {
        let record: TickerRecord =
            serde_json::from_str(r#"{"price":"36000.12","type":"ticker"}"#).unwrap();
        assert_eq!(record.price, "36000.12");
        assert_eq!(record.kind, "ticker");
    }
}
