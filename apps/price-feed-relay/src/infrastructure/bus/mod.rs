//! Message Bus Ingestion
//!
//! Everything between the price topic and the registry:
//!
//! - `messages`: Wire record as published on the topic
//! - `codec`: Decoding and translation into domain events
//! - `consumer`: The read loop and its shared status
//! - `kafka`: rdkafka-backed bus source

pub mod codec;
pub mod consumer;
pub mod kafka;
pub mod messages;

pub use codec::{TranslationError, decode, decode_event, translate};
pub use consumer::{BusConsumer, BusStatus, BusStatusSnapshot, ConsumerError};
pub use kafka::{KafkaSource, KafkaSourceError};
pub use messages::TickerRecord;
