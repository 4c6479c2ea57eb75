//! Kafka Bus Source
//!
//! [`BusSource`] over an rdkafka consumer-group subscription. Offsets are
//! auto-committed, so a message is considered consumed once read; the relay
//! is at-most-once by design of the stream it serves.

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;

use crate::application::ports::{BusMessage, BusReadError, BusSource};
use crate::infrastructure::config::BusSettings;

/// Errors creating the Kafka subscription.
#[derive(Debug, thiserror::Error)]
pub enum KafkaSourceError {
    /// Client could not be created from the settings.
    #[error("failed to create Kafka consumer: {0}")]
    Create(#[source] KafkaError),

    /// Topic subscription was refused.
    #[error("failed to subscribe to topic {topic:?}: {source}")]
    Subscribe {
        /// Topic name.
        topic: String,
        /// Client error.
        #[source]
        source: KafkaError,
    },
}

/// Kafka consumer-group subscription to the price topic.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    /// Build the client configuration for the given settings.
    #[must_use]
    pub fn client_config(settings: &BusSettings) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &settings.broker_url)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", &settings.auto_offset_reset)
            .set("enable.partition.eof", "false");
        config
    }

    /// Connect and subscribe to the configured topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the subscription
    /// is refused. Broker reachability is not checked here.
    pub fn connect(settings: &BusSettings) -> Result<Self, KafkaSourceError> {
        let consumer: StreamConsumer = Self::client_config(settings)
            .create()
            .map_err(KafkaSourceError::Create)?;

        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|source| KafkaSourceError::Subscribe {
                topic: settings.topic.clone(),
                source,
            })?;

        tracing::info!(
            brokers = %settings.broker_url,
            topic = %settings.topic,
            group = %settings.group_id,
            "Subscribed to price topic"
        );

        Ok(Self {
            consumer,
            topic: settings.topic.clone(),
        })
    }
}

#[async_trait]
impl BusSource for KafkaSource {
    async fn next_message(&mut self) -> Result<BusMessage, BusReadError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| BusReadError::Broker(e.to_string()))?;

        let payload = message.payload().ok_or(BusReadError::EmptyPayload {
            partition: message.partition(),
            offset: message.offset(),
        })?;

        Ok(BusMessage {
            payload: payload.to_vec(),
            partition: message.partition(),
            offset: message.offset(),
        })
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "Kafka consumer closed");
    }
}
