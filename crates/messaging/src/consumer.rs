use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Failed to create Kafka consumer: {0}")]
    ConsumerCreation(#[source] KafkaError),

    #[error("Failed to receive message: {0}")]
    Receive(#[source] KafkaError),
}

/// A source of raw order messages.
///
/// `Ok(None)` means a message arrived without a payload; it carries nothing to
/// decode and can be skipped. An `Err` means the source itself is broken.
#[async_trait]
pub trait OrderStream: Send {
    /// Wait until the next message is available.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ConsumerError>;
}

/// Kafka consumer for the inbound order topic
pub struct OrderConsumer {
    consumer: StreamConsumer,
}

impl OrderConsumer {
    /// Create a new Kafka consumer subscribed to `topics`
    pub fn new(brokers: &str, group_id: &str, topics: &[&str]) -> Result<Self, ConsumerError> {
        info!(
            "Creating Kafka consumer with group_id: {}, topics: {:?}",
            group_id, topics
        );

        // Offsets are committed by the client on a timer regardless of whether
        // the message was stored, so delivery into the pipeline is at-most-once.
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()
            .map_err(ConsumerError::ConsumerCreation)?;

        consumer
            .subscribe(topics)
            .map_err(ConsumerError::ConsumerCreation)?;

        info!("Kafka consumer created successfully");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl OrderStream for OrderConsumer {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ConsumerError> {
        match self.consumer.recv().await {
            Ok(message) => {
                debug!(
                    "Received message from topic: {}, partition: {}, offset: {}",
                    message.topic(),
                    message.partition(),
                    message.offset()
                );

                match message.payload() {
                    Some(payload) => Ok(Some(payload.to_vec())),
                    None => {
                        warn!(offset = message.offset(), "Message has no payload");
                        Ok(None)
                    }
                }
            }
            Err(e) => {
                error!("Kafka error while receiving: {}", e);
                Err(ConsumerError::Receive(e))
            }
        }
    }
}
