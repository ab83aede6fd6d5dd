use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::Offset;

use crate::error::{FleetError, Result};

/// A single delivered record, partition-key preserved so the consumer can
/// reconstruct which agent it belongs to. `topic`/`partition`/`offset` are
/// carried so the runner can store or rewind this exact offset after the
/// handler runs (spec §4.3/§8: an offset is never stored ahead of the
/// handler that processed it).
#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    pub partition_key: Option<String>,
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Consumer-group runner contract (spec §4.3): each consumer group
/// independently tracks its own offsets, so the Status Updater, the Uptime
/// Log Writer, and the Metrics Sink each poll through their own instance.
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    async fn poll(&self) -> Result<Option<ConsumedMessage>>;

    /// Marks `message` as safe to commit past. Called only after the handler
    /// has successfully processed it.
    fn store_offset(&self, message: &ConsumedMessage) -> Result<()>;

    /// Rewinds this partition back to `message` so the next `poll` delivers
    /// it again. Called on handler failure so a poison/transient failure
    /// never becomes at-most-once.
    fn seek_to_retry(&self, message: &ConsumedMessage) -> Result<()>;
}

pub struct KafkaBrokerConsumer {
    consumer: StreamConsumer,
}

impl KafkaBrokerConsumer {
    pub fn new(
        bootstrap_servers: &str,
        group_id: &str,
        topic: &str,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| FleetError::Fatal(format!("failed to build kafka consumer: {e}")))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| FleetError::Fatal(format!("failed to subscribe to {topic}: {e}")))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl BrokerConsumer for KafkaBrokerConsumer {
    async fn poll(&self) -> Result<Option<ConsumedMessage>> {
        let mut stream = self.consumer.stream();
        match stream.next().await {
            Some(Ok(message)) => {
                let partition_key = message
                    .key()
                    .map(|bytes| String::from_utf8_lossy(bytes).to_string());
                let payload = message.payload().unwrap_or_default().to_vec();
                Ok(Some(ConsumedMessage {
                    partition_key,
                    payload,
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                }))
            }
            Some(Err(err)) => Err(FleetError::TransientIo(format!("kafka poll failed: {err}"))),
            None => Ok(None),
        }
    }

    fn store_offset(&self, message: &ConsumedMessage) -> Result<()> {
        // Committed offset is "next offset to read" by Kafka convention.
        self.consumer
            .store_offset(&message.topic, message.partition, message.offset + 1)
            .map_err(|e| FleetError::TransientIo(format!("failed to store kafka offset: {e}")))
    }

    fn seek_to_retry(&self, message: &ConsumedMessage) -> Result<()> {
        self.consumer
            .seek(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset),
                Duration::from_secs(5),
            )
            .map_err(|e| FleetError::TransientIo(format!("failed to seek kafka consumer for redelivery: {e}")))
    }
}
