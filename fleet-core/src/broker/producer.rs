use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::debug;

use crate::error::{FleetError, Result};

/// Publishes a single partitioned record. One outbox record maps to one
/// call (spec §4.2a.3): the dispatcher treats any publish error as
/// retryable and leaves the record `pending`.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: &[u8],
        headers: &[(String, String)],
    ) -> Result<()>;
}

pub struct KafkaBrokerProducer {
    producer: FutureProducer,
}

impl KafkaBrokerProducer {
    pub fn new(bootstrap_servers: &str, client_id: &str) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("client.id", client_id)
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| FleetError::Fatal(format!("failed to build kafka producer: {e}")))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl BrokerProducer for KafkaBrokerProducer {
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: &[u8],
        headers: &[(String, String)],
    ) -> Result<()> {
        let mut kafka_headers = rdkafka::message::OwnedHeaders::new();
        for (key, value) in headers {
            kafka_headers = kafka_headers.insert(rdkafka::message::Header {
                key,
                value: Some(value.as_str()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(partition_key)
            .payload(payload)
            .headers(kafka_headers);

        match self.producer.send(record, Duration::from_secs(10)).await {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "published outbox record");
                Ok(())
            }
            Err((err, _)) => Err(FleetError::TransientIo(format!(
                "kafka publish failed: {err}"
            ))),
        }
    }
}
