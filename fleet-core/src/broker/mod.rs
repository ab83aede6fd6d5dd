//! Kafka-compatible broker client: a producer for the dispatcher and one
//! consumer per consumer group (spec §4.3).

pub mod consumer;
pub mod producer;

pub use consumer::{BrokerConsumer, ConsumedMessage, KafkaBrokerConsumer};
pub use producer::{BrokerProducer, KafkaBrokerProducer};
