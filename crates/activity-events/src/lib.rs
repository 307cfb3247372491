//! Publishes transaction lifecycle events to a partitioned log, keyed by
//! `user_id` so all events for a given user land on the same partition and
//! preserve per-user ordering.

use activity_model::Transaction;
use chrono::{DateTime, Utc};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::Serialize;
use std::time::Duration;

pub mod wire;
pub use wire::{parse_transaction, IncomingTransaction, RawEnvelope, TransactionFieldError, WireEventType};

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("kafka producer error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TransactionCreated,
    TransactionUpdated,
    TransactionDeleted,
}

impl EventType {
    fn wire_name(&self) -> &'static str {
        match self {
            EventType::TransactionCreated => "transaction.created",
            EventType::TransactionUpdated => "transaction.updated",
            EventType::TransactionDeleted => "transaction.deleted",
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    event_type: &'static str,
    transaction: &'a serde_json::Value,
    timestamp: DateTime<Utc>,
}

pub struct EventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl EventPublisher {
    pub fn new(bootstrap_servers: &str, topic: impl Into<String>) -> Result<Self, EventError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", "all")
            .set("retries", "3")
            // One in-flight request per connection, required so retries can
            // never reorder messages within a partition.
            .set("max.in.flight.requests.per.connection", "1")
            .set("enable.idempotence", "true")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }

    async fn publish(
        &self,
        event_type: EventType,
        key: &str,
        body: &serde_json::Value,
    ) -> Result<(), EventError> {
        let envelope = Envelope {
            event_type: event_type.wire_name(),
            transaction: body,
            timestamp: Utc::now(),
        };
        let payload = serde_json::to_vec(&envelope).expect("envelope always serializes");

        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);
        match self.producer.send(record, Duration::from_secs(5)).await {
            Ok(_) => Ok(()),
            Err((err, _)) => Err(EventError::Kafka(err)),
        }
    }

    #[tracing::instrument(skip(self, transaction), err)]
    pub async fn publish_transaction_created(
        &self,
        transaction: &Transaction,
    ) -> Result<(), EventError> {
        let body = serde_json::to_value(transaction).expect("transaction always serializes");
        self.publish(EventType::TransactionCreated, &transaction.user_id, &body)
            .await
    }

    #[tracing::instrument(skip(self, transaction), err)]
    pub async fn publish_transaction_updated(
        &self,
        transaction: &Transaction,
    ) -> Result<(), EventError> {
        let body = serde_json::to_value(transaction).expect("transaction always serializes");
        self.publish(EventType::TransactionUpdated, &transaction.user_id, &body)
            .await
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn publish_transaction_deleted(
        &self,
        user_id: &str,
        transaction_id: uuid::Uuid,
    ) -> Result<(), EventError> {
        let body = serde_json::json!({ "id": transaction_id });
        self.publish(EventType::TransactionDeleted, user_id, &body)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> bool {
        self.producer
            .client()
            .fetch_metadata(None, Duration::from_secs(5))
            .is_ok()
    }
}
