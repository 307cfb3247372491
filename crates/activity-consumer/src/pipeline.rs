//! Turns one Kafka message payload into a side-effecting outcome: index the
//! transaction, mirror it to the audit store, or route it to the dead-letter
//! topic. Kept free of any Kafka client types so it can be exercised without
//! a broker.

use std::sync::Arc;
use std::time::Duration;

use activity_breaker::{BreakerError, BreakerRegistry};
use activity_enrichment::StrategyRegistry;
use activity_events::wire::{parse_transaction, RawEnvelope, WireEventType};
use activity_store_postgres::PostgresStore;
use activity_store_search::{IndexOutcome, SearchDocument, SearchIndex};
use serde_json::Value;
use uuid::Uuid;

use crate::dedup::Dedup;
use crate::fingerprint;

/// What the caller should do with the Kafka message this outcome was
/// produced from.
#[derive(Debug)]
pub enum Outcome {
    /// Commit the message's offset without dead-lettering. Covers clean
    /// success, a recognized duplicate, a breaker-open index failure that
    /// the audit write still recovered, a malformed envelope, and an
    /// unrecognized event type or missing payload — none of these may ever
    /// block the partition.
    Ack,
    /// Forward the original payload to the dead-letter topic with `reason`;
    /// the offset is committed only once that write is acknowledged.
    Reject { reason: String },
}

pub struct Pipeline {
    pub postgres: PostgresStore,
    pub search: SearchIndex,
    pub breakers: Arc<BreakerRegistry>,
    pub strategies: StrategyRegistry,
    pub dedup: Dedup,
    pub dedup_ttl: Duration,
    pub enable_audit_db: bool,
}

impl Pipeline {
    #[tracing::instrument(skip(self, payload))]
    pub async fn process(&self, payload: &[u8]) -> Outcome {
        // A malformed envelope is a poison message: it never blocks the
        // partition, so it is acknowledged with a warning rather than
        // dead-lettered (there is no well-formed `original_message` to put
        // in the DLQ envelope anyway).
        let envelope: RawEnvelope = match serde_json::from_slice(payload) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "malformed event envelope, acking without side effects");
                return Outcome::Ack;
            }
        };

        let message_id = fingerprint::message_id(
            &raw_transaction_id(&envelope.transaction),
            &envelope.event_type,
            &envelope.timestamp.to_rfc3339(),
        );

        let Some(transaction_value) = envelope.transaction.as_ref() else {
            tracing::warn!(event_type = %envelope.event_type, "message missing transaction data, acking");
            return Outcome::Ack;
        };

        if self.dedup.is_duplicate(&message_id).await {
            tracing::info!(message_id, "duplicate message detected, skipping");
            return Outcome::Ack;
        }

        let Some(event_type) = WireEventType::parse(&envelope.event_type) else {
            tracing::warn!(event_type = %envelope.event_type, "unknown event type, acking without side effects");
            return Outcome::Ack;
        };

        let outcome = match event_type {
            WireEventType::Created | WireEventType::Updated => {
                self.process_upsert(transaction_value, event_type).await
            }
            WireEventType::Deleted => self.process_delete(transaction_value).await,
        };

        if matches!(outcome, Outcome::Ack) {
            self.dedup.mark_processed(&message_id, self.dedup_ttl).await;
        }
        outcome
    }

    async fn process_upsert(&self, value: &Value, event_type: WireEventType) -> Outcome {
        let incoming = match parse_transaction(value) {
            Ok(t) => t,
            Err(e) => {
                return Outcome::Reject {
                    reason: format!("failed to enrich transaction: {e}"),
                }
            }
        };

        let strategy = self
            .strategies
            .resolve(incoming.new.transaction_type.strategy_key());

        let mut new = incoming.new;
        if let Some(metadata) = new.metadata.take() {
            let enriched = strategy.enrich_metadata(Some(&metadata));
            new.metadata = Some(Value::Object(enriched));
        }

        let search_content = match incoming.search_content.filter(|s| !s.is_empty()) {
            Some(existing) => existing,
            None => strategy.build_search_content(&new),
        };

        let created_at = incoming.created_at.unwrap_or_else(chrono::Utc::now);
        let version = self.resolve_version(incoming.id, incoming.version).await;

        let document = SearchDocument::from_new(incoming.id, created_at, &new, search_content.clone());

        let search_breaker = self.breakers.get("search");
        let index_result = search_breaker
            .call(|| self.search.index(&document, Some(version)))
            .await;

        // Index success (including a benign version-regress rejection) or a
        // breaker-open failure both still ack *if* the audit write lands —
        // the audit store is the durable record, so a write that reaches it
        // is never lost even if the index lags or is down. Any other index
        // failure, or an audit write that itself fails, is a genuine
        // problem this message must be retried for, so it goes to the DLQ.
        let index_recoverable = match &index_result {
            Ok(IndexOutcome::Applied) => {
                tracing::info!(id = %incoming.id, ?event_type, "transaction indexed");
                true
            }
            Ok(IndexOutcome::Stale) => {
                tracing::debug!(id = %incoming.id, "index write rejected: version regress");
                true
            }
            Err(BreakerError::Open(name)) => {
                tracing::warn!(breaker = name, id = %incoming.id, "search unavailable, transaction saved to audit store only");
                true
            }
            Err(BreakerError::Inner(e)) => {
                tracing::warn!(id = %incoming.id, error = %e, "failed to index transaction");
                false
            }
        };

        let audit_ok = if self.enable_audit_db {
            let postgres_breaker = self.breakers.get("postgres");
            match postgres_breaker
                .call(|| self.postgres.upsert(incoming.id, &new, &search_content, Some(created_at)))
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(id = %incoming.id, error = %e, "failed to write transaction to audit store");
                    false
                }
            }
        } else {
            true
        };

        if index_recoverable && audit_ok {
            Outcome::Ack
        } else {
            Outcome::Reject {
                reason: format!(
                    "index_ok={index_recoverable} audit_ok={audit_ok} for transaction {}",
                    incoming.id
                ),
            }
        }
    }

    async fn process_delete(&self, value: &Value) -> Outcome {
        let Some(id) = value.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
        else {
            tracing::warn!("delete event missing a valid transaction id, acking without side effects");
            return Outcome::Ack;
        };

        let search_breaker = self.breakers.get("search");
        let index_ok = match search_breaker.call(|| self.search.delete(id)).await {
            Ok(()) => true,
            Err(BreakerError::Open(name)) => {
                tracing::warn!(breaker = name, %id, "search unavailable, transaction deleted from audit store only");
                true
            }
            Err(BreakerError::Inner(e)) => {
                tracing::warn!(%id, error = %e, "failed to delete transaction from search index");
                false
            }
        };

        let audit_ok = if self.enable_audit_db {
            let postgres_breaker = self.breakers.get("postgres");
            match postgres_breaker.call(|| self.postgres.delete(id)).await {
                Ok(()) | Err(BreakerError::Inner(activity_store_postgres::StoreError::NotFound(_))) => true,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "failed to delete transaction from audit store");
                    false
                }
            }
        } else {
            true
        };

        if index_ok && audit_ok {
            tracing::info!(%id, "transaction deleted");
            Outcome::Ack
        } else {
            Outcome::Reject {
                reason: format!("index_ok={index_ok} audit_ok={audit_ok} deleting transaction {id}"),
            }
        }
    }

    /// An explicit version on the incoming event wins. Otherwise the next
    /// version is one past whatever the index currently holds for this id,
    /// falling back to `1` if the lookup fails — the same fail-open default
    /// the publisher-side system used rather than blocking indexing on a
    /// healthy search index.
    async fn resolve_version(&self, id: Uuid, explicit: Option<i64>) -> i64 {
        if let Some(v) = explicit {
            return v;
        }
        let breaker = self.breakers.get("search");
        match breaker.call(|| self.search.current_version(id)).await {
            Ok(Some(current)) => current + 1,
            Ok(None) => 1,
            Err(_) => 1,
        }
    }
}

fn raw_transaction_id(transaction: &Option<Value>) -> String {
    transaction
        .as_ref()
        .and_then(|t| t.get("id"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
