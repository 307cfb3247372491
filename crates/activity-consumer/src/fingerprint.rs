use sha2::{Digest, Sha256};

/// A stable idempotency key for one envelope, computed from fields that
/// together identify a single logical event: the transaction id it refers
/// to, the event type, and the producer's timestamp. Two redeliveries of the
/// same Kafka message always hash identically; two different lifecycle
/// events for the same transaction never collide.
pub fn message_id(transaction_id: &str, event_type: &str, timestamp: &str) -> String {
    let content = format!("{transaction_id}:{event_type}:{timestamp}");
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_hash_identically() {
        let a = message_id("t1", "transaction.created", "2026-01-01T00:00:00Z");
        let b = message_id("t1", "transaction.created", "2026-01-01T00:00:00Z");
        assert_eq!(a, b);
    }

    #[test]
    fn different_event_types_hash_differently() {
        let a = message_id("t1", "transaction.created", "2026-01-01T00:00:00Z");
        let b = message_id("t1", "transaction.updated", "2026-01-01T00:00:00Z");
        assert_ne!(a, b);
    }
}
