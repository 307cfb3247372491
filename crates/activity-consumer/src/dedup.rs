use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use activity_cache::CacheClient;
use lru::LruCache;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct ProcessedMarker {
    processed_at: chrono::DateTime<chrono::Utc>,
}

/// Idempotency check for incoming messages. An in-process LRU answers
/// repeat deliveries within this consumer's lifetime without a network
/// round trip; the shared Redis-backed set catches the case that matters
/// more in practice — a rebalance or restart replaying messages onto a
/// process with a cold LRU.
pub struct Dedup {
    local: Mutex<LruCache<String, ()>>,
    cache: CacheClient,
}

impl Dedup {
    pub fn new(cache: CacheClient, local_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(local_capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            local: Mutex::new(LruCache::new(capacity)),
            cache,
        }
    }

    fn cache_key(message_id: &str) -> String {
        format!("message:processed:{message_id}")
    }

    pub async fn is_duplicate(&self, message_id: &str) -> bool {
        if self.local.lock().unwrap().contains(message_id) {
            return true;
        }
        self.cache
            .get::<ProcessedMarker>(&Self::cache_key(message_id))
            .await
            .is_some()
    }

    pub async fn mark_processed(&self, message_id: &str, ttl: Duration) {
        self.local.lock().unwrap().put(message_id.to_string(), ());
        let marker = ProcessedMarker {
            processed_at: chrono::Utc::now(),
        };
        self.cache
            .set(&Self::cache_key(message_id), &marker, Some(ttl))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_cache_reports_recently_marked_ids() {
        let local = Mutex::new(LruCache::<String, ()>::new(NonZeroUsize::new(2).unwrap()));
        local.lock().unwrap().put("a".to_string(), ());
        assert!(local.lock().unwrap().contains("a"));
        assert!(!local.lock().unwrap().contains("b"));
    }
}
