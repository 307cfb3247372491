//! Redis-backed response cache with TTL and pattern-based invalidation.
//!
//! Every public method swallows and logs its own failures rather than
//! propagating them: the cache is always an optimization, never a
//! dependency the caller must have to make progress.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Clone)]
pub struct CacheClient {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl CacheClient {
    pub async fn connect(url: &str, default_ttl: Duration) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, default_ttl })
    }

    /// Deserializes and returns the value at `key`. Any failure — missing
    /// key, expired, malformed payload, or an unreachable server — reads as
    /// "not present" rather than an error.
    #[tracing::instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache get failed");
                return None;
            }
        };
        raw.and_then(|s| match serde_json::from_str(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "cache value failed to deserialize");
                None
            }
        })
    }

    #[tracing::instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache value failed to serialize");
                return false;
            }
        };

        let mut conn = self.conn.clone();
        match conn
            .set_ex::<_, _, ()>(key, serialized, ttl.as_secs().max(1))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache set failed");
                false
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.del::<_, i64>(key).await {
            Ok(n) => n > 0,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Deletes every key matching `pattern`, using a cursor-based `SCAN`
    /// rather than the blocking `KEYS` command so a large keyspace never
    /// stalls the server. Best-effort: a scan failure is logged and
    /// swallowed, returning the count deleted so far.
    #[tracing::instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let mut conn = self.conn.clone();
        let mut deleted = 0u64;
        let mut cursor = 0u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = match redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "cache scan failed");
                    break;
                }
            };

            if !keys.is_empty() {
                match conn.del::<_, i64>(&keys).await {
                    Ok(n) => deleted += n.max(0) as u64,
                    Err(e) => {
                        tracing::warn!(pattern, error = %e, "cache pattern delete failed");
                    }
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        deleted
    }

    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}
