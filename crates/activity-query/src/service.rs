use std::time::Duration;

use activity_cache::CacheClient;
use activity_model::{CursorPage, OffsetPage, Transaction, TransactionFilter};
use uuid::Uuid;

use crate::backend::QueryBackend;
use crate::error::QueryError;

/// Cache namespace a [`QueryService`] writes its keys under; the two primary
/// backends never share a namespace so switching the configured primary at
/// restart can't serve a page cached by the other's semantics.
pub const RELATIONAL_CACHE_NAMESPACE: &str = "transactions";
pub const SEARCH_CACHE_NAMESPACE: &str = "transactions:es";

/// Cursor pages use a shorter TTL than offset pages, mirroring the
/// original's choice to treat cursor-paginated results as more perishable.
const CURSOR_PAGE_TTL: Duration = Duration::from_secs(300);

/// The shared cache-aside, cursor-encoding logic sitting in front of either
/// [`crate::backend::RelationalBackend`] or [`crate::backend::SearchBackend`].
/// Only this struct is constructed by callers; the backend choice is made
/// once, at startup, by picking which `QueryBackend` impl to hand it.
pub struct QueryService<B> {
    backend: B,
    cache: CacheClient,
    namespace: &'static str,
}

impl<B: QueryBackend> QueryService<B> {
    pub fn new(backend: B, cache: CacheClient, namespace: &'static str) -> Self {
        Self { backend, cache, namespace }
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn get(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<OffsetPage, QueryError> {
        let key = self.offset_cache_key(user_id, filter, page, page_size);
        if let Some(cached) = self.cache.get::<OffsetPage>(&key).await {
            return Ok(cached);
        }

        let (items, total) = self.backend.list(user_id, filter, page, page_size).await?;
        let result = OffsetPage::new(items, total, page, page_size);
        self.cache.set(&key, &result, None).await;
        Ok(result)
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn get_keyset(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<CursorPage, QueryError> {
        let key = self.cursor_cache_key(user_id, filter, cursor, limit);
        if let Some(cached) = self.cache.get::<CursorPage>(&key).await {
            return Ok(cached);
        }

        // A cursor that fails to decode (malformed, truncated, or from a
        // different codec version) is treated as no cursor at all, per the
        // cursor codec's contract — not a client-visible error.
        let position = cursor.and_then(|c| activity_cursor::decode(c).ok());

        let (items, has_more) = self.backend.list_keyset(user_id, filter, position, limit).await?;
        let next_cursor = if has_more {
            items.last().map(|t| {
                activity_cursor::encode(activity_cursor::Position {
                    id: t.id,
                    created_at: t.created_at,
                })
            })
        } else {
            None
        };

        let result = CursorPage { items, next_cursor, has_more, limit };
        self.cache.set(&key, &result, Some(CURSOR_PAGE_TTL)).await;
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_one(&self, id: Uuid) -> Result<Option<Transaction>, QueryError> {
        let key = format!("transaction:{id}");
        if let Some(cached) = self.cache.get::<Transaction>(&key).await {
            return Ok(Some(cached));
        }

        let result = self.backend.get_one(id).await?;
        if let Some(txn) = &result {
            self.cache.set(&key, txn, None).await;
        }
        Ok(result)
    }

    fn offset_cache_key(&self, user_id: &str, filter: &TransactionFilter, page: i64, page_size: i64) -> String {
        let prefix = format!("{}:user:{user_id}", self.namespace);
        format!("{}:page={page}:size={page_size}", filter.cache_key(&prefix))
    }

    fn cursor_cache_key(&self, user_id: &str, filter: &TransactionFilter, cursor: Option<&str>, limit: i64) -> String {
        let prefix = format!("{}:user:{user_id}:cursor", self.namespace);
        format!(
            "{}:limit={limit}:cursor={}",
            filter.cache_key(&prefix),
            cursor.unwrap_or("")
        )
    }
}
