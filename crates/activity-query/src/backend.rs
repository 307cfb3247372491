use std::sync::Arc;

use activity_breaker::{BreakerError, BreakerRegistry};
use activity_cursor::Position;
use activity_model::{Transaction, TransactionFilter};
use activity_store_postgres::{PostgresStore, StoreError};
use activity_store_search::{Paging, ReturnMode, SearchHit, SearchIndex};
use async_trait::async_trait;
use uuid::Uuid;

use crate::cursor_util::apply_cursor;
use crate::error::QueryError;

/// The single contract both query-path implementations satisfy; callers
/// (the cache-aside [`crate::QueryService`] wrapper) are written against
/// this trait only, so the backend choice is a startup-time configuration
/// decision rather than something visible at any call site.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn list(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Transaction>, i64), QueryError>;

    async fn list_keyset(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        cursor: Option<Position>,
        limit: i64,
    ) -> Result<(Vec<Transaction>, bool), QueryError>;

    async fn get_one(&self, id: Uuid) -> Result<Option<Transaction>, QueryError>;
}

/// Lets a boxed trait object stand in for `B` in `QueryService<B>`, so a
/// binary can pick `RelationalBackend` or `SearchBackend` once at startup
/// (per its `USE_ELASTICSEARCH_AS_PRIMARY` setting) and hand the API layer a
/// single concrete `QueryService<Box<dyn QueryBackend>>` type either way.
#[async_trait]
impl QueryBackend for Box<dyn QueryBackend> {
    async fn list(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Transaction>, i64), QueryError> {
        (**self).list(user_id, filter, page, page_size).await
    }

    async fn list_keyset(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        cursor: Option<Position>,
        limit: i64,
    ) -> Result<(Vec<Transaction>, bool), QueryError> {
        (**self).list_keyset(user_id, filter, cursor, limit).await
    }

    async fn get_one(&self, id: Uuid) -> Result<Option<Transaction>, QueryError> {
        (**self).get_one(id).await
    }
}

/// Relational-primary: the Postgres store answers every query directly
/// unless a free-text `search_query` is present, in which case the search
/// index is consulted for matching ids (preserving its relevance order) and
/// the relational store hydrates the full records. If the search breaker is
/// open, this degrades to the relational store's own `ILIKE` substring
/// search rather than failing the request.
pub struct RelationalBackend {
    pub postgres: PostgresStore,
    pub search: Option<SearchIndex>,
    pub breakers: Arc<BreakerRegistry>,
}

impl RelationalBackend {
    async fn hydrate(&self, hits: Vec<SearchHit>) -> Result<Vec<Transaction>, QueryError> {
        let breaker = self.breakers.get("postgres");
        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            match breaker.call(|| self.postgres.get_by_id(hit.id)).await {
                Ok(txn) => items.push(txn),
                Err(BreakerError::Inner(StoreError::NotFound(id))) => {
                    tracing::debug!(%id, "search hit has no relational counterpart yet, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(items)
    }

    async fn try_search_list(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Option<Result<(Vec<Transaction>, i64), QueryError>> {
        let q = filter.search_query.as_deref()?;
        let search = self.search.as_ref()?;
        let breaker = self.breakers.get("search");
        match breaker
            .call(|| search.search(user_id, Some(q), filter, Paging { page, page_size }, ReturnMode::IdsOnly))
            .await
        {
            Ok((hits, total)) => Some(self.hydrate(hits).await.map(|items| (items, total))),
            Err(BreakerError::Open(name)) => {
                tracing::warn!(breaker = name, "search unavailable, falling back to relational substring search");
                None
            }
            Err(BreakerError::Inner(e)) => Some(Err(e.into())),
        }
    }

    async fn try_search_keyset(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        cursor: Option<Position>,
        limit: i64,
    ) -> Option<Result<(Vec<Transaction>, bool), QueryError>> {
        let q = filter.search_query.as_deref()?;
        let search = self.search.as_ref()?;
        let breaker = self.breakers.get("search");
        match breaker
            .call(|| {
                search.search(
                    user_id,
                    Some(q),
                    filter,
                    Paging { page: 1, page_size: (limit.max(1)) * 2 },
                    ReturnMode::IdsOnly,
                )
            })
            .await
        {
            Ok((hits, _total)) => Some(
                self.hydrate(hits)
                    .await
                    .map(|items| apply_cursor(items, cursor, limit)),
            ),
            Err(BreakerError::Open(name)) => {
                tracing::warn!(breaker = name, "search unavailable, falling back to relational substring search");
                None
            }
            Err(BreakerError::Inner(e)) => Some(Err(e.into())),
        }
    }
}

#[async_trait]
impl QueryBackend for RelationalBackend {
    async fn list(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Transaction>, i64), QueryError> {
        if let Some(result) = self.try_search_list(user_id, filter, page, page_size).await {
            return result;
        }

        let breaker = self.breakers.get("postgres");
        let page_result = breaker
            .call(|| self.postgres.list_offset(user_id, filter, page, page_size))
            .await
            .map_err(QueryError::from)?;
        Ok((page_result.items, page_result.total))
    }

    async fn list_keyset(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        cursor: Option<Position>,
        limit: i64,
    ) -> Result<(Vec<Transaction>, bool), QueryError> {
        if let Some(result) = self.try_search_keyset(user_id, filter, cursor, limit).await {
            return result;
        }

        let breaker = self.breakers.get("postgres");
        breaker
            .call(|| self.postgres.list_cursor(user_id, filter, cursor, limit))
            .await
            .map_err(QueryError::from)
    }

    async fn get_one(&self, id: Uuid) -> Result<Option<Transaction>, QueryError> {
        let breaker = self.breakers.get("postgres");
        match breaker.call(|| self.postgres.get_by_id(id)).await {
            Ok(txn) => Ok(Some(txn)),
            Err(BreakerError::Inner(StoreError::NotFound(_))) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Search-primary: every query (filtered listing, cursor listing, and
/// single-record lookup) is answered from the search index; the relational
/// store is never consulted on this path. Callers accept the index's
/// weaker precision and consistency guarantees in exchange for its richer
/// text search.
pub struct SearchBackend {
    pub search: SearchIndex,
    pub breakers: Arc<BreakerRegistry>,
}

#[async_trait]
impl QueryBackend for SearchBackend {
    async fn list(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Transaction>, i64), QueryError> {
        let breaker = self.breakers.get("search");
        let (hits, total) = breaker
            .call(|| {
                self.search.search(
                    user_id,
                    filter.search_query.as_deref(),
                    filter,
                    Paging { page, page_size },
                    ReturnMode::Documents,
                )
            })
            .await
            .map_err(QueryError::from)?;

        let items = hits
            .into_iter()
            .filter_map(|hit| hit.document)
            .map(Transaction::from)
            .collect();
        Ok((items, total))
    }

    async fn list_keyset(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
        cursor: Option<Position>,
        limit: i64,
    ) -> Result<(Vec<Transaction>, bool), QueryError> {
        let breaker = self.breakers.get("search");
        let (hits, _total) = breaker
            .call(|| {
                self.search.search(
                    user_id,
                    filter.search_query.as_deref(),
                    filter,
                    Paging { page: 1, page_size: limit.max(1) + 1 },
                    ReturnMode::Documents,
                )
            })
            .await
            .map_err(QueryError::from)?;

        let items: Vec<Transaction> = hits
            .into_iter()
            .filter_map(|hit| hit.document)
            .map(Transaction::from)
            .collect();
        Ok(apply_cursor(items, cursor, limit))
    }

    async fn get_one(&self, id: Uuid) -> Result<Option<Transaction>, QueryError> {
        let breaker = self.breakers.get("search");
        let document = breaker.call(|| self.search.get(id)).await.map_err(QueryError::from)?;
        Ok(document.map(Transaction::from))
    }
}
