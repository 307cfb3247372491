//! CRUD and listing routes for `/transactions`. The listing endpoint serves
//! both pagination styles from one handler, mirroring the original system's
//! single `get_transactions` view: a `cursor` or `limit` query parameter
//! selects keyset pagination, otherwise the handler falls back to
//! offset/page_size pagination.

use std::sync::Arc;

use activity_breaker::BreakerError;
use activity_enrichment::TransactionStrategy;
use activity_model::{CursorPage, NewTransaction, OffsetPage, Product, Transaction, TransactionFilter, TransactionStatus, TransactionType};
use axum::extract::{Path, Query, State};
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUserOptional;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactionCreate {
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub product: Product,
    #[serde(default = "default_status")]
    pub status: TransactionStatus,
    pub currency: String,
    pub amount: BigDecimal,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_status() -> TransactionStatus {
    TransactionStatus::Completed
}

/// Creates a transaction directly against the relational store, short-
/// circuiting the log-and-consume path: write → index → publish → cache
/// invalidation, in that order, so a read immediately after this call
/// observes the new record through the relational-primary path regardless
/// of how far behind the consumer's own indexing has fallen.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    CurrentUserOptional(current_user_id): CurrentUserOptional,
    Json(mut body): Json<TransactionCreate>,
) -> Result<(axum::http::StatusCode, Json<Transaction>), ApiError> {
    if let Some(user_id) = &current_user_id {
        body.user_id = user_id.clone();
    }
    if body.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id is required"));
    }
    if body.user_id.len() > 255 {
        return Err(ApiError::bad_request("user_id must be 255 characters or fewer"));
    }
    if body.currency.trim().is_empty() || body.currency.len() > 10 {
        return Err(ApiError::bad_request("currency must be 1-10 characters"));
    }

    let strategy = state.strategies.resolve(body.transaction_type.strategy_key());
    if !strategy.validate_metadata(body.metadata.as_ref()) {
        return Err(ApiError::bad_request(format!(
            "invalid metadata for transaction type {}",
            body.transaction_type.strategy_key()
        )));
    }

    let metadata = if body.metadata.is_some() {
        Some(serde_json::Value::Object(strategy.enrich_metadata(body.metadata.as_ref())))
    } else {
        None
    };

    let new = NewTransaction {
        user_id: body.user_id,
        transaction_type: body.transaction_type,
        product: body.product,
        status: body.status,
        currency: body.currency,
        amount: body.amount,
        metadata,
    };
    let search_content = strategy.build_search_content(&new);

    let postgres_breaker = state.breakers.get("postgres");
    let created = postgres_breaker
        .call(|| state.postgres.create(&new, &search_content))
        .await
        .map_err(breaker_store_error)?;

    let document = activity_store_search::SearchDocument::from_new(
        created.id,
        created.created_at,
        &new,
        search_content,
    );
    let search_breaker = state.breakers.get("search");
    if let Err(e) = search_breaker.call(|| state.search.index(&document, Some(1))).await {
        tracing::warn!(id = %created.id, error = %e, "failed to index newly created transaction");
    }

    let kafka_breaker = state.breakers.get("kafka");
    if let Err(e) = kafka_breaker
        .call(|| state.events.publish_transaction_created(&created))
        .await
    {
        tracing::warn!(id = %created.id, error = %e, "failed to publish transaction.created event");
    }

    state
        .cache
        .delete_pattern(&format!("{}:user:{}:*", state.cache_namespace, created.user_id))
        .await;

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub transaction_type: Option<TransactionType>,
    pub product: Option<Product>,
    pub status: Option<TransactionStatus>,
    pub currency: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub search_query: Option<String>,
    pub direction: Option<String>,
    pub merchant_name: Option<String>,
    pub card_last_four: Option<String>,
    pub peer_name: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub user_id: Option<String>,
}

impl ListQuery {
    fn metadata_filters(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        let mut map = serde_json::Map::new();
        if let Some(v) = &self.direction {
            map.insert("direction".into(), serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.merchant_name {
            map.insert("merchant_name".into(), serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.card_last_four {
            map.insert("card_last_four".into(), serde_json::Value::String(v.clone()));
        }
        if let Some(v) = &self.peer_name {
            map.insert("peer_name".into(), serde_json::Value::String(v.clone()));
        }
        if map.is_empty() {
            None
        } else {
            Some(map)
        }
    }

    fn into_filter(self, user_id: String) -> TransactionFilter {
        TransactionFilter {
            user_id: Some(user_id),
            transaction_type: self.transaction_type,
            product: self.product,
            status: self.status,
            currency: self.currency,
            start_date: self.start_date,
            end_date: self.end_date,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            search_query: self.search_query,
            metadata_filters: self.metadata_filters(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum ListResponse {
    Offset(OffsetPage),
    Cursor(CursorPage),
}

/// Resolves the effective `user_id` for a request: the authenticated
/// identity always wins over the query parameter, and at least one of the
/// two must be present.
fn effective_user_id(current_user_id: Option<String>, query_user_id: Option<String>) -> Result<String, ApiError> {
    let user_id = match (current_user_id, query_user_id) {
        (Some(token_user), query) => {
            if let Some(q) = query {
                if q != token_user {
                    tracing::warn!(jwt_user_id = token_user, query_user_id = q, "ignoring mismatched query user_id in favor of JWT");
                }
            }
            token_user
        }
        (None, Some(q)) => q,
        (None, None) => {
            return Err(ApiError::bad_request(
                "user_id is required, either via a bearer token or a user_id query parameter",
            ))
        }
    };

    let user_id = user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(ApiError::bad_request("user_id cannot be empty"));
    }
    Ok(user_id)
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    CurrentUserOptional(current_user_id): CurrentUserOptional,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let user_id = effective_user_id(current_user_id, query.user_id.clone())?;

    // Cursor-based pagination is used whenever a cursor is present, or a
    // limit was given without an explicit page — otherwise offset
    // pagination is the default, for backward compatibility.
    let use_cursor = query.cursor.is_some() || (query.limit.is_some() && query.page.is_none());
    let cursor = query.cursor.clone();
    let limit = query.limit;
    let page = query.page;
    let page_size = query.page_size;

    let filter = query.into_filter(user_id.clone());

    if use_cursor {
        let limit = limit.unwrap_or(state.page_size_default).clamp(1, state.page_size_max);
        let page = state
            .query
            .get_keyset(&user_id, &filter, cursor.as_deref(), limit)
            .await?;
        Ok(Json(ListResponse::Cursor(page)))
    } else {
        let page_num = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(state.page_size_default).clamp(1, state.page_size_max);
        let result = state.query.get(&user_id, &filter, page_num, page_size).await?;
        Ok(Json(ListResponse::Offset(result)))
    }
}

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    CurrentUserOptional(current_user_id): CurrentUserOptional,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| {
        ApiError::bad_request(format!(
            "invalid transaction id format, expected a UUID, got '{id}'"
        ))
    })?;

    let transaction = state.query.get_one(id).await?.ok_or_else(|| ApiError::not_found(format!("transaction {id} not found")))?;

    if let Some(current_user_id) = current_user_id {
        if transaction.user_id != current_user_id {
            tracing::warn!(authenticated_user = current_user_id, transaction_user = transaction.user_id, %id, "cross-user transaction access rejected");
            return Err(ApiError::forbidden("you can only access your own transactions"));
        }
    }

    Ok(Json(transaction))
}

fn breaker_store_error(err: BreakerError<activity_store_postgres::StoreError>) -> ApiError {
    match err {
        BreakerError::Open(name) => {
            tracing::warn!(breaker = name, "postgres unavailable while creating transaction");
            ApiError::new(axum::http::StatusCode::SERVICE_UNAVAILABLE, anyhow::anyhow!("dependency '{name}' unavailable"))
        }
        BreakerError::Inner(e) => ApiError::from(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_user_id_wins_over_query_parameter() {
        let result = effective_user_id(Some("u1".into()), Some("u2".into())).unwrap();
        assert_eq!(result, "u1");
    }

    #[test]
    fn query_user_id_used_without_jwt() {
        let result = effective_user_id(None, Some("u2".into())).unwrap();
        assert_eq!(result, "u2");
    }

    #[test]
    fn missing_both_is_rejected() {
        assert!(effective_user_id(None, None).is_err());
    }

    #[test]
    fn metadata_filters_collects_only_present_fields() {
        let query = ListQuery {
            transaction_type: None,
            product: None,
            status: None,
            currency: None,
            start_date: None,
            end_date: None,
            min_amount: None,
            max_amount: None,
            search_query: None,
            direction: Some("sent".into()),
            merchant_name: None,
            card_last_four: Some("5678".into()),
            peer_name: None,
            page: None,
            page_size: None,
            cursor: None,
            limit: None,
            user_id: None,
        };
        let filters = query.metadata_filters().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters.get("direction").unwrap(), "sent");
        assert_eq!(filters.get("card_last_four").unwrap(), "5678");
    }
}
