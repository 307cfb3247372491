use std::sync::Arc;

use activity_breaker::BreakerRegistry;
use activity_cache::CacheClient;
use activity_enrichment::StrategyRegistry;
use activity_events::EventPublisher;
use activity_health::HealthAggregator;
use activity_query::QueryBackend;
use activity_query::QueryService;
use activity_store_postgres::PostgresStore;
use activity_store_search::SearchIndex;

/// Shared process state handed to every handler via `axum::extract::State`.
pub struct AppState {
    pub query: QueryService<Box<dyn QueryBackend>>,
    pub postgres: PostgresStore,
    pub search: SearchIndex,
    pub events: EventPublisher,
    pub cache: CacheClient,
    pub cache_namespace: &'static str,
    pub breakers: Arc<BreakerRegistry>,
    pub strategies: StrategyRegistry,
    pub health: HealthAggregator,
    pub jwt_encoding_key: jsonwebtoken::EncodingKey,
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,
    pub jwt_validation: jsonwebtoken::Validation,
    pub jwt_algorithm: jsonwebtoken::Algorithm,
    pub jwt_expire_minutes: i64,
    pub page_size_default: i64,
    pub page_size_max: i64,
}

pub type SharedState = Arc<AppState>;
