//! The activity feed's HTTP surface: JWT issuance, transaction CRUD and
//! listing, and the dependency health rollup, under the `/api/v1` prefix.

pub mod auth;
pub mod cli;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use activity_breaker::BreakerRegistry;
use activity_cache::CacheClient;
use activity_enrichment::StrategyRegistry;
use activity_events::EventPublisher;
use activity_health::HealthAggregator;
use activity_query::{QueryBackend, QueryService, RelationalBackend, SearchBackend, RELATIONAL_CACHE_NAMESPACE, SEARCH_CACHE_NAMESPACE};
use activity_store_postgres::PostgresStore;
use activity_store_search::SearchIndex;
use anyhow::Context;
use axum::error_handling::HandleErrorLayer;
use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cli::Args;
use crate::state::{AppState, SharedState};

impl FromRef<SharedState> for SharedState {
    fn from_ref(input: &SharedState) -> Self {
        input.clone()
    }
}

/// Builds the fully-wired application state: connects to every dependency,
/// runs migrations, creates the search index, and picks the query backend
/// named by `USE_ELASTICSEARCH_AS_PRIMARY`.
pub async fn build_state(args: &Args) -> anyhow::Result<SharedState> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(args.external_service_timeout)
        .connect(&args.database_url)
        .await
        .context("connecting to postgres")?;
    let postgres = PostgresStore::new(pool);
    postgres.migrate().await.context("running database migrations")?;

    let search = SearchIndex::new(args.elasticsearch_url.clone(), args.external_service_timeout);
    search.ensure_index().await.context("ensuring search index exists")?;

    let cache = CacheClient::connect(&args.redis_url, args.cache_ttl)
        .await
        .context("connecting to redis")?;

    let events = EventPublisher::new(&args.kafka_bootstrap_servers, &args.kafka_topic)
        .context("building kafka event publisher")?;

    let breakers = Arc::new(BreakerRegistry::new(
        args.circuit_breaker_enabled,
        args.circuit_breaker_failure_threshold,
        args.circuit_breaker_timeout,
    ));

    let (backend, namespace): (Box<dyn QueryBackend>, &'static str) = if args.use_elasticsearch_as_primary {
        (Box::new(SearchBackend { search: search.clone(), breakers: breakers.clone() }), SEARCH_CACHE_NAMESPACE)
    } else {
        (
            Box::new(RelationalBackend {
                postgres: postgres.clone(),
                search: Some(search.clone()),
                breakers: breakers.clone(),
            }),
            RELATIONAL_CACHE_NAMESPACE,
        )
    };
    let query = QueryService::new(backend, cache.clone(), namespace);

    let jwt_encoding_key = jsonwebtoken::EncodingKey::from_secret(args.secret_key.as_bytes());
    let jwt_decoding_key = jsonwebtoken::DecodingKey::from_secret(args.secret_key.as_bytes());
    let jwt_validation = jsonwebtoken::Validation::new(args.jwt_algorithm);

    Ok(Arc::new(AppState {
        query,
        postgres,
        search,
        events,
        cache,
        cache_namespace: namespace,
        breakers: breakers.clone(),
        strategies: StrategyRegistry::new(),
        health: HealthAggregator::new(breakers),
        jwt_encoding_key,
        jwt_decoding_key,
        jwt_validation,
        jwt_algorithm: args.jwt_algorithm,
        jwt_expire_minutes: args.jwt_expire_minutes,
        page_size_default: args.page_size_default,
        page_size_max: args.page_size_max,
    }))
}

/// Per-endpoint inbound timeout overrides. `/health` gets the tightest
/// budget since it fans out to every dependency and must stay cheap for
/// load balancers; `/transactions` gets the most since it may hit the
/// search index's fuzzy-match path; `/auth` sits in between.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const AUTH_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSACTIONS_TIMEOUT: Duration = Duration::from_secs(10);

/// Wraps a sub-router so any request exceeding `timeout` gets a 504 instead
/// of hanging; in-flight work is not cancelled, only the response is cut
/// off, matching the inbound-timeout contract (handlers may still complete
/// opportunistically in the background).
fn with_request_timeout(router: Router<SharedState>, timeout: Duration) -> Router<SharedState> {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_timeout_error))
            .timeout(timeout),
    )
}

async fn handle_timeout_error(err: BoxError) -> (StatusCode, axum::Json<serde_json::Value>) {
    let (status, detail) = if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::GATEWAY_TIMEOUT, "request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled error: {err}"))
    };
    (status, axum::Json(serde_json::json!({ "detail": detail })))
}

/// Assembles the `/api/v1` router over the given state, including CORS,
/// request tracing and per-endpoint inbound-timeout middleware. `args`
/// supplies `REQUEST_TIMEOUT` as the outer bound on the whole surface, and
/// `ALLOW_ORIGIN` for CORS; each route group narrows the timeout further.
pub fn build_router(state: SharedState, args: &Args) -> Router {
    let allow_origin = &args.allow_origin;
    let cors = if allow_origin.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<axum::http::HeaderValue> = allow_origin
            .iter()
            .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(tower_http::cors::Any)
    };

    let auth_routes = with_request_timeout(
        Router::new()
            .route("/auth/token", post(routes::auth::create_token))
            .route("/auth/me", get(routes::auth::get_current_user)),
        AUTH_TIMEOUT,
    );

    let transaction_routes = with_request_timeout(
        Router::new()
            .route(
                "/transactions",
                post(routes::transactions::create_transaction).get(routes::transactions::list_transactions),
            )
            .route("/transactions/:id", get(routes::transactions::get_transaction)),
        TRANSACTIONS_TIMEOUT,
    );

    let health_routes =
        with_request_timeout(Router::new().route("/health", get(routes::health::health_check)), HEALTH_TIMEOUT);

    let api = Router::new().merge(auth_routes).merge(transaction_routes).merge(health_routes);

    with_request_timeout(
        Router::new().nest("/api/v1", api).layer(cors).layer(TraceLayer::new_for_http()),
        args.request_timeout,
    )
    .with_state(state)
}
