use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::state::AppState;
use activity_health::HealthReport;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let database_ok = sqlx::query("SELECT 1").execute(state.postgres.pool()).await.is_ok();
    let cache_ok = state.cache.health().await;
    let search_ok = state.search.health().await;
    let kafka_ok = state.events.health().await;

    Json(state.health.aggregate(database_ok, cache_ok, search_ok, kafka_ok))
}
