//! The HTTP-facing error type every handler returns through `?`. Wraps an
//! `anyhow::Error` alongside the status code it should render as.

use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug, thiserror::Error)]
#[error("status: {status}, error: {error}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self { status, error: error.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow::anyhow!(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, anyhow::anyhow!(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, anyhow::anyhow!(message.into()))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<activity_query::QueryError> for ApiError {
    fn from(error: activity_query::QueryError) -> Self {
        use activity_query::QueryError;
        match error {
            QueryError::NotFound(id) => Self::not_found(format!("transaction {id} not found")),
            QueryError::BreakerOpen(name) => {
                tracing::warn!(breaker = name, "API responding with service unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, anyhow::anyhow!("dependency '{name}' unavailable"))
            }
            other => {
                tracing::error!(error = %other, "API responding with internal error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, anyhow::anyhow!("internal server error"))
            }
        }
    }
}

impl From<activity_store_postgres::StoreError> for ApiError {
    fn from(error: activity_store_postgres::StoreError) -> Self {
        use activity_store_postgres::StoreError;
        match error {
            StoreError::NotFound(id) => Self::not_found(format!("transaction {id} not found")),
            other => {
                tracing::error!(error = %other, "API responding with database error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, anyhow::anyhow!("database error, please retry the request"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "detail": format!("{:#}", self.error) });
        (self.status, axum::Json(body)).into_response()
    }
}
