//! JWT claim issuance and extraction. Token issuance here is deliberately
//! unauthenticated — it mints a claim for whatever `user_id` it is asked
//! for, the same "simplified for development/testing" contract the source
//! system's own `/auth/token` endpoint documents.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub exp: i64,
}

pub fn issue_token(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    let exp = Utc::now() + chrono::Duration::minutes(state.jwt_expire_minutes);
    let claims = Claims {
        sub: user_id.to_string(),
        user_id: user_id.to_string(),
        exp: exp.timestamp(),
    };
    jsonwebtoken::encode(&jsonwebtoken::Header::new(state.jwt_algorithm), &claims, &state.jwt_encoding_key)
        .map_err(|e| ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e))
}

fn decode(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    jsonwebtoken::decode::<Claims>(token, &state.jwt_decoding_key, &state.jwt_validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!(error = %e, "JWT decode error");
            ApiError::unauthorized("invalid authentication credentials")
        })
}

/// Extracts the authenticated user id from a bearer token. Rejects the
/// request with 401 if the header is missing or the token is invalid.
pub struct CurrentUser(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);
        let TypedHeader(auth) = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::unauthorized("missing bearer token"))?;
        let claims = decode(&app, auth.token())?;
        Ok(CurrentUser(claims.user_id))
    }
}

/// Same as [`CurrentUser`] but tolerates a missing or invalid token, mapping
/// either case to `None` rather than rejecting the request — used by
/// endpoints that can fall back to a `user_id` query parameter for
/// development/testing without a JWT.
pub struct CurrentUserOptional(pub Option<String>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUserOptional
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);
        let Ok(TypedHeader(auth)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
        else {
            return Ok(CurrentUserOptional(None));
        };
        Ok(CurrentUserOptional(decode(&app, auth.token()).ok().map(|c| c.user_id)))
    }
}
