use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{issue_token, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let access_token = issue_token(&state, &request.user_id)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.jwt_expire_minutes * 60,
    }))
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user_id: String,
}

pub async fn get_current_user(CurrentUser(user_id): CurrentUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse { user_id })
}
