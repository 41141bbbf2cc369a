use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::user::{AuthResponse, LoginRequest};
use crate::utils::verify_password;

/// Exchanges credentials for a bearer token. Deactivated accounts cannot
/// log in.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = state
        .store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    if !db_user.user.is_active {
        tracing::warn!(user_id = %db_user.user.id, "login refused for inactive account");
        return Err(AppError::unauthorized("account inactive"));
    }

    let token = state.jwt.issue(db_user.user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: db_user.user,
    }))
}
