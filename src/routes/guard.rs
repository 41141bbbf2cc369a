use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app::AppState;
use crate::authz::{AuthzError, Decision, Principal, ADMIN_ACCESS};
use crate::errors::AppError;
use crate::jwt::AuthUser;

/// An authenticated, active caller admitted to the administrative area.
///
/// Rejects with 401 when the token is missing or invalid, the user no
/// longer exists, or the account is inactive, and with 403 when the caller
/// lacks `admin.access`. The principal is loaded fresh for every request.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub principal: Principal,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let principal = state
            .store
            .load_principal(auth.user_id, &state.guard)
            .await?
            .ok_or_else(|| AppError::unauthorized("user not found"))?;

        match state.gate.admin_access(&principal) {
            Decision::Allow => Ok(AdminUser { principal }),
            Decision::Deny(reason) => {
                tracing::warn!(user_id = %auth.user_id, reason = %reason, "admin area refused");
                Err(AuthzError::denied(ADMIN_ACCESS, reason).into())
            }
        }
    }
}
