//! Administrative API under `/admin`.
//!
//! Every handler takes an [`AdminUser`], so the whole router sits behind
//! authentication, the active-account check and `admin.access`. Per-action
//! abilities are checked by [`crate::admin::AdminService`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;
use crate::models::rbac::*;
use crate::models::user::{SetActiveRequest, User, UserCreateRequest, UserFilter, UserUpdateRequest};
use crate::routes::guard::AdminUser;
use crate::utils::hash_password;

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(catalog))
        // Roles
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", put(rename_role).delete(delete_role))
        .route(
            "/roles/:role_id/permissions",
            get(get_role_permissions).put(sync_role_permissions),
        )
        // Permissions
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/permissions/:permission_id", delete(delete_permission))
        // Users
        .route("/users", get(list_users).post(create_user))
        .route("/users/:user_id", put(update_user).delete(delete_user))
        .route("/users/:user_id/access", put(sync_user_access))
        .route("/users/:user_id/active", put(set_user_active))
        .route("/users/:user_id/effective-permissions", get(get_effective_permissions))
        // Ad-hoc checks for the current user
        .route("/can/:ability", get(can))
}

// =============================================================================
// CATALOG
// =============================================================================

async fn catalog(_admin: AdminUser) -> Json<Vec<CatalogGroup>> {
    Json(catalog_groups())
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

async fn list_roles(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Vec<Role>>, AppError> {
    Ok(Json(state.admin.list_roles(&admin.principal).await?))
}

async fn create_role(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<RoleCreateRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    let role = state
        .admin
        .create_role(&admin.principal, &req.name, req.guard.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn rename_role(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(role_id): Path<Uuid>,
    Json(req): Json<RoleRenameRequest>,
) -> Result<Json<Role>, AppError> {
    Ok(Json(state.admin.rename_role(&admin.principal, role_id, &req.name).await?))
}

async fn delete_role(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.admin.delete_role(&admin.principal, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_role_permissions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Vec<PermissionView>>, AppError> {
    Ok(Json(state.admin.role_permissions(&admin.principal, role_id).await?))
}

async fn sync_role_permissions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(role_id): Path<Uuid>,
    Json(req): Json<SyncRolePermissionsRequest>,
) -> Result<Json<RolePermissionSync>, AppError> {
    let sync = state
        .admin
        .sync_role_permissions(&admin.principal, role_id, &req.permission_ids)
        .await?;
    Ok(Json(sync))
}

// =============================================================================
// PERMISSION ENDPOINTS
// =============================================================================

async fn list_permissions(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Vec<PermissionView>>, AppError> {
    Ok(Json(state.admin.list_permissions(&admin.principal).await?))
}

async fn create_permission(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<PermissionCreateRequest>,
) -> Result<(StatusCode, Json<PermissionView>), AppError> {
    let permission = state
        .admin
        .create_permission(&admin.principal, &req.name, req.guard.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(permission.into())))
}

async fn delete_permission(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(permission_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.admin.delete_permission(&admin.principal, permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// USER ENDPOINTS
// =============================================================================

async fn list_users(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.admin.list_users(&admin.principal, &filter).await?))
}

async fn create_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<UserCreateRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let password_hash = hash_password(&req.password)?;
    let user = state
        .admin
        .create_user(&admin.principal, &req.name, &req.email, password_hash, req.is_active)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserUpdateRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .admin
        .update_user(&admin.principal, user_id, &req.name, &req.email, req.is_active)
        .await?;
    Ok(Json(user))
}

async fn sync_user_access(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserAccessRequest>,
) -> Result<Json<UserAccessSync>, AppError> {
    let sync = state
        .admin
        .sync_user_access(&admin.principal, user_id, &req.role_ids, &req.permission_ids)
        .await?;
    Ok(Json(sync))
}

async fn set_user_active(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.admin.set_user_active(&admin.principal, user_id, req.is_active).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.admin.delete_user(&admin.principal, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Effective permissions with their source (role or direct grant).
async fn get_effective_permissions(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<EffectivePermissions>, AppError> {
    Ok(Json(state.admin.effective_permissions(&admin.principal, user_id).await?))
}

async fn can(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(ability): Path<String>,
) -> Result<Json<CanResponse>, AppError> {
    Ok(Json(state.admin.check(&admin.principal, &ability)?))
}
