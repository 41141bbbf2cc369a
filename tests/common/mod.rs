#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};

use backoffice_authz::app::AppState;
use backoffice_authz::authz::{Principal, DEFAULT_GUARD};
use backoffice_authz::config::AuthzConfig;
use backoffice_authz::jwt::JwtConfig;
use backoffice_authz::models::user::{NewUser, User};
use backoffice_authz::seed;
use backoffice_authz::store::RbacStore;

pub const JWT_SECRET: &str = "test-secret";

/// Fresh migrated database in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub async fn setup_db() -> Result<(TempDir, SqlitePool)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

/// Migrated and seeded database plus the wired application state.
pub async fn seeded_state() -> Result<(TempDir, AppState)> {
    let (dir, pool) = setup_db().await?;
    let state = AppState::new(pool, JwtConfig::new(JWT_SECRET, 1), &AuthzConfig::default())?;
    seed::run(state.store.as_ref(), DEFAULT_GUARD).await?;
    Ok((dir, state))
}

/// Creates an active user holding `roles` (by name, default guard).
pub async fn user_with_roles(store: &dyn RbacStore, email: &str, roles: &[&str], password_hash: &str) -> Result<User> {
    let user = store
        .create_user(NewUser {
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
        })
        .await?;

    for name in roles {
        let role = store
            .find_role_by_name(name, DEFAULT_GUARD)
            .await?
            .with_context(|| format!("role {name} missing"))?;
        store.assign_role(user.id, role.id).await?;
    }

    Ok(user)
}

pub async fn principal(store: &dyn RbacStore, user: &User) -> Result<Principal> {
    store
        .load_principal(user.id, DEFAULT_GUARD)
        .await?
        .with_context(|| format!("no principal for {}", user.email))
}
