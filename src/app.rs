use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admin::AdminService;
use crate::authz::{build_registry, Gate};
use crate::config::AuthzConfig;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_audit_listener};
use crate::jwt::JwtConfig;
use crate::routes::{admin, auth, health};
use crate::store::{RbacStore, SqliteStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub store: Arc<dyn RbacStore>,
    /// Built once at startup and read-only afterwards.
    pub gate: Arc<Gate>,
    pub admin: Arc<AdminService>,
    pub jwt: Arc<JwtConfig>,
    /// Guard that authenticated users act in.
    pub guard: String,
}

impl AppState {
    /// Wires the store, gate and admin service. Spawns the audit listener, so
    /// this must run inside a Tokio runtime.
    pub fn new(pool: SqlitePool, jwt: JwtConfig, config: &AuthzConfig) -> Result<Self, AppError> {
        let registry = build_registry(&config.guard, &config.resources)?;
        tracing::info!(gates = registry.len(), guard = %config.guard, "gate registry built");

        let store: Arc<dyn RbacStore> = Arc::new(SqliteStore::new(pool.clone()));
        let gate = Arc::new(Gate::new(registry));

        let (event_bus, event_rx) = init_event_bus();
        tokio::spawn(start_audit_listener(event_rx, pool.clone()));

        let admin = Arc::new(AdminService::new(
            store.clone(),
            gate.clone(),
            event_bus,
            config.guard.clone(),
        ));

        Ok(Self {
            pool,
            store,
            gate,
            admin,
            jwt: Arc::new(jwt),
            guard: config.guard.clone(),
        })
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt = JwtConfig::from_env()?;
    let config = AuthzConfig::from_env()?;
    let state = AppState::new(pool, jwt, &config)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .nest("/admin", admin::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
