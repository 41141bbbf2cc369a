use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
    /// Number of registered gates.
    pub gates: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;

    Json(HealthResponse {
        status: "ok",
        db_ok: db.is_ok(),
        db_error: db.err().map(|e| e.to_string()),
        gates: state.gate.registry().len(),
    })
}
