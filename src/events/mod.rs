//! Audit trail for administrative changes.
//!
//! Handlers publish onto a broadcast bus; a single listener task persists
//! each event to `audit_log`, chaining SHA-256 hashes over the payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Uuid,
    pub severity: Severity,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<AuditEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<AuditEvent>) {
    broadcast::channel(1024)
}

/// Publishes `<entity>.<action>` for `entity`. Never fails the caller.
pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<Uuid>, entity: &T) {
    let event = AuditEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id,
        subject_id: entity.subject_id(),
        severity: entity.severity_for_action(action),
        payload: serde_json::to_value(entity).unwrap_or_default(),
    };

    tracing::info!(event = %event.name, subject_id = %event.subject_id, "audit event");

    // No receiver (e.g. CLI runs) is fine.
    let _ = event_bus.send(event);
}

/// SHA256(prev_hash || payload)
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub async fn persist_event(pool: &SqlitePool, event: &AuditEvent) -> Result<(), sqlx::Error> {
    let payload = serde_json::to_string(event).unwrap_or_default();

    let mut tx = pool.begin().await?;
    let prev_hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY rowid DESC LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;
    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        r#"
        INSERT INTO audit_log (id, event_name, occurred_at, actor_id, subject_id, payload, severity, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(&event.name)
    .bind(event.occurred_at)
    .bind(event.actor_id.map(|id| id.to_string()))
    .bind(event.subject_id.to_string())
    .bind(&payload)
    .bind(event.severity.as_str())
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

pub async fn start_audit_listener(mut rx: broadcast::Receiver<AuditEvent>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = persist_event(&pool, &event).await {
                    tracing::error!(event = %event.name, "failed to persist audit event: {}", e);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
