mod common;

use std::time::Duration;

use anyhow::Result;
use sqlx::Row;

use backoffice_authz::events::chain_hash;

use common::{principal, seeded_state, user_with_roles};

#[tokio::test]
async fn admin_changes_are_chained_in_audit_log() -> Result<()> {
    let (_dir, state) = seeded_state().await?;
    let store = state.store.as_ref();
    let root_user = user_with_roles(store, "root@example.com", &["super-admin"], "x").await?;
    let root = principal(store, &root_user).await?;

    let editor = state.admin.create_role(&root, "editor", None).await?;
    state.admin.rename_role(&root, editor.id, "writer").await?;
    state.admin.delete_role(&root, editor.id).await?;

    // The listener persists asynchronously.
    let mut rows = Vec::new();
    for _ in 0..50 {
        rows = sqlx::query("SELECT event_name, severity, payload, prev_hash, hash FROM audit_log ORDER BY rowid")
            .fetch_all(&state.pool)
            .await?;
        if rows.len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(rows.len(), 3);

    let names: Vec<String> = rows.iter().map(|r| r.get("event_name")).collect();
    assert_eq!(names, ["role.created", "role.updated", "role.deleted"]);
    assert!(rows.iter().all(|r| r.get::<String, _>("severity") == "critical"));

    let mut prev: Option<String> = None;
    for row in &rows {
        let payload: String = row.get("payload");
        let stored_prev: Option<String> = row.get("prev_hash");
        let hash: String = row.get("hash");
        assert_eq!(stored_prev, prev);
        assert_eq!(hash, chain_hash(prev.as_deref(), &payload));
        prev = Some(hash);
    }
    Ok(())
}
