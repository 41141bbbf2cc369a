mod common;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

use backoffice_authz::create_app;

use common::{setup_db, JWT_SECRET};

#[tokio::test]
async fn health_endpoint_reports_db_and_gates() -> Result<()> {
    let (_dir, pool) = setup_db().await?;

    std::env::set_var("JWT_SECRET", JWT_SECRET);
    let app = create_app(pool.clone()).await?;

    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())?;

    let resp: Response = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK, "health endpoint did not return 200");

    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let v: Value = serde_json::from_slice(&body_bytes)?;
    assert_eq!(v["db_ok"], true, "expected db_ok: true, got: {}", v);
    // 16 catalog gates, users.delete, and five per default resource.
    assert_eq!(v["gates"], 16 + 1 + 4 * 5);

    Ok(())
}
