use std::net::SocketAddr;

use anyhow::Context;
use backoffice_authz::bootstrap::{app_port, init_tracing, load_env};
use backoffice_authz::{create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;
    let app = create_app(pool).await.context("failed to build application")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], app_port()));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
