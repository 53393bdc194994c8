//! quill-server: binds the quill router on APP_IP:APP_PORT.
//!
//! Run from repo root: `cargo run -p quill-server`

use quill::{
    build_app, ensure_database_exists, init_tracing, AppConfig, AppState, DocumentStore,
    PgDocumentStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let store = Arc::new(
        PgDocumentStore::connect(
            &config.database_url,
            &config.db_schema,
            config.db_max_connections,
        )
        .await?,
    );

    let addr = config.listen_addr();
    let state = AppState::new(config, store.clone() as Arc<dyn DocumentStore>)?;
    state.prepare_store().await?;
    let app = build_app(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("quill listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("store closed, bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
