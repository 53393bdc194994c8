//! Common routes: health, readiness, version.

use crate::error::AppError;
use crate::response::Reply;
use crate::state::AppState;
use axum::{extract::State, routing::get, Router};
use serde_json::json;

async fn health() -> Reply {
    Reply::new(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Result<Reply, AppError> {
    state.store.ping().await?;
    Ok(Reply::new(json!({ "status": "ok", "store": "ok" })))
}

async fn version() -> Reply {
    Reply::new(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /health, /ready (store ping), /version.
pub fn common_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
}
