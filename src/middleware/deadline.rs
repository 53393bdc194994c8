//! Per-request deadline. On expiry the inner future is dropped, which cancels
//! any in-flight store call, and the request fails as store-unavailable.

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;

pub async fn deadline(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!(%path, limit_ms = limit.as_millis() as u64, "request deadline exceeded");
            let msg = format!("deadline of {}ms exceeded", limit.as_millis());
            AppError::StoreUnavailable(msg).into_response()
        }
    }
}
