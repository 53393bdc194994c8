//! Not-found fallback: a 404 nobody rendered means no route matched.

use crate::error::AppError;
use crate::response::Enveloped;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn not_found(req: Request, next: Next) -> Response {
    let target = format!("{} {}", req.method(), req.uri().path());
    let res = next.run(req).await;
    if res.status() == StatusCode::NOT_FOUND && res.extensions().get::<Enveloped>().is_none() {
        return AppError::RouteNotFound(target).into_response();
    }
    res
}

/// Router fallback: answers with a bare 404 for [`not_found`] to replace.
pub async fn no_route() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn, routing::get, Router};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/article/:id", get(|| async { AppError::NotFound("article 7".into()) }))
            .fallback(no_route)
            .layer(from_fn(not_found))
    }

    async fn body(path: &str) -> Value {
        let res = app()
            .oneshot(axum::http::Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unmatched_path_gets_route_not_found() {
        assert_eq!(
            body("/nowhere").await,
            json!({
                "success": false,
                "message": "route not found: GET /nowhere",
                "data": {},
                "code": 404
            })
        );
    }

    #[tokio::test]
    async fn handler_404_is_left_alone() {
        assert_eq!(body("/article/7").await["message"], json!("not found: article 7"));
    }
}
