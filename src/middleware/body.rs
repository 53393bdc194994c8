//! Body parsing stage. Buffers the request body once, parses JSON or urlencoded
//! forms into a [`ParsedBody`] request extension and restores the bytes for
//! later extractors.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::convert::Infallible;

/// Parsed request payload. An empty object when the request had no body.
/// Form fields arrive as strings; the schema validator casts them.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedBody(pub Value);

impl ParsedBody {
    fn empty() -> Self {
        ParsedBody(Value::Object(Map::new()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or_else(ParsedBody::empty))
    }
}

/// Stage: reject oversized bodies (413), parse JSON and urlencoded bodies (400
/// when malformed), reject any other non-empty body (415). GET and HEAD bodies
/// are not read. The parsed value is also copied onto the response so the
/// request log can report it.
pub async fn parse_body(State(limit): State<usize>, req: Request, next: Next) -> Response {
    if req.method() == Method::GET || req.method() == Method::HEAD {
        return next.run(req).await;
    }
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|n| n > limit) {
        return too_large(limit);
    }

    let (mut parts, body) = req.into_parts();
    let bytes = match to_bytes(body, limit).await {
        Ok(b) => b,
        Err(_) => return too_large(limit),
    };
    let parsed = if bytes.is_empty() {
        ParsedBody::empty()
    } else {
        match parse(media_type(&parts).as_deref(), &bytes) {
            Ok(p) => p,
            Err(e) => return e.into_response(),
        }
    };
    parts.extensions.insert(parsed.clone());

    let mut res = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    res.extensions_mut().insert(parsed);
    res
}

fn too_large(limit: usize) -> Response {
    AppError::PayloadTooLarge(format!("body exceeds {} bytes", limit)).into_response()
}

fn parse(media_type: Option<&str>, bytes: &[u8]) -> Result<ParsedBody, AppError> {
    match media_type {
        Some(m) if m == "application/json" || m.ends_with("+json") => serde_json::from_slice(bytes)
            .map(ParsedBody)
            .map_err(|e| AppError::BadRequest(format!("malformed JSON body: {}", e))),
        Some("application/x-www-form-urlencoded") => {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes)
                .map(|pairs| {
                    let fields: Map<String, Value> =
                        pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
                    ParsedBody(Value::Object(fields))
                })
                .map_err(|e| AppError::BadRequest(format!("malformed form body: {}", e)))
        }
        other => Err(AppError::UnsupportedMediaType(
            other.unwrap_or("missing content type").to_string(),
        )),
    }
}

/// Lowercased media type without parameters, e.g. `application/json`.
fn media_type(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware::from_fn_with_state, routing::post, Json, Router};
    use serde_json::json;
    use tower::ServiceExt;

    fn app(limit: usize) -> Router {
        Router::new()
            .route("/", post(|ParsedBody(v): ParsedBody| async move { Json(v) }))
            .layer(from_fn_with_state(limit, parse_body))
    }

    fn post_json(body: &str) -> Request {
        axum::http::Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_of(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn json_body_reaches_handler() {
        let res = app(1024).oneshot(post_json(r#"{"name":"Ann"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.extensions().get::<ParsedBody>(),
            Some(&ParsedBody(json!({ "name": "Ann" })))
        );
        assert_eq!(json_of(res).await, json!({ "name": "Ann" }));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let res = app(1024).oneshot(post_json("{not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(res).await["success"], json!(false));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let res = app(8).oneshot(post_json(r#"{"name":"a long name"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn form_body_parses_into_string_fields() {
        let req = axum::http::Request::post("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=a%40b.com&name=Ann+Lee&sex=1"))
            .unwrap();
        let res = app(1024).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            json_of(res).await,
            json!({ "email": "a@b.com", "name": "Ann Lee", "sex": "1" })
        );
    }

    #[tokio::test]
    async fn unsupported_body_is_415() {
        let req = axum::http::Request::post("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let res = app(1024).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            json_of(res).await["message"],
            json!("unsupported media type: text/plain")
        );
    }

    #[tokio::test]
    async fn empty_body_parses_as_empty_object() {
        let req = axum::http::Request::post("/").body(Body::empty()).unwrap();
        let res = app(1024).oneshot(req).await.unwrap();
        assert_eq!(json_of(res).await, json!({}));
    }
}
