//! Envelope stage: every response leaving it has the standard body shape.
//!
//! Handlers and [`AppError`](crate::AppError) already produce envelopes and mark
//! them [`Enveloped`]; those pass through untouched. Anything else (framework
//! rejections, 405s, plain handlers) is re-wrapped here: failures become
//! `{success:false, message, data:{}, code}`, successes carry the inner JSON
//! (or text) as `data`.

use crate::error::AppError;
use crate::response::{failure_body, success_body, Enveloped, Failure};
use axum::{
    body::to_bytes,
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// Upper bound on an inner body we are willing to re-wrap.
const REWRAP_LIMIT: usize = 1024 * 1024;

pub async fn envelope(req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    if res.extensions().get::<Enveloped>().is_some() {
        return res;
    }
    let (parts, body) = res.into_parts();
    let status = parts.status;
    let bytes = match to_bytes(body, REWRAP_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::Internal(format!("unreadable response body: {}", e)).into_response()
        }
    };

    let mut out = if status.is_client_error() || status.is_server_error() {
        let text = String::from_utf8_lossy(&bytes).trim().to_string();
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
        } else {
            text
        };
        let mut out = (status, Json(failure_body(status, message.clone()))).into_response();
        out.extensions_mut().insert(Failure {
            kind: kind_for(status),
            message,
        });
        out
    } else {
        let data = if bytes.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, Json(success_body(data, status))).into_response()
    };

    carry_headers(&parts.headers, out.headers_mut());
    let extensions = parts.extensions;
    out.extensions_mut().extend(extensions);
    out.extensions_mut().insert(Enveloped);
    out
}

/// Keep headers like `allow` or CORS headers; drop the ones describing the old body.
fn carry_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

fn kind_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => "bad_request",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::METHOD_NOT_ALLOWED => "method_not_allowed",
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        s if s.is_server_error() => "internal_error",
        _ => "client_error",
    }
}
