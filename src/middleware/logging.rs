//! Request logging: the outermost stage. Times the rest of the pipeline and
//! reports one line per request to a [`LogSink`], as a response log or, when
//! the response carries a [`Failure`], an error log.

use crate::error::AppError;
use crate::middleware::ParsedBody;
use crate::response::Failure;
use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{ConnectInfo, Query, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Response bodies above this size are logged by length only.
const LOG_BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub client_ip: String,
    /// Query map for GET, parsed body otherwise.
    pub payload: Value,
    pub status: u16,
    /// Outgoing body (normally the envelope); Null when empty.
    pub response: Value,
}

/// Destination for request logs. Implementations must not panic; there is no
/// way for a sink to fail a request.
pub trait LogSink: Send + Sync {
    fn response(&self, summary: &RequestSummary, elapsed: Duration);
    fn error(&self, summary: &RequestSummary, failure: &Failure, elapsed: Duration);
}

/// Default sink: `quill::response` and `quill::error` tracing events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn response(&self, s: &RequestSummary, elapsed: Duration) {
        tracing::info!(
            target: "quill::response",
            method = %s.method,
            url = %s.url,
            ip = %s.client_ip,
            status = s.status,
            elapsed_ms = elapsed.as_millis() as u64,
            payload = %s.payload,
            response = %s.response,
        );
    }

    fn error(&self, s: &RequestSummary, failure: &Failure, elapsed: Duration) {
        tracing::error!(
            target: "quill::error",
            method = %s.method,
            url = %s.url,
            ip = %s.client_ip,
            status = s.status,
            elapsed_ms = elapsed.as_millis() as u64,
            payload = %s.payload,
            response = %s.response,
            kind = failure.kind,
            message = %failure.message,
        );
    }
}

pub async fn log_requests(
    State(sink): State<Arc<dyn LogSink>>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let url = req.uri().to_string();
    let client_ip = client_ip(&req);
    let query = (method == Method::GET).then(|| query_map(&req));

    let res = next.run(req).await;

    let payload = match query {
        Some(q) => q,
        None => res
            .extensions()
            .get::<ParsedBody>()
            .map(|b| b.0.clone())
            .unwrap_or(Value::Null),
    };
    let (res, response) = capture_body(res).await;
    let summary = RequestSummary {
        method: method.to_string(),
        url,
        client_ip,
        payload,
        status: res.status().as_u16(),
        response,
    };
    let elapsed = started.elapsed();
    match res.extensions().get::<Failure>() {
        Some(failure) => sink.error(&summary, failure, elapsed),
        None => sink.response(&summary, elapsed),
    }
    res
}

/// Buffer a sized body up to [`LOG_BODY_LIMIT`] and hand it back unchanged.
/// Larger or streamed bodies pass through and are described instead.
async fn capture_body(res: Response) -> (Response, Value) {
    let (parts, body) = res.into_parts();
    match body.size_hint().upper() {
        Some(n) if n <= LOG_BODY_LIMIT as u64 => match to_bytes(body, LOG_BODY_LIMIT).await {
            Ok(bytes) => {
                let logged = logged_value(&bytes);
                (Response::from_parts(parts, Body::from(bytes)), logged)
            }
            Err(e) => {
                let res = AppError::Internal(format!("unreadable response body: {}", e));
                (res.into_response(), Value::Null)
            }
        },
        Some(n) => (
            Response::from_parts(parts, body),
            Value::String(format!("<{} bytes>", n)),
        ),
        None => (Response::from_parts(parts, body), Value::String("<streamed>".into())),
    }
}

fn logged_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn client_ip(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    forwarded_for(req.headers()).unwrap_or_else(|| "-".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn query_map(req: &Request) -> Value {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .unwrap_or_else(|_| Query(HashMap::new()));
    Value::Object(params.into_iter().map(|(k, v)| (k, Value::String(v))).collect::<Map<_, _>>())
}

/// Install the global subscriber. `RUST_LOG` overrides the default `quill=info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quill=info,quill_server=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
