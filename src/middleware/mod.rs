//! Request pipeline stages, outermost first: logging, CORS, body parsing,
//! envelope, deadline, not-found fallback. See [`crate::build_app`].

mod body;
mod deadline;
mod envelope;
mod logging;
mod not_found;

pub use body::{parse_body, ParsedBody};
pub use deadline::deadline;
pub use envelope::envelope;
pub use logging::{init_tracing, log_requests, LogSink, RequestSummary, TracingSink};
pub use not_found::{no_route, not_found};

use crate::config::AppConfig;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// CORS policy: the configured origins, or the caller's own origin when none are set.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow)
        .allow_methods(Any)
        .allow_headers(Any)
}
