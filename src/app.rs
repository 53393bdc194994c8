//! Router assembly: routes plus the request pipeline.

use crate::middleware::{
    cors_layer, deadline, envelope, log_requests, no_route, not_found, parse_body,
};
use crate::routes::{api_routes, common_routes};
use crate::state::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

/// Build the service. Stages run outermost first: logging, CORS, body
/// parsing, envelope, deadline, not-found fallback, then dispatch.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();
    let prefix = config.api_prefix.as_str();
    let api = if prefix.is_empty() {
        api_routes()
    } else {
        Router::new().nest(prefix, api_routes())
    };

    Router::new()
        .merge(common_routes())
        .merge(api)
        .fallback(no_route)
        .layer(from_fn(not_found))
        .layer(from_fn_with_state(config.request_timeout, deadline))
        .layer(from_fn(envelope))
        .layer(from_fn_with_state(config.body_limit, parse_body))
        .layer(cors_layer(&config))
        .layer(from_fn_with_state(state.log_sink.clone(), log_requests))
        .with_state(state)
}
