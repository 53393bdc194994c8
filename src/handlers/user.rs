//! User handlers: register, list, read.

use super::{body_object, list_params, pick};
use crate::error::AppError;
use crate::middleware::ParsedBody;
use crate::response::Reply;
use crate::schema::ID_FIELD;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use serde_json::Value;
use std::collections::HashMap;

/// The only request fields read on registration.
pub const REGISTER_FIELDS: &[&str] = &["email", "password", "name", "sex"];

pub async fn register(State(state): State<AppState>, body: ParsedBody) -> Result<Reply, AppError> {
    let input = pick(&body_object(body)?, REGISTER_FIELDS);
    let created = state.users.register(&input).await?;
    Ok(Reply::new(state.users.crud().public(&created)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Reply, AppError> {
    let users = state.users.crud();
    let (filters, page) = list_params(users.schema(), params);
    let found = users.find(&filters, page).await?;
    Ok(Reply::new(
        found.iter().map(|u| Value::Object(users.public(u))).collect::<Vec<_>>(),
    ))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply, AppError> {
    let users = state.users.crud();
    let found = users.find_one(&[(ID_FIELD.to_string(), Value::String(id))]).await?;
    Ok(Reply::new(users.public(&found)))
}
