//! Article handlers: create, list, read (author resolved), update, delete.

use super::{body_object, list_params, pick, writable_fields};
use crate::error::AppError;
use crate::middleware::ParsedBody;
use crate::response::Reply;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use serde_json::Value;
use std::collections::HashMap;

pub async fn create(State(state): State<AppState>, body: ParsedBody) -> Result<Reply, AppError> {
    let articles = &state.articles;
    let input = pick(&body_object(body)?, &writable_fields(articles.schema()));
    let created = articles.create(&input).await?;
    Ok(Reply::new(articles.public(&created)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Reply, AppError> {
    let articles = &state.articles;
    let (filters, page) = list_params(articles.schema(), params);
    let found = articles.find(&filters, page).await?;
    Ok(Reply::new(
        found.iter().map(|a| Value::Object(articles.public(a))).collect::<Vec<_>>(),
    ))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply, AppError> {
    let found = state.articles.find_by_id(&id).await?;
    Ok(Reply::new(state.articles.public(&found)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: ParsedBody,
) -> Result<Reply, AppError> {
    let articles = &state.articles;
    let patch = pick(&body_object(body)?, &writable_fields(articles.schema()));
    let updated = articles.update(&id, &patch).await?;
    Ok(Reply::new(articles.public(&updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply, AppError> {
    let removed = state.articles.delete(&id).await?;
    Ok(Reply::new(state.articles.public(&removed)))
}
