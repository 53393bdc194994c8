//! Typed errors and HTTP mapping.

use crate::response::{failure_body, Enveloped, Failure};
use crate::schema::ValidationErrors;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("route not found: {0}")]
    RouteNotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error class. Client-caused failures from the
    /// controllers (validation, conflict, malformed input) all answer 400.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::Conflict(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) | AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short machine name, used by the request log.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::RouteNotFound(_) => "route_not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::UnsupportedMediaType(_) => "unsupported_media_type",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueConflict { field, .. } => {
                AppError::Conflict(format!("{} already exists", field))
            }
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let failure = Failure {
            kind: self.kind(),
            message: message.clone(),
        };
        let mut res = (status, Json(failure_body(status, message))).into_response();
        res.extensions_mut().insert(Enveloped);
        res.extensions_mut().insert(failure);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Rule, Violation};

    #[test]
    fn store_conflict_becomes_client_error() {
        let err: AppError = StoreError::UniqueConflict {
            entity: "user".into(),
            field: "email".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "conflict: email already exists");
    }

    #[test]
    fn unavailable_store_is_5xx() {
        let err: AppError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind(), "store_unavailable");
    }

    #[test]
    fn validation_message_lists_every_violation() {
        let err = AppError::from(ValidationErrors::new(vec![
            Violation::new("email", Rule::Required),
            Violation::new("password", Rule::MinLength(6)),
        ]));
        assert_eq!(
            err.to_string(),
            "validation: email is required; password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn response_carries_failure_envelope() {
        let res = AppError::NotFound("article 42".into()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.extensions().get::<Enveloped>().is_some());
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "message": "not found: article 42",
                "data": {},
                "code": 404
            })
        );
    }
}
