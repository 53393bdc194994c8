//! Standard response envelope.
//!
//! Every body leaving the pipeline has the shape
//! `{ "success": bool, "message": string, "data": any, "code": u16 }`.
//! Handlers return a [`Reply`] (the success side); [`crate::AppError`] renders
//! the failure side. Both tag the response with [`Enveloped`] so outer stages
//! know the body is already normalized.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub code: u16,
}

/// Response extension: the body is already an [`Envelope`].
#[derive(Clone, Copy, Debug)]
pub struct Enveloped;

/// Response extension: the request failed. Read by the request log.
#[derive(Clone, Debug)]
pub struct Failure {
    pub kind: &'static str,
    pub message: String,
}

pub fn success_body<T: Serialize>(data: T, code: StatusCode) -> Envelope<T> {
    Envelope {
        success: true,
        message: String::new(),
        data,
        code: code.as_u16(),
    }
}

pub fn failure_body(code: StatusCode, message: String) -> Envelope<Value> {
    Envelope {
        success: false,
        message,
        data: Value::Object(serde_json::Map::new()),
        code: code.as_u16(),
    }
}

/// Success result built by a handler. Code defaults to 200.
#[derive(Clone, Debug)]
pub struct Reply {
    data: Value,
    code: StatusCode,
}

impl Reply {
    pub fn new(data: impl Into<Value>) -> Self {
        Reply {
            data: data.into(),
            code: StatusCode::OK,
        }
    }

    pub fn with_code(mut self, code: StatusCode) -> Self {
        self.code = code;
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut res = (self.code, Json(success_body(self.data, self.code))).into_response();
        res.extensions_mut().insert(Enveloped);
        res
    }
}
