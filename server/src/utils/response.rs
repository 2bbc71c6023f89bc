//! JSON envelopes shared by every endpoint:
//! `{success, data, message}` or `{success: false, error: {code, message, details}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorDetail,
}

pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    with_status(StatusCode::OK, true, data, message)
}

pub fn created<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    with_status(StatusCode::CREATED, true, data, message)
}

/// Data-carrying envelope with an explicit status. Used where the payload is
/// meaningful even though the request did not succeed (an undecided scan).
pub fn with_status<T: Serialize>(
    status: StatusCode,
    success: bool,
    data: T,
    message: impl Into<String>,
) -> Response {
    let envelope = Envelope {
        success,
        data,
        message: message.into(),
    };
    (status, Json(envelope)).into_response()
}

pub fn error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Option<Value>,
) -> Response {
    let envelope = ErrorEnvelope {
        success: false,
        error: ErrorDetail {
            code,
            message: message.into(),
            details,
        },
    };
    (status, Json(envelope)).into_response()
}
