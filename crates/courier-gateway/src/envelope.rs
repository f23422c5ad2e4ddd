// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The standard response envelope: `{code, message, data}` with `code = 0`
//! on success and an application error code otherwise.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application error codes carried in the envelope.
pub mod codes {
    pub const OK: i32 = 0;
    pub const INVALID_JSON: i32 = 10001;
    pub const INVALID_FIELD: i32 = 10002;
    pub const IDEMPOTENCY_KEY_TOO_LONG: i32 = 10003;
    pub const SEND_FAILED: i32 = 40001;
    pub const UNAUTHORIZED: i32 = 40101;
    pub const ROUTE_NOT_FOUND: i32 = 40400;
    pub const SESSION_NOT_FOUND: i32 = 40401;
    pub const JOB_NOT_FOUND: i32 = 40402;
    pub const INTERNAL: i32 = 50001;
    pub const ENQUEUE_FAILED: i32 = 50002;
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

/// 200 with `code = 0` and the given payload.
pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            code: codes::OK,
            message: "ok".to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

/// Error envelope with `data = null`.
pub fn fail(status: StatusCode, code: i32, message: &str) -> Response {
    (
        status,
        Json(ApiResponse::<serde_json::Value> {
            code,
            message: message.to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_shape() {
        let response = ApiResponse {
            code: codes::OK,
            message: "ok".to_string(),
            data: Some(serde_json::json!({"session_id": "abc"})),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":0"));
        assert!(json.contains("\"message\":\"ok\""));
        assert!(json.contains("\"session_id\":\"abc\""));
    }

    #[test]
    fn fail_envelope_has_null_data() {
        let response = ApiResponse::<serde_json::Value> {
            code: codes::SESSION_NOT_FOUND,
            message: "session not found".to_string(),
            data: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":40401"));
        assert!(json.contains("\"data\":null"));
    }
}
