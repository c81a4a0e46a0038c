//! The JSON envelope every API response is wrapped in.
//!
//! ```json
//! { "status": "success", "message": "Task Retrieved Successfully", "data": {..}, "errors": null }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Response body shared by successes and failures.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// `"success"` or `"error"`.
    pub status: &'static str,
    /// Human-readable outcome.
    pub message: String,
    /// Payload, `null` on errors and deletes.
    pub data: Option<T>,
    /// Field errors (object) or a detail string, `null` on success.
    pub errors: Option<Value>,
}

/// A successful response: status code plus enveloped payload.
#[derive(Debug)]
pub struct ApiResponse<T> {
    code: StatusCode,
    body: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200 OK` with `data`.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::OK, Some(data), message)
    }

    /// `201 Created` with `data`.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::CREATED, Some(data), message)
    }

    fn with_code(code: StatusCode, data: Option<T>, message: impl Into<String>) -> Self {
        Self {
            code,
            body: Envelope {
                status: "success",
                message: message.into(),
                data,
                errors: None,
            },
        }
    }
}

impl ApiResponse<()> {
    /// `200 OK` with `data: null`.
    pub fn empty(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::OK, None, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self.body)).into_response()
    }
}

/// Error envelope; used by [`crate::error::ApiError`].
pub(crate) fn error_body(message: impl Into<String>, errors: Option<Value>) -> Envelope<()> {
    Envelope {
        status: "error",
        message: message.into(),
        data: None,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let resp = ApiResponse::ok(json!({"id": "t1"}), "Task Retrieved Successfully");
        let value = serde_json::to_value(&resp.body).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "success",
                "message": "Task Retrieved Successfully",
                "data": {"id": "t1"},
                "errors": null,
            })
        );
    }

    #[test]
    fn created_uses_201() {
        let resp = ApiResponse::created(1, "Task Created Successfuly");
        assert_eq!(resp.code, StatusCode::CREATED);
    }

    #[test]
    fn empty_has_null_data() {
        let resp = ApiResponse::empty("Task Deleted Successfully");
        let value = serde_json::to_value(&resp.body).unwrap();
        assert!(value["data"].is_null());
        assert_eq!(resp.code, StatusCode::OK);
    }

    #[test]
    fn error_body_shape() {
        let value =
            serde_json::to_value(error_body("Validation failed", Some(json!({"title": ["x"]}))))
                .unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["errors"]["title"][0], "x");
        assert!(value["data"].is_null());
    }
}
