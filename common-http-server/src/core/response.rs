use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field name to the messages explaining why that field was rejected.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 统一的 API 响应格式
///
/// Serialises as `{message, data}` on success, `{message, error}` on failure
/// and `{message, errors}` when individual fields were rejected. Extra
/// top-level keys can be attached with [`ApiResponse::with_extra`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub status_code: Option<u16>,
}

impl<T> ApiResponse<T> {
    fn empty(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            data: None,
            error: None,
            errors: None,
            extra: Map::new(),
            status_code: Some(status.as_u16()),
        }
    }

    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self::success_with_status(message, data, StatusCode::OK)
    }

    pub fn success_with_status(message: impl Into<String>, data: T, status: StatusCode) -> Self {
        let mut response = Self::empty(message, status);
        response.data = Some(data);
        response
    }

    /// A success body that only carries a message, e.g. after a delete.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self::empty(message, StatusCode::OK)
    }

    pub fn error_with_status(
        message: impl Into<String>,
        error: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        let mut response = Self::empty(message, status);
        response.error = Some(error.into());
        response
    }

    /// 422 response listing the rejected fields.
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        let mut response = Self::empty(message, StatusCode::UNPROCESSABLE_ENTITY);
        response.errors = Some(errors);
        response
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        let fallback = if self.error.is_some() || self.errors.is_some() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };

        self.status_code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(fallback)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Service is running".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> axum::response::Response {
        let status = if self.status == "ok" {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        (status, Json(self)).into_response()
    }
}
