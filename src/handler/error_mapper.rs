use crate::service::error::{ServiceError, ServiceErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common_http_server::ApiResponse;
use serde_json::Value;
use tracing::{error, warn};

fn status_code_for(kind: ServiceErrorKind) -> StatusCode {
    match kind {
        ServiceErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ServiceErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ServiceErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ServiceErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceErrorKind::NotFound => StatusCode::NOT_FOUND,
        ServiceErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_code_for(self.kind());
        let response = match self {
            Self::Validation(errors) => {
                warn!(%errors, "request rejected by validation");
                ApiResponse::<Value>::validation("The given data was invalid.", errors.into_inner())
            }
            Self::NotFound(detail) => {
                ApiResponse::error_with_status("Product not found", detail, status)
            }
            Self::Internal { context, message } => {
                error!(context, error = %message, "request failed");
                ApiResponse::error_with_status(context, message, status)
            }
            Self::BadRequest(detail) => {
                warn!(error = %detail, "bad request");
                ApiResponse::error_with_status("Bad Request", detail, status)
            }
            Self::UnsupportedMediaType(detail) => {
                ApiResponse::error_with_status("Unsupported Media Type", detail, status)
            }
            Self::PayloadTooLarge(detail) => {
                warn!(error = %detail, "request body too large");
                ApiResponse::error_with_status("Payload Too Large", detail, status)
            }
        };

        response.into_response()
    }
}
