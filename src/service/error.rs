use crate::service::validation::ValidationErrors;
use sea_orm::DbErr;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceErrorKind {
    BadRequest,
    UnsupportedMediaType,
    PayloadTooLarge,
    Validation,
    NotFound,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("The given data was invalid: {0}")]
    Validation(ValidationErrors),
    #[error("{0}")]
    NotFound(String),
    /// `context` is the user-facing summary, `message` the underlying cause.
    #[error("{context}: {message}")]
    Internal {
        context: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub(crate) fn product_not_found(id: impl Display) -> Self {
        Self::NotFound(format!("product with id={id} was not found"))
    }

    pub(crate) fn internal(context: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            context,
            message: message.into(),
        }
    }

    pub(crate) fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::BadRequest(_) => ServiceErrorKind::BadRequest,
            Self::UnsupportedMediaType(_) => ServiceErrorKind::UnsupportedMediaType,
            Self::PayloadTooLarge(_) => ServiceErrorKind::PayloadTooLarge,
            Self::Validation(_) => ServiceErrorKind::Validation,
            Self::NotFound(_) => ServiceErrorKind::NotFound,
            Self::Internal { .. } => ServiceErrorKind::Internal,
        }
    }
}

/// Maps a database failure during the operation described by `context`.
pub(crate) fn map_db_error(context: &'static str) -> impl Fn(DbErr) -> ServiceError {
    move |error| match error {
        DbErr::RecordNotFound(message) => ServiceError::NotFound(message),
        DbErr::Json(message) | DbErr::Type(message) => ServiceError::BadRequest(message),
        other => {
            let message = other.to_string();
            let lowered = message.to_ascii_lowercase();

            if lowered.contains("not null constraint failed")
                || lowered.contains("check constraint failed")
                || lowered.contains("datatype mismatch")
            {
                ServiceError::BadRequest(message)
            } else {
                ServiceError::internal(context, message)
            }
        }
    }
}

/// Maps a filesystem failure during the operation described by `context`.
pub(crate) fn map_io_error(context: &'static str) -> impl Fn(std::io::Error) -> ServiceError {
    move |error| ServiceError::internal(context, error.to_string())
}
