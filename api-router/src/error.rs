use axum::{
    extract::rejection::QueryRejection,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use axum_typed_multipart::TypedMultipartError;
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("{0}")]
    ProcessingError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// Puts an extractor rejection into the JSON error shape, keeping 413 for oversized bodies.
    fn rejected(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(message)
        } else if status.is_client_error() {
            Self::ValidationError(message)
        } else {
            tracing::error!(%status, error = %message, "Request extraction failed");
            Self::InternalError("Internal server error".to_string())
        }
    }
}

impl From<TypedMultipartError> for ApiError {
    fn from(err: TypedMultipartError) -> Self {
        Self::rejected(err.get_status(), err.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        Self::rejected(err.status(), err.body_text())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::FileProcessing { .. } | AppError::Query(_) | AppError::Index(_) => {
                tracing::error!(error = %err, "Request failed");
                Self::ProcessingError(err.to_string())
            }
            _ => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InternalError(message) | Self::ProcessingError(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
            Self::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let api_error = ApiError::from(AppError::Validation("no files were selected".into()));
        assert!(
            matches!(api_error, ApiError::ValidationError(ref msg) if msg == "no files were selected")
        );
        assert_status_code(api_error, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn processing_errors_carry_the_cause() {
        let api_error = ApiError::from(AppError::file_processing("a.txt", "disk full"));
        assert_eq!(
            api_error.to_string(),
            "failed to process file `a.txt`: disk full"
        );
        assert_status_code(api_error, StatusCode::INTERNAL_SERVER_ERROR);

        let api_error = ApiError::from(AppError::Query("backend unavailable".into()));
        assert_eq!(
            api_error.to_string(),
            "failed to process query: backend unavailable"
        );

        let api_error = ApiError::from(AppError::Index("snapshot write failed".into()));
        assert!(matches!(api_error, ApiError::ProcessingError(_)));
    }

    #[test]
    fn internal_errors_are_sanitized() {
        let api_error = ApiError::from(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "secret path /var/lib/data",
        )));
        assert!(matches!(api_error, ApiError::InternalError(ref msg) if msg == "Internal server error"));
        assert_eq!(api_error.to_string(), "Internal server error");
        assert_status_code(api_error, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_status_code(ApiError::NotFound("/missing".into()), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejections_keep_client_statuses() {
        assert_status_code(
            ApiError::rejected(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded".into()),
            StatusCode::PAYLOAD_TOO_LARGE,
        );
        assert!(matches!(
            ApiError::rejected(StatusCode::UNSUPPORTED_MEDIA_TYPE, "not multipart".into()),
            ApiError::ValidationError(_)
        ));
        assert!(matches!(
            ApiError::rejected(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            ApiError::InternalError(ref msg) if msg == "Internal server error"
        ));
    }
}
