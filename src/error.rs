use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use compute::error::ComputeError;
use compute::import::ImportError;
use compute::receipt::ReceiptError;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::schemas::ErrorResponse;

/// Errors a handler can answer with. Each one maps to a status code and a
/// stable machine-readable `code` in the [`ErrorResponse`] body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    ExtractionFailed(String),

    #[error("{0}")]
    NoTextFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict { .. } | ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ExtractionFailed(_) | ApiError::NoTextFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unauthorized(_) => "AUTH_ERROR",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict { code, .. } => *code,
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            ApiError::NoTextFound(_) => "NO_TEXT_FOUND",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn not_found(what: &str, id: i32) -> Self {
        ApiError::NotFound(format!("{what} with ID {id} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            ApiError::Internal(e) => {
                error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(e) => ApiError::Database(e),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::NoPreview => {
                ApiError::InvalidState("No import preview found. Upload a statement first.".to_string())
            }
            ImportError::InvalidSelection { .. } => ApiError::Validation(err.to_string()),
            ImportError::Pdf(_) | ImportError::ExtractionFailed { .. } => ApiError::ExtractionFailed(err.to_string()),
            ImportError::Database(e) => ApiError::Database(e),
        }
    }
}

impl From<ReceiptError> for ApiError {
    fn from(err: ReceiptError) -> Self {
        match err {
            ReceiptError::NoText => ApiError::NoTextFound(
                "No text could be extracted from the receipt. Try a clearer image.".to_string(),
            ),
            ReceiptError::OcrUnavailable(_) => ApiError::Upstream(err.to_string()),
            ReceiptError::InvalidImage(_) => ApiError::Validation(err.to_string()),
            ReceiptError::OcrFailed(_) | ReceiptError::Pdf(_) => ApiError::ExtractionFailed(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
