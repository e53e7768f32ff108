//! API error type with HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::csv_parser::{ParseError, RowError};
use ticketstream_core::BulkErrorCode;
use ticketstream_events::EventError;

/// Failures surfaced by the submission and query surfaces.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The submission failed parsing or validation.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Handing the batch to the durable log failed.
    #[error(transparent)]
    Producer(#[from] EventError),

    /// No tracked batch under this id.
    #[error("Batch not found: {batch_id}")]
    BatchNotFound { batch_id: String },

    /// The endpoint exists but its policy is not defined yet.
    #[error("{feature} is not implemented")]
    NotImplemented { feature: &'static str },

    /// The multipart body was unusable.
    #[error("Invalid upload request: {reason}")]
    BadRequest { reason: String },
}

impl ApiError {
    /// Taxonomy code for the response body.
    #[must_use]
    pub fn error_code(&self) -> BulkErrorCode {
        match self {
            Self::Parse(e) => match e {
                ParseError::EmptyFile => BulkErrorCode::EmptyFile,
                ParseError::InvalidFileType { .. }
                | ParseError::MissingHeader { .. }
                | ParseError::TooManyRowErrors { .. } => BulkErrorCode::InvalidFileFormat,
                ParseError::FileTooLarge { .. } => BulkErrorCode::InvalidFileFormat,
                ParseError::MissingRequiredColumns { .. } => BulkErrorCode::MissingRequiredColumns,
                ParseError::BatchSizeExceeded { .. } => BulkErrorCode::BatchSizeExceeded,
            },
            Self::Producer(e) => e.error_code(),
            Self::BatchNotFound { .. } => BulkErrorCode::UnknownError,
            Self::NotImplemented { .. } => BulkErrorCode::ConfigurationError,
            Self::BadRequest { .. } => BulkErrorCode::InvalidRowData,
        }
    }

    /// Whether the client may usefully retry the same request.
    #[must_use]
    pub fn retryable(&self) -> bool {
        self.error_code().is_retryable()
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Parse(ParseError::FileTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Parse(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::BatchNotFound { .. } => StatusCode::NOT_FOUND,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Producer(_) => {
                StatusCode::from_u16(self.error_code().http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn row_errors(&self) -> Vec<RowError> {
        match self {
            Self::Parse(ParseError::TooManyRowErrors { row_errors, .. }) => row_errors.clone(),
            _ => Vec::new(),
        }
    }
}

/// JSON error body shared by every failing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: String,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    row_errors: Vec<RowError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.error_code().code().to_string(),
            message: self.to_string(),
            retryable: self.retryable(),
            row_errors: self.row_errors(),
        };
        (status, Json(body)).into_response()
    }
}
