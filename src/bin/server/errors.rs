//! API error taxonomy: error codes, HTTP status mapping and JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Application error codes carried in response bodies.
pub mod codes {
    /// Successful request.
    pub const SUCCESS: i32 = 0;
    /// A parameter is out of range or has the wrong type.
    pub const INVALID_PARAMETER: i32 = 2001;
    /// Unclassified internal failure.
    pub const INTERNAL_ERROR: i32 = 2002;
    /// A required parameter is missing.
    pub const MISSING_PARAMETER: i32 = 2003;
    /// The input payload could not be decoded or fetched.
    pub const DECODE_FAILED: i32 = 2004;
    /// Missing or malformed authorization.
    pub const UNAUTHORIZED: i32 = 401;
    /// The scheduler refused admission.
    pub const QUEUE_FULL: i32 = 503;
    /// The task did not finish before the request deadline, or failed in a
    /// pipeline stage.
    pub const PROCESSING_FAILED: i32 = 500;
}

/// PDF processing error codes.
pub mod pdf_codes {
    /// Invalid PDF configuration parameters.
    pub const CONFIG_ERROR: i32 = 1001;
    /// PDF file cannot be opened.
    pub const FILE_ERROR: i32 = 1002;
    /// Invalid PDF format or corrupted file.
    pub const FORMAT_ERROR: i32 = 1003;
    /// PDF is password protected.
    pub const PASSWORD_REQUIRED: i32 = 1004;
    /// PDF security policy not supported.
    pub const SECURITY_ERROR: i32 = 1005;
    /// PDF page not found.
    pub const PAGE_ERROR: i32 = 1006;
    /// PDF page size exceeds the pixel limit.
    pub const PAGE_SIZE_ERROR: i32 = 1007;
    /// PDF page count exceeds the limit.
    pub const PAGE_LIMIT_EXCEEDED: i32 = 1008;
    /// Requested DPI exceeds the limit.
    pub const DPI_LIMIT_EXCEEDED: i32 = 1009;
}

/// HTTP status for a PDF error code.
pub fn pdf_http_status(code: i32) -> StatusCode {
    match code {
        pdf_codes::PASSWORD_REQUIRED => StatusCode::UNAUTHORIZED,
        pdf_codes::SECURITY_ERROR => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Error body shared by every non-success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Application error code.
    pub error_code: i32,
    /// Human-readable message.
    pub error_msg: String,
}

/// Errors surfaced by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A parameter failed range or type validation.
    #[error("{0}")]
    InvalidParameter(String),

    /// A required parameter is absent.
    #[error("{0}")]
    MissingParameter(String),

    /// Authorization header missing or malformed.
    #[error("{0}")]
    Unauthorized(String),

    /// The input could not be fetched or decoded.
    #[error("{0}")]
    DecodeFailed(String),

    /// PDF processing failed with one of the PDF error codes.
    #[error("{message}")]
    Pdf {
        /// One of [`pdf_codes`].
        code: i32,
        /// Failure description.
        message: String,
    },

    /// The scheduler intake is at capacity.
    #[error("Pipeline queue is full")]
    QueueFull,

    /// The task did not produce a result before the request deadline.
    #[error("Failed to get OCR results or timeout")]
    Timeout,

    /// The task failed inside a pipeline stage.
    #[error("OCR processing failed in {stage}: {message}")]
    TaskFailed {
        /// The failing stage.
        stage: String,
        /// Failure description.
        message: String,
    },

    /// Unclassified internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Application error code for the body.
    pub fn error_code(&self) -> i32 {
        match self {
            ApiError::InvalidParameter(_) => codes::INVALID_PARAMETER,
            ApiError::MissingParameter(_) => codes::MISSING_PARAMETER,
            ApiError::Unauthorized(_) => codes::UNAUTHORIZED,
            ApiError::DecodeFailed(_) => codes::DECODE_FAILED,
            ApiError::Pdf { code, .. } => *code,
            ApiError::QueueFull => codes::QUEUE_FULL,
            ApiError::Timeout => codes::PROCESSING_FAILED,
            ApiError::TaskFailed { .. } => codes::PROCESSING_FAILED,
            ApiError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// HTTP status for the response.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_)
            | ApiError::MissingParameter(_)
            | ApiError::DecodeFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Pdf { code, .. } => pdf_http_status(*code),
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::TaskFailed { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error_code: self.error_code(),
            error_msg: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
