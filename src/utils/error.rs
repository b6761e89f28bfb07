//! Error types and handling
//!
//! Common error types used across the application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Detection error: {0}")]
    Detection(#[from] crate::capture::EnumerateError),

    #[error("Recording error: {0}")]
    Recording(#[from] crate::recorder::RecordingError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] crate::transcode::TranscodeError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Error response for the presentation layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Detection(_) => "DETECTION_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Transcode(_) => "TRANSCODE_ERROR",
            AppError::Store(_) => "STORE_ERROR",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
