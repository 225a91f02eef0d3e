use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No valid input provided: {message}")]
    InvalidInput { message: String },

    #[error("Failed to encode image {path}: {reason}")]
    Encode { path: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convert to string for the host UI
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_input(message: &str) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    pub fn encode(path: &str, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::FileNotFound {
            path: path.to_string(),
        }
    }

    /// Short machine-readable name of the error class, reported alongside
    /// the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "invalid_input",
            AppError::Encode { .. } => "encode",
            AppError::Storage(_) => "storage",
            AppError::Io(_) => "io",
            AppError::Image(_) => "image",
            AppError::Json(_) => "json",
            AppError::FileNotFound { .. } => "file_not_found",
            AppError::Validation { .. } => "validation",
            AppError::Config(_) => "config",
        }
    }
}
