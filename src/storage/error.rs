//! Error types for storage operations.

use thiserror::Error;

/// Errors raised while connecting to or writing into a bucket.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Service credential could not be read or was rejected.
    #[error("Invalid credentials from {source_name}: {message}")]
    Credentials {
        source_name: String,
        message: String,
    },

    /// Client could not be constructed.
    #[error("Failed to create storage client: {message}")]
    Connect { message: String },

    /// Target bucket does not exist.
    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    /// Bucket name the backend cannot address.
    #[error("Invalid bucket name {bucket}: {message}")]
    InvalidBucket { bucket: String, message: String },

    /// The backend refused or failed the write.
    #[error("Upload to gs://{bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },
}

impl StorageError {
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn upload(bucket: &str, key: &str, message: impl ToString) -> Self {
        StorageError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}
