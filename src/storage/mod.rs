//! Object storage seam.
//!
//! The uploader never talks to a cloud SDK directly. It asks a
//! [`StorageConnector`] for a [`StorageBackend`] built from the credentials of
//! the current call, then hands it one file at a time. Credentials therefore
//! never leak into process-wide state and concurrent calls with different
//! service accounts do not interfere.
//!
//! - [`GcsConnector`] - Google Cloud Storage through the official SDK
//! - [`LocalConnector`] - a directory tree standing in for buckets

mod error;
pub mod gcs;
pub mod local;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use error::StorageError;
pub use gcs::{GcsBackend, GcsConnector};
pub use local::{LocalBackend, LocalConnector};

/// Where a backend gets its identity from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Path to a service-account JSON key file.
    ServiceAccountFile(PathBuf),
    /// Whatever the environment provides (Application Default Credentials).
    ApplicationDefault,
}

impl Credentials {
    /// An empty path means "use the ambient default".
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            Credentials::ApplicationDefault
        } else {
            Credentials::ServiceAccountFile(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccountFile(path) => write!(f, "{}", path.display()),
            Credentials::ApplicationDefault => write!(f, "application default credentials"),
        }
    }
}

/// Upload capability of a connected backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload the whole file at `source` to `object_key` in `bucket`.
    async fn upload(&self, bucket: &str, object_key: &str, source: &Path)
        -> Result<(), StorageError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Builds a backend scoped to one set of credentials.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn StorageBackend>, StorageError>;

    /// Reject bucket names this backend can never address. Called before
    /// any file is written.
    fn validate_bucket(&self, _bucket: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_from_path() {
        assert_eq!(Credentials::from_path(""), Credentials::ApplicationDefault);
        assert_eq!(Credentials::from_path("  "), Credentials::ApplicationDefault);
        assert_eq!(
            Credentials::from_path("/c.json"),
            Credentials::ServiceAccountFile(PathBuf::from("/c.json"))
        );
    }
}
