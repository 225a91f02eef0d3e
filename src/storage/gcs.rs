//! Google Cloud Storage backend.

use std::path::Path;

use async_trait::async_trait;
use google_cloud_auth::credentials::service_account;
use google_cloud_storage::client::Storage;

use crate::security::InputValidator;

use super::{Credentials, StorageBackend, StorageConnector, StorageError};

/// Connects to Cloud Storage with the credentials of each call.
#[derive(Debug, Default, Clone)]
pub struct GcsConnector;

impl GcsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageConnector for GcsConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn StorageBackend>, StorageError> {
        log::info!("Creating Cloud Storage client using {}", credentials);

        let builder = match credentials {
            Credentials::ServiceAccountFile(path) => {
                let key = read_service_account_key(path).await?;
                let creds = service_account::Builder::new(key).build().map_err(|e| {
                    StorageError::Credentials {
                        source_name: path.display().to_string(),
                        message: e.to_string(),
                    }
                })?;
                Storage::builder().with_credentials(creds)
            }
            Credentials::ApplicationDefault => Storage::builder(),
        };

        let client = builder.build().await.map_err(|e| StorageError::Connect {
            message: e.to_string(),
        })?;

        Ok(Box::new(GcsBackend { client }))
    }

    fn validate_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        InputValidator::validate_bucket_name(bucket).map_err(|e| StorageError::InvalidBucket {
            bucket: bucket.to_string(),
            message: e.to_string(),
        })
    }
}

/// Reads a service-account key file. The key itself is validated by the
/// auth library; only its shape is checked here so a wrong file is reported
/// before any network traffic.
pub async fn read_service_account_key(path: &Path) -> Result<serde_json::Value, StorageError> {
    let source_name = path.display().to_string();

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::io(source_name.clone(), &e))?;

    let key: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| StorageError::Credentials {
            source_name: source_name.clone(),
            message: format!("not valid JSON: {}", e),
        })?;

    match key.get("type").and_then(|t| t.as_str()) {
        Some("service_account") => Ok(key),
        Some(other) => Err(StorageError::Credentials {
            source_name,
            message: format!("expected a service_account key, found '{}'", other),
        }),
        None => Err(StorageError::Credentials {
            source_name,
            message: "missing 'type' field".to_string(),
        }),
    }
}

pub struct GcsBackend {
    client: Storage,
}

#[async_trait]
impl StorageBackend for GcsBackend {
    async fn upload(
        &self,
        bucket: &str,
        object_key: &str,
        source: &Path,
    ) -> Result<(), StorageError> {
        let payload = tokio::fs::File::open(source)
            .await
            .map_err(|e| StorageError::io(source.display().to_string(), &e))?;

        let object = self
            .client
            .write_object(format!("projects/_/buckets/{bucket}"), object_key, payload)
            .send_unbuffered()
            .await
            .map_err(|e| StorageError::upload(bucket, object_key, e))?;

        log::debug!("Cloud Storage accepted object {}", object.name);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gcs"
    }
}
