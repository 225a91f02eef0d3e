//! Directory-backed storage: `<root>/<bucket>/<object key>`.
//!
//! Used for dry runs and tests. Empty key segments (from `a//b` or a leading
//! slash) have no filesystem counterpart and are skipped when mapping the key
//! to a path; `..` segments are rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{Credentials, StorageBackend, StorageConnector, StorageError};

#[derive(Debug, Clone)]
pub struct LocalConnector {
    root: PathBuf,
    create_buckets: bool,
}

impl LocalConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_buckets: false,
        }
    }

    /// Create missing bucket directories instead of failing.
    pub fn create_buckets(mut self, create: bool) -> Self {
        self.create_buckets = create;
        self
    }
}

#[async_trait]
impl StorageConnector for LocalConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn StorageBackend>, StorageError> {
        log::debug!(
            "Local storage at {} ignores credentials ({})",
            self.root.display(),
            credentials
        );
        Ok(Box::new(LocalBackend {
            root: self.root.clone(),
            create_buckets: self.create_buckets,
        }))
    }
}

pub struct LocalBackend {
    root: PathBuf,
    create_buckets: bool,
}

impl LocalBackend {
    /// Filesystem location of `object_key` inside `bucket`.
    pub fn object_path(&self, bucket: &str, object_key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.bucket_path(bucket)?;
        let mut segments = 0;

        for segment in object_key.split('/').filter(|s| !s.is_empty()) {
            match Path::new(segment).components().next() {
                Some(Component::Normal(_)) => {
                    path.push(segment);
                    segments += 1;
                }
                _ => {
                    return Err(StorageError::upload(
                        bucket,
                        object_key,
                        format!("unsupported key segment '{}'", segment),
                    ))
                }
            }
        }

        if segments == 0 {
            return Err(StorageError::upload(bucket, object_key, "empty object key"));
        }
        Ok(path)
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || bucket.contains('/') || bucket.contains('\\') || bucket == ".." {
            return Err(StorageError::BucketNotFound {
                bucket: bucket.to_string(),
            });
        }
        Ok(self.root.join(bucket))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn upload(
        &self,
        bucket: &str,
        object_key: &str,
        source: &Path,
    ) -> Result<(), StorageError> {
        let bucket_dir = self.bucket_path(bucket)?;
        if !bucket_dir.is_dir() {
            if self.create_buckets {
                tokio::fs::create_dir_all(&bucket_dir)
                    .await
                    .map_err(|e| StorageError::io(bucket_dir.display().to_string(), &e))?;
            } else {
                return Err(StorageError::BucketNotFound {
                    bucket: bucket.to_string(),
                });
            }
        }

        let target = self.object_path(bucket, object_key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent.display().to_string(), &e))?;
        }

        // Copy under a random name first so a failed copy never leaves a
        // truncated object behind
        let temp = target.with_file_name(format!(".{}.part", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::copy(source, &temp).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(source.display().to_string(), &e));
        }
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|e| StorageError::io(target.display().to_string(), &e))?;

        log::debug!("Stored {} at {}", object_key, target.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
