use std::path::PathBuf;
use std::sync::Arc;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::image_processor::{FrameEncoder, ImageEncoder, SavedImage};
use crate::security::InputValidator;
use crate::storage::{Credentials, StorageConnector};

use super::request::{object_key, FramePolicy, UploadRequest, UploadResult};

/// Resolved upload source for one call.
enum Source {
    LocalFile { path: PathBuf, filename: String },
    Rendered(Vec<RenderedFrame>),
}

/// A rendered frame and where it lives on disk.
struct RenderedFrame {
    saved: SavedImage,
    path: PathBuf,
}

pub struct Uploader {
    connector: Arc<dyn StorageConnector>,
    encoder: Arc<dyn FrameEncoder>,
    frame_policy: FramePolicy,
}

impl Uploader {
    pub fn new(connector: Arc<dyn StorageConnector>, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self {
            connector,
            encoder,
            frame_policy: FramePolicy::default(),
        }
    }

    pub fn from_config(
        config: &UploaderConfig,
        connector: Arc<dyn StorageConnector>,
    ) -> AppResult<Self> {
        let encoder = ImageEncoder::from_config(config)?;
        let policy = if config.upload_all_frames {
            FramePolicy::AllFrames
        } else {
            FramePolicy::FirstOnly
        };
        Ok(Self::new(connector, Arc::new(encoder)).with_frame_policy(policy))
    }

    pub fn with_frame_policy(mut self, policy: FramePolicy) -> Self {
        self.frame_policy = policy;
        self
    }

    pub fn frame_policy(&self) -> FramePolicy {
        self.frame_policy
    }

    /// Upload the request's local file, or render its images and upload
    /// them according to the frame policy.
    pub async fn run(&self, request: &UploadRequest) -> AppResult<UploadResult> {
        let credentials = Credentials::from_path(&request.credentials_path);

        let local_file = request
            .local_file_path
            .as_deref()
            .and_then(InputValidator::resolve_local_file);

        if local_file.is_none() && !request.has_images() {
            return Err(AppError::invalid_input(
                "please supply either images or a local_file_path",
            ));
        }

        if request.bucket_name.trim().is_empty() {
            return Err(AppError::validation("bucket_name", "Bucket name cannot be empty"));
        }
        self.connector.validate_bucket(&request.bucket_name)?;

        let source = match local_file {
            Some(path) => {
                log::info!("Using provided local file path: {}", path.display());
                let filename = InputValidator::file_name_of(&path)?;
                Source::LocalFile { path, filename }
            }
            None => {
                log::info!("No valid file path provided; processing images input...");
                let frames = request.images.as_deref().unwrap_or_default();
                let saved = self.encoder.encode(frames, &request.file_name_prefix)?;
                let rendered = saved
                    .into_iter()
                    .map(|saved| RenderedFrame {
                        path: self.encoder.resolve(&saved),
                        saved,
                    })
                    .collect::<Vec<_>>();
                Source::Rendered(rendered)
            }
        };

        let backend = self.connector.connect(&credentials).await?;

        match source {
            Source::LocalFile { path, filename } => {
                let key = object_key(&request.bucket_folder_prefix, &filename);
                log::info!(
                    "Uploading file '{}' from '{}' to bucket '{}' as '{}' via {}",
                    filename,
                    path.display(),
                    request.bucket_name,
                    key,
                    backend.name()
                );
                backend.upload(&request.bucket_name, &key, &path).await?;
                log::info!("Upload complete.");
                Ok(UploadResult::File(filename))
            }
            Source::Rendered(rendered) => {
                let to_upload = match self.frame_policy {
                    FramePolicy::FirstOnly => &rendered[..rendered.len().min(1)],
                    FramePolicy::AllFrames => &rendered[..],
                };

                for frame in to_upload {
                    let key = object_key(&request.bucket_folder_prefix, &frame.saved.filename);
                    log::info!(
                        "Uploading file '{}' from '{}' to bucket '{}' as '{}' via {}",
                        frame.saved.filename,
                        frame.path.display(),
                        request.bucket_name,
                        key,
                        backend.name()
                    );
                    backend.upload(&request.bucket_name, &key, &frame.path).await?;
                }
                log::info!(
                    "Upload complete: {} of {} frame(s) uploaded",
                    to_upload.len(),
                    rendered.len()
                );

                Ok(UploadResult::Images(
                    rendered.into_iter().map(|frame| frame.saved).collect(),
                ))
            }
        }
    }
}
