//! Upload a rendered image batch, or an existing local file, to a Cloud
//! Storage bucket.
//!
//! [`uploader::Uploader`] is the entry point for library use;
//! [`node::NodeRegistry`] exposes the same operation as a pipeline node.

pub mod config;
pub mod errors;
pub mod image_processor;
pub mod node;
pub mod save_path;
pub mod security;
pub mod storage;
pub mod uploader;

pub use errors::{AppError, AppResult};
pub use image_processor::{ImageEncoder, ImageFrame, SavedImage};
pub use uploader::{UiPayload, UploadRequest, UploadResult, Uploader};
