// Uploader module - resolves what to upload and hands it to a storage backend
//
// A call either forwards an existing local file or renders an image batch to
// PNG first, then uploads under "{bucket_folder_prefix}/{filename}"

pub mod request;
pub mod run;

pub use request::{object_key, FramePolicy, UiPayload, UploadRequest, UploadResult};
pub use run::Uploader;
