use serde::{Deserialize, Serialize};

use crate::image_processor::{ImageFrame, SavedImage};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_name_prefix: String,
    pub bucket_name: String,
    pub bucket_folder_prefix: String,
    pub credentials_path: String,
    #[serde(default)]
    pub local_file_path: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<ImageFrame>>,
}

impl UploadRequest {
    pub fn has_images(&self) -> bool {
        self.images.as_ref().is_some_and(|frames| !frames.is_empty())
    }
}

/// What was uploaded: the rendered batch, or the base name of a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadResult {
    Images(Vec<SavedImage>),
    File(String),
}

/// Host-facing wrapper, `{"ui": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPayload {
    pub ui: UploadResult,
}

impl From<UploadResult> for UiPayload {
    fn from(result: UploadResult) -> Self {
        Self { ui: result }
    }
}

/// Which rendered frames get uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramePolicy {
    /// Only the first frame of the batch; the rest stay on disk.
    #[default]
    FirstOnly,
    AllFrames,
}

/// `"{prefix}/{filename}"`, verbatim. No slash normalisation: a prefix with a
/// trailing slash yields `//`, an empty prefix a key starting with `/`.
pub fn object_key(bucket_folder_prefix: &str, filename: &str) -> String {
    format!("{}/{}", bucket_folder_prefix, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::FolderType;

    #[test]
    fn test_object_key_is_verbatim() {
        assert_eq!(object_key("out", "shot_00001.png"), "out/shot_00001.png");
        assert_eq!(object_key("out/", "shot_00001.png"), "out//shot_00001.png");
        assert_eq!(object_key("", "video.mp4"), "/video.mp4");
        assert_eq!(object_key("/clips", "video.mp4"), "/clips/video.mp4");
    }

    #[test]
    fn test_result_serialization() {
        let file = UiPayload::from(UploadResult::File("video.mp4".to_string()));
        assert_eq!(
            serde_json::to_value(&file).unwrap(),
            serde_json::json!({"ui": {"file": "video.mp4"}})
        );

        let images = UploadResult::Images(vec![SavedImage {
            filename: "shot_00001.png".to_string(),
            subfolder: String::new(),
            folder_type: FolderType::Output,
        }]);
        assert_eq!(
            serde_json::to_value(&images).unwrap(),
            serde_json::json!({"images": [{"filename": "shot_00001.png", "subfolder": "", "type": "output"}]})
        );
    }

    #[test]
    fn test_has_images() {
        let mut request = UploadRequest::default();
        assert!(!request.has_images());
        request.images = Some(vec![]);
        assert!(!request.has_images());
        request.images = Some(vec![ImageFrame::filled(1, 1, 0.0).unwrap()]);
        assert!(request.has_images());
    }
}
