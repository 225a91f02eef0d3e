use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::errors::{AppError, AppResult};

fn bucket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-_\.]*[a-z0-9]$").expect("bucket name pattern is valid")
    })
}

fn unsafe_filename_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[<>:"\\|?*\x00-\x1f]"#).expect("filename pattern is valid")
    })
}

pub struct InputValidator;

impl InputValidator {
    /// Returns the path when it names an existing regular file. Empty or
    /// whitespace-only input counts as "not provided".
    pub fn resolve_local_file(path: &str) -> Option<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }

        let path_obj = Path::new(trimmed);
        if path_obj.is_file() {
            Some(path_obj.to_path_buf())
        } else {
            log::debug!("Local file path {} does not name an existing file", trimmed);
            None
        }
    }

    /// Bucket names follow the Cloud Storage naming rules.
    pub fn validate_bucket_name(name: &str) -> AppResult<()> {
        if name.is_empty() {
            return Err(AppError::validation("bucket_name", "Bucket name cannot be empty"));
        }

        if name.len() < 3 || name.len() > 222 {
            return Err(AppError::validation(
                "bucket_name",
                "Bucket name must be between 3 and 222 characters",
            ));
        }

        if name.split('.').any(|part| part.is_empty() || part.len() > 63) {
            return Err(AppError::validation(
                "bucket_name",
                "Each dot-separated component must be 1 to 63 characters",
            ));
        }

        if !name.contains('.') && name.len() > 63 {
            return Err(AppError::validation(
                "bucket_name",
                "Bucket names without dots are limited to 63 characters",
            ));
        }

        if !bucket_pattern().is_match(name) {
            return Err(AppError::validation(
                "bucket_name",
                "Bucket name may only contain lowercase letters, digits, '-', '_' and '.', and must start and end with a letter or digit",
            ));
        }

        Ok(())
    }

    pub fn sanitize_filename(filename: &str) -> String {
        let sanitized = unsafe_filename_chars().replace_all(filename.trim(), "_");

        // Leave room for the counter and extension
        if sanitized.len() > 200 {
            let mut end = 200;
            while !sanitized.is_char_boundary(end) {
                end -= 1;
            }
            sanitized[..end].to_string()
        } else {
            sanitized.to_string()
        }
    }

    pub fn file_name_of(path: &Path) -> AppResult<String> {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| AppError::validation("local_file_path", "Path has no file name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_local_file_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        fs::write(&path, b"data").unwrap();

        let resolved = InputValidator::resolve_local_file(&path.to_string_lossy());
        assert_eq!(resolved, Some(path));
    }

    #[test]
    fn test_resolve_local_file_rejects_missing_and_empty() {
        assert_eq!(InputValidator::resolve_local_file(""), None);
        assert_eq!(InputValidator::resolve_local_file("   "), None);
        assert_eq!(
            InputValidator::resolve_local_file("/definitely/not/here.mp4"),
            None
        );
    }

    #[test]
    fn test_resolve_local_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            InputValidator::resolve_local_file(&dir.path().to_string_lossy()),
            None
        );
    }

    #[test]
    fn test_bucket_names() {
        assert!(InputValidator::validate_bucket_name("my-bucket").is_ok());
        assert!(InputValidator::validate_bucket_name("renders.example.com").is_ok());
        assert!(InputValidator::validate_bucket_name("a_b").is_ok());

        assert!(InputValidator::validate_bucket_name("").is_err());
        assert!(InputValidator::validate_bucket_name("ab").is_err());
        assert!(InputValidator::validate_bucket_name("MyBucket").is_err());
        assert!(InputValidator::validate_bucket_name("-bucket").is_err());
        assert!(InputValidator::validate_bucket_name("bucket..name").is_err());
        assert!(InputValidator::validate_bucket_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_dotted_bucket_names_may_exceed_63() {
        let label = "a".repeat(63);
        let long = format!("{0}.{0}.{0}", label);
        assert_eq!(long.len(), 191);
        assert!(InputValidator::validate_bucket_name(&long).is_ok());

        let longest = format!("{0}.{0}.{0}.{1}", label, "a".repeat(30));
        assert_eq!(longest.len(), 222);
        assert!(InputValidator::validate_bucket_name(&longest).is_ok());
        assert!(InputValidator::validate_bucket_name(&format!("{}b", longest)).is_err());

        assert!(InputValidator::validate_bucket_name(&format!("{}.{}", "a".repeat(64), "b")).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(InputValidator::sanitize_filename(" shot "), "shot");
        assert_eq!(InputValidator::sanitize_filename("a<b>c?"), "a_b_c_");
        assert_eq!(InputValidator::sanitize_filename(&"x".repeat(300)).len(), 200);
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(
            InputValidator::file_name_of(Path::new("/tmp/video.mp4")).unwrap(),
            "video.mp4"
        );
        assert!(InputValidator::file_name_of(Path::new("/")).is_err());
    }
}
