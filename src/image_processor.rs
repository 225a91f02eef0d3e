use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder as _};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::save_path;

/// One RGB raster of a batch, row-major, three samples per pixel, samples
/// nominally in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> AppResult<Self> {
        let frame = Self {
            width,
            height,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Frame with every sample set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> AppResult<Self> {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(width, height, vec![value; len])
    }

    pub fn from_dynamic_image(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb32f();
        Self {
            width: rgb.width(),
            height: rgb.height(),
            data: rgb.into_raw(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AppError::validation("images", "Frame dimensions must be non-zero"));
        }

        let expected = (self.width as usize) * (self.height as usize) * 3;
        if self.data.len() != expected {
            return Err(AppError::validation(
                "images",
                &format!(
                    "Frame {}x{} needs {} samples, got {}",
                    self.width,
                    self.height,
                    expected,
                    self.data.len()
                ),
            ));
        }

        Ok(())
    }

    /// Scale to 8-bit: `v * 255`, clipped to `[0, 255]`, truncated. NaN maps to 0.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8)
            .collect()
    }
}

/// Decode an image file into a frame.
pub fn load_frame(file_path: &Path) -> AppResult<ImageFrame> {
    if !file_path.exists() {
        return Err(AppError::file_not_found(&file_path.to_string_lossy()));
    }

    let img = image::open(file_path)?;
    log::debug!(
        "Loaded frame {} ({}x{})",
        file_path.display(),
        img.width(),
        img.height()
    );
    Ok(ImageFrame::from_dynamic_image(&img))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    Output,
}

/// Location of a saved frame, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedImage {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub folder_type: FolderType,
}

/// Turns a batch of frames into files on disk.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frames: &[ImageFrame], file_name_prefix: &str) -> AppResult<Vec<SavedImage>>;

    /// Absolute path of a descriptor returned by [`FrameEncoder::encode`].
    fn resolve(&self, saved: &SavedImage) -> PathBuf;
}

/// PNG writer for rendered frames.
#[derive(Debug, Clone)]
pub struct ImageEncoder {
    output_dir: PathBuf,
    compress_level: u8,
}

impl ImageEncoder {
    pub fn new(output_dir: impl Into<PathBuf>, compress_level: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            compress_level,
        }
    }

    pub fn from_config(config: &UploaderConfig) -> AppResult<Self> {
        Ok(Self::new(
            config.resolve_output_directory()?,
            config.compress_level,
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl FrameEncoder for ImageEncoder {
    fn encode(&self, frames: &[ImageFrame], file_name_prefix: &str) -> AppResult<Vec<SavedImage>> {
        save_images(frames, &self.output_dir, file_name_prefix, self.compress_level)
    }

    fn resolve(&self, saved: &SavedImage) -> PathBuf {
        if saved.subfolder.is_empty() {
            self.output_dir.join(&saved.filename)
        } else {
            self.output_dir.join(&saved.subfolder).join(&saved.filename)
        }
    }
}

/// 0-3 fast, 4-6 default, 7-9 best.
pub fn compression_for_level(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// How many taken names a frame skips over before giving up.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Encode every frame as a PNG under `output_dir`. Either all frames are
/// written or none: on failure the files written so far are removed.
pub fn save_images(
    frames: &[ImageFrame],
    output_dir: &Path,
    file_name_prefix: &str,
    compress_level: u8,
) -> AppResult<Vec<SavedImage>> {
    let compression = compression_for_level(compress_level);
    save_images_with(frames, output_dir, file_name_prefix, |frame, writer| {
        PngEncoder::new_with_quality(writer, compression, FilterType::Adaptive).write_image(
            &frame.to_rgb8(),
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
    })
}

/// Batch writer behind [`save_images`]; `write_frame` serializes one frame
/// into its freshly created file.
fn save_images_with<F>(
    frames: &[ImageFrame],
    output_dir: &Path,
    file_name_prefix: &str,
    mut write_frame: F,
) -> AppResult<Vec<SavedImage>>
where
    F: FnMut(&ImageFrame, &mut BufWriter<fs::File>) -> Result<(), image::ImageError>,
{
    let first = frames
        .first()
        .ok_or_else(|| AppError::invalid_input("image batch is empty"))?;

    for (batch_number, frame) in frames.iter().enumerate() {
        frame
            .validate()
            .map_err(|e| AppError::encode(&format!("frame {}", batch_number), e))?;
    }

    let save_path = save_path::allocate(output_dir, file_name_prefix, first.width, first.height)
        .map_err(|e| match e {
            AppError::Io(err) => AppError::encode(&output_dir.to_string_lossy(), err),
            other => other,
        })?;

    let mut counter = save_path.counter;
    let mut written: Vec<PathBuf> = Vec::with_capacity(frames.len());
    let mut results = Vec::with_capacity(frames.len());

    for (batch_number, frame) in frames.iter().enumerate() {
        let claimed = claim_file(&save_path, &mut counter);
        let (file, full_path, handle) = match claimed {
            Ok(claimed) => claimed,
            Err(e) => {
                remove_partial(&written);
                return Err(e);
            }
        };
        written.push(full_path.clone());

        let mut writer = BufWriter::new(handle);
        let result = write_frame(frame, &mut writer)
            .map_err(|e| AppError::encode(&full_path.to_string_lossy(), e))
            .and_then(|_| {
                writer
                    .flush()
                    .map_err(|e| AppError::encode(&full_path.to_string_lossy(), e))
            });

        if let Err(e) = result {
            log::error!("Failed to write {}: {}", full_path.display(), e);
            drop(writer);
            remove_partial(&written);
            return Err(e);
        }

        log::debug!("Saved frame {} to {}", batch_number, full_path.display());
        results.push(SavedImage {
            filename: file,
            subfolder: save_path.subfolder.clone(),
            folder_type: FolderType::Output,
        });
    }

    log::info!(
        "Saved {} frame(s) to {}",
        results.len(),
        save_path.full_output_folder.display()
    );
    Ok(results)
}

/// Atomically creates the next free `{filename}_NNNNN.png`. Names taken since
/// the directory scan (e.g. by a concurrent batch) are skipped.
fn claim_file(
    save_path: &save_path::SavePath,
    counter: &mut u32,
) -> AppResult<(String, PathBuf, fs::File)> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let file = save_path.file_name_with_counter(*counter);
        let full_path = save_path.full_output_folder.join(&file);
        *counter = counter.saturating_add(1);

        match OpenOptions::new().write(true).create_new(true).open(&full_path) {
            Ok(handle) => return Ok((file, full_path, handle)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                log::debug!("{} already taken, trying the next counter", full_path.display());
            }
            Err(e) => return Err(AppError::encode(&full_path.to_string_lossy(), e)),
        }
    }

    Err(AppError::encode(
        &save_path.full_output_folder.to_string_lossy(),
        format!("no free file name for prefix '{}'", save_path.filename),
    ))
}

fn remove_partial(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(path: &Path) -> image::RgbImage {
        image::open(path).unwrap().to_rgb8()
    }

    #[test]
    fn test_frame_validation() {
        assert!(ImageFrame::new(2, 2, vec![0.0; 12]).is_ok());
        assert!(ImageFrame::new(2, 2, vec![0.0; 11]).is_err());
        assert!(ImageFrame::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_to_rgb8_scales_and_clips() {
        let frame = ImageFrame::new(1, 2, vec![0.0, 0.5, 1.0, -0.3, 1.7, f32::NAN]).unwrap();
        assert_eq!(frame.to_rgb8(), vec![0, 127, 255, 0, 255, 0]);
    }

    #[test]
    fn test_all_zero_frame_decodes_to_black() {
        let dir = tempfile::tempdir().unwrap();
        let frame = ImageFrame::filled(2, 2, 0.0).unwrap();

        let saved = save_images(&[frame], dir.path(), "zero", 4).unwrap();
        let img = decode(&dir.path().join(&saved[0].filename));

        assert_eq!(img.dimensions(), (2, 2));
        for pixel in img.pixels() {
            assert_eq!(pixel.0, [0, 0, 0]);
        }
    }

    #[test]
    fn test_all_one_frame_decodes_to_white() {
        let dir = tempfile::tempdir().unwrap();
        let frame = ImageFrame::filled(2, 2, 1.0).unwrap();

        let saved = save_images(&[frame], dir.path(), "one", 9).unwrap();
        let img = decode(&dir.path().join(&saved[0].filename));

        for pixel in img.pixels() {
            assert_eq!(pixel.0, [255, 255, 255]);
        }
    }

    #[test]
    fn test_batch_gets_sequential_names() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            ImageFrame::filled(2, 2, 0.2).unwrap(),
            ImageFrame::filled(2, 2, 0.8).unwrap(),
        ];

        let saved = save_images(&frames, dir.path(), "shot", 4).unwrap();
        let names: Vec<_> = saved.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["shot_00001.png", "shot_00002.png"]);
        assert!(saved
            .iter()
            .all(|s| s.subfolder.is_empty() && s.folder_type == FolderType::Output));

        // A second batch continues the numbering
        let more = save_images(&frames[..1], dir.path(), "shot", 4).unwrap();
        assert_eq!(more[0].filename, "shot_00003.png");
    }

    #[test]
    fn test_empty_batch_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_images(&[], dir.path(), "shot", 4).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_frame_fails_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            ImageFrame::filled(2, 2, 0.5).unwrap(),
            ImageFrame {
                width: 2,
                height: 2,
                data: vec![0.0; 3],
            },
        ];

        let err = save_images(&frames, dir.path(), "shot", 4).unwrap_err();
        assert!(matches!(err, AppError::Encode { .. }));
        assert_eq!(err.kind(), "encode");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unusable_output_dir_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("output");
        fs::write(&not_a_dir, b"").unwrap();

        let err = save_images(
            &[ImageFrame::filled(1, 1, 0.0).unwrap()],
            &not_a_dir,
            "shot",
            4,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "encode");
    }

    #[test]
    fn test_write_failure_mid_batch_removes_written_frames() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            ImageFrame::filled(2, 2, 0.5).unwrap(),
            ImageFrame::filled(2, 2, 0.5).unwrap(),
            ImageFrame::filled(2, 2, 0.5).unwrap(),
        ];

        let mut calls = 0;
        let err = save_images_with(&frames, dir.path(), "shot", |frame, writer| {
            calls += 1;
            if calls == 2 {
                return Err(image::ImageError::IoError(std::io::Error::new(
                    ErrorKind::Other,
                    "disk full",
                )));
            }
            PngEncoder::new(writer).write_image(
                &frame.to_rgb8(),
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            )
        })
        .unwrap_err();

        assert!(matches!(err, AppError::Encode { .. }));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(calls, 2);
        assert!(!dir.path().join("shot_00001.png").exists());
        assert!(!dir.path().join("shot_00002.png").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_taken_name_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        // Taken after the scan picked counter 1, as a concurrent batch would
        fs::write(dir.path().join("shot_00001.png"), b"other batch").unwrap();

        let save_path = save_path::SavePath {
            full_output_folder: dir.path().to_path_buf(),
            filename: "shot".to_string(),
            counter: 1,
            subfolder: String::new(),
        };
        let mut counter = 1;
        let (file, full_path, _handle) = claim_file(&save_path, &mut counter).unwrap();
        assert_eq!(file, "shot_00002.png");
        assert_eq!(full_path, dir.path().join("shot_00002.png"));
        assert_eq!(counter, 3);
        assert_eq!(fs::read(dir.path().join("shot_00001.png")).unwrap(), b"other batch");
    }

    #[test]
    fn test_concurrent_batches_get_distinct_names() {
        use std::collections::HashSet;
        use std::sync::{Arc, Barrier};

        const WORKERS: usize = 8;
        let dir = tempfile::tempdir().unwrap();

        for round in 0..20 {
            let barrier = Arc::new(Barrier::new(WORKERS));
            let handles: Vec<_> = (0..WORKERS)
                .map(|worker| {
                    let barrier = barrier.clone();
                    let out = dir.path().to_path_buf();
                    std::thread::spawn(move || {
                        let value = worker as f32 / WORKERS as f32;
                        let frame = ImageFrame::filled(2, 2, value).unwrap();
                        barrier.wait();
                        let saved = save_images(&[frame], &out, "shot", 1).unwrap();
                        (worker, saved[0].filename.clone())
                    })
                })
                .collect();

            let results: Vec<(usize, String)> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();

            let names: HashSet<_> = results.iter().map(|(_, name)| name.clone()).collect();
            assert_eq!(names.len(), WORKERS, "duplicate names in round {}", round);

            // Each file holds the frame of the call that was handed its name
            for (worker, name) in &results {
                let expected = (*worker as f32 / WORKERS as f32 * 255.0) as u8;
                let img = decode(&dir.path().join(name));
                assert!(img.pixels().all(|p| p.0 == [expected; 3]));
            }
        }

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 20 * WORKERS);
    }

    #[test]
    fn test_encoder_resolves_subfolder() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = ImageEncoder::new(dir.path(), 4);
        let frames = vec![ImageFrame::filled(3, 1, 0.5).unwrap()];

        let saved = encoder.encode(&frames, "batch/shot").unwrap();
        assert_eq!(saved[0].subfolder, "batch");
        let path = encoder.resolve(&saved[0]);
        assert_eq!(path, dir.path().join("batch").join("shot_00001.png"));
        assert!(path.is_file());
    }

    #[test]
    fn test_descriptor_serializes_type_field() {
        let saved = SavedImage {
            filename: "shot_00001.png".to_string(),
            subfolder: String::new(),
            folder_type: FolderType::Output,
        };
        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "shot_00001.png", "subfolder": "", "type": "output"})
        );
    }

    #[test]
    fn test_load_frame_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_images(
            &[ImageFrame::filled(4, 3, 1.0).unwrap()],
            dir.path(),
            "src",
            4,
        )
        .unwrap();

        let frame = load_frame(&dir.path().join(&saved[0].filename)).unwrap();
        assert_eq!((frame.width, frame.height), (4, 3));
        assert!(frame.data.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        assert!(matches!(
            load_frame(&dir.path().join("missing.png")),
            Err(AppError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_compression_levels() {
        assert!(matches!(compression_for_level(0), CompressionType::Fast));
        assert!(matches!(compression_for_level(4), CompressionType::Default));
        assert!(matches!(compression_for_level(9), CompressionType::Best));
    }
}
