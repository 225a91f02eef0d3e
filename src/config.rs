use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

const APP_DIR_NAME: &str = "GCS Image Uploader";

/// Overrides `output_directory` when set.
pub const OUTPUT_DIR_ENV: &str = "GCS_UPLOADER_OUTPUT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploaderConfig {
    pub output_directory: Option<PathBuf>,
    pub compress_level: u8, // PNG compression, 0-9
    pub upload_all_frames: bool,
    pub default_folder_prefix: String,
    pub log_level: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            compress_level: 4,
            upload_all_frames: false,
            default_folder_prefix: String::new(),
            log_level: "info".to_string(),
        }
    }
}

impl UploaderConfig {
    /// Directory rendered frames are written to. The environment override
    /// wins over the file, the file wins over the platform default.
    pub fn resolve_output_directory(&self) -> AppResult<PathBuf> {
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }

        match &self.output_directory {
            Some(dir) => Ok(dir.clone()),
            None => get_default_output_directory(),
        }
    }
}

pub fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(APP_DIR_NAME);

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

/// Load configuration from `path`, or from the default location when `None`.
/// A missing file yields defaults; an unparseable one is logged and ignored.
pub fn load_config(path: Option<&Path>) -> AppResult<UploaderConfig> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };

    if !config_path.exists() {
        if path.is_some() {
            return Err(AppError::file_not_found(&config_path.to_string_lossy()));
        }
        log::debug!(
            "No config file at {}, using defaults",
            config_path.display()
        );
        return Ok(UploaderConfig::default());
    }

    let config_str = fs::read_to_string(&config_path)?;
    let config: UploaderConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        log::warn!("Failed to parse config file: {}. Using defaults.", e);
        UploaderConfig::default()
    });

    validate_config(&config)?;
    Ok(config)
}

pub fn save_config(config: &UploaderConfig, path: Option<&Path>) -> AppResult<PathBuf> {
    validate_config(config)?;

    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };

    // Keep a backup of the previous config
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(&config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_str)?;

    log::info!("Configuration saved to {}", config_path.display());
    Ok(config_path)
}

pub fn get_default_output_directory() -> AppResult<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Config("Could not find data directory".to_string()))?
        .join(APP_DIR_NAME)
        .join("output");

    Ok(data_dir)
}

pub fn validate_config(config: &UploaderConfig) -> AppResult<()> {
    if config.compress_level > 9 {
        return Err(AppError::validation("compress_level", "Must be between 0 and 9"));
    }

    if let Some(dir) = &config.output_directory {
        if dir.as_os_str().is_empty() {
            return Err(AppError::validation("output_directory", "Cannot be empty"));
        }
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::validation("log_level", "Must be a valid log level"));
    }

    Ok(())
}
