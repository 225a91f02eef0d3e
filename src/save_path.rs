//! Allocation of unique output paths for rendered frames.
//!
//! A prefix such as `renders/%year%-%month%/shot` resolves to the subfolder
//! `renders/2026-10` and the base name `shot`. Frames are then numbered
//! `shot_00001.png`, `shot_00002.png`, ... continuing after the highest
//! counter already present in that folder.

use chrono::{DateTime, Datelike, Local, Timelike};
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::errors::{AppError, AppResult};
use crate::security::InputValidator;

/// Where the next batch of frames goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePath {
    pub full_output_folder: PathBuf,
    pub filename: String,
    pub counter: u32,
    pub subfolder: String,
}

impl SavePath {
    /// File name for frame `index` of the batch.
    pub fn file_name_for(&self, index: usize) -> String {
        format!("{}_{:05}.png", self.filename, self.counter as usize + index)
    }

    /// File name carrying an explicit counter value.
    pub fn file_name_with_counter(&self, counter: u32) -> String {
        format!("{}_{:05}.png", self.filename, counter)
    }
}

/// Replaces `%width%`, `%height%` and the date tokens in `prefix`.
pub fn substitute_tokens(prefix: &str, width: u32, height: u32, now: DateTime<Local>) -> String {
    if !prefix.contains('%') {
        return prefix.to_string();
    }

    prefix
        .replace("%width%", &width.to_string())
        .replace("%height%", &height.to_string())
        .replace("%year%", &now.year().to_string())
        .replace("%month%", &format!("{:02}", now.month()))
        .replace("%day%", &format!("{:02}", now.day()))
        .replace("%hour%", &format!("{:02}", now.hour()))
        .replace("%minute%", &format!("{:02}", now.minute()))
        .replace("%second%", &format!("{:02}", now.second()))
}

pub fn allocate(output_dir: &Path, prefix: &str, width: u32, height: u32) -> AppResult<SavePath> {
    allocate_at(output_dir, prefix, width, height, Local::now())
}

pub fn allocate_at(
    output_dir: &Path,
    prefix: &str,
    width: u32,
    height: u32,
    now: DateTime<Local>,
) -> AppResult<SavePath> {
    let prefix = substitute_tokens(prefix, width, height, now);
    let prefix = prefix.trim().trim_start_matches('/');

    let (subfolder, filename) = match prefix.rsplit_once('/') {
        Some((dir, name)) => (dir.trim_end_matches('/').to_string(), name),
        None => (String::new(), prefix),
    };

    let filename = InputValidator::sanitize_filename(filename);
    if filename.is_empty() {
        return Err(AppError::validation("file_name", "File name prefix cannot be empty"));
    }

    if Path::new(&subfolder)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(AppError::validation(
            "file_name",
            "Saving outside the output folder is not allowed",
        ));
    }

    let full_output_folder = if subfolder.is_empty() {
        output_dir.to_path_buf()
    } else {
        output_dir.join(&subfolder)
    };
    fs::create_dir_all(&full_output_folder)?;

    let counter = next_counter(&full_output_folder, &filename)?;
    log::debug!(
        "Allocated {} starting at counter {} in {}",
        filename,
        counter,
        full_output_folder.display()
    );

    Ok(SavePath {
        full_output_folder,
        filename,
        counter,
        subfolder,
    })
}

/// One past the highest `{filename}_NNNNN.png` counter in `folder`.
fn next_counter(folder: &Path, filename: &str) -> AppResult<u32> {
    let pattern = Regex::new(&format!(r"^{}_(\d+)\.png$", regex::escape(filename)))
        .map_err(|e| AppError::validation("file_name", &e.to_string()))?;

    let mut highest = 0u32;
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(caps) = pattern.captures(&name) {
            if let Ok(counter) = caps[1].parse::<u32>() {
                highest = highest.max(counter);
            }
        }
    }

    Ok(highest.saturating_add(1))
}
