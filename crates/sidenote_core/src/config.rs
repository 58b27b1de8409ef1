//! Runtime settings and on-disk layout.
//!
//! # Responsibility
//! - Read the fields of `settings.json` that the data layer consumes.
//! - Resolve every data-layer path against one base directory.
//!
//! # Invariants
//! - Loading settings never fails: a missing or malformed file yields
//!   defaults and a log line.
//! - Unknown keys are ignored; other collaborators own them.

use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const LOG_DIR_NAME: &str = "logs";

const DEFAULT_ROOT_FOLDER: &str = "Notes";
const DEFAULT_AUTOSAVE_INTERVAL_SEC: u64 = 10;
const MIN_AUTOSAVE_INTERVAL_SEC: u64 = 2;
const DEFAULT_BACKUP_INTERVAL_SEC: u64 = 600;

/// Data-layer view of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notes_root_folder: String,
    pub autosave_interval_sec: u64,
    pub backup_interval_sec: u64,
    pub data_file: String,
    pub backup_dir: String,
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notes_root_folder: DEFAULT_ROOT_FOLDER.to_string(),
            autosave_interval_sec: DEFAULT_AUTOSAVE_INTERVAL_SEC,
            backup_interval_sec: DEFAULT_BACKUP_INTERVAL_SEC,
            data_file: "data.json".to_string(),
            backup_dir: "backups".to_string(),
            log_level: None,
        }
    }
}

impl Settings {
    /// Reads settings from `path`, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "event=settings_load module=config status=default reason=missing path={}",
                    path.display()
                );
                return Self::default();
            }
            Err(err) => {
                warn!(
                    "event=settings_load module=config status=default reason=read_error error={}",
                    err
                );
                return Self::default();
            }
        };

        match serde_json::from_slice::<Self>(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    "event=settings_load module=config status=default reason=parse_error error={}",
                    err
                );
                Self::default()
            }
        }
    }

    /// Autosave period, never shorter than two seconds.
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_sec.max(MIN_AUTOSAVE_INTERVAL_SEC))
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_sec)
    }

    /// Configured root folder name; blank values fall back to `Notes`.
    pub fn root_folder_name(&self) -> &str {
        let trimmed = self.notes_root_folder.trim();
        if trimmed.is_empty() {
            DEFAULT_ROOT_FOLDER
        } else {
            trimmed
        }
    }
}

/// Resolved filesystem layout for one profile directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub base_dir: PathBuf,
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub settings_file: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn resolve(base_dir: &Path, settings: &Settings) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            data_file: base_dir.join(&settings.data_file),
            backup_dir: base_dir.join(&settings.backup_dir),
            settings_file: base_dir.join(SETTINGS_FILE_NAME),
            log_dir: base_dir.join(LOG_DIR_NAME),
        }
    }
}
