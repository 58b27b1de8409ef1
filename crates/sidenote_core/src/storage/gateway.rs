//! Persistence gateway contract and file-backed implementation.
//!
//! # Invariants
//! - `write_app_data` replaces the data file through a temp file and a
//!   rename, so readers see either the old or the new document.
//! - `create_backup` copies the persisted file, never an in-memory value.

use super::backup::{list_backup_entries, next_backup_entry, validate_backup_name, BackupEntry};
use super::{StorageError, StorageResult};
use crate::config::AppPaths;
use chrono::Local;
use log::{info, warn};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Storage operations consumed by the data store.
pub trait PersistenceGateway {
    /// Raw bytes of the persisted data file.
    fn read_app_data(&self) -> StorageResult<Vec<u8>>;
    /// Atomically replaces the persisted data file.
    fn write_app_data(&self, bytes: &[u8]) -> StorageResult<()>;
    /// Copies the persisted data file into the backup directory.
    ///
    /// Returns `None` when there is no data file to copy yet.
    fn create_backup(&self) -> StorageResult<Option<BackupEntry>>;
    /// Backups ordered newest first.
    fn list_backups(&self) -> StorageResult<Vec<BackupEntry>>;
    /// Copies the named backup over the data file.
    fn restore_backup(&self, name: &str) -> StorageResult<()>;
    fn delete_backup(&self, name: &str) -> StorageResult<()>;
}

/// Gateway over a data file and a sibling backup directory.
#[derive(Debug, Clone)]
pub struct FileGateway {
    data_file: PathBuf,
    backup_dir: PathBuf,
}

impl FileGateway {
    pub fn new(data_file: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(&paths.data_file, &paths.backup_dir)
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn backup_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_backup_name(name)?;
        let path = self.backup_dir.join(name);
        if !path.is_file() {
            return Err(StorageError::BackupNotFound(name.to_string()));
        }
        Ok(path)
    }
}

impl PersistenceGateway for FileGateway {
    fn read_app_data(&self) -> StorageResult<Vec<u8>> {
        fs::read(&self.data_file).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(self.data_file.clone())
            } else {
                StorageError::Read {
                    path: self.data_file.clone(),
                    source,
                }
            }
        })
    }

    fn write_app_data(&self, bytes: &[u8]) -> StorageResult<()> {
        write_atomic(&self.data_file, bytes)
    }

    fn create_backup(&self) -> StorageResult<Option<BackupEntry>> {
        let bytes = match self.read_app_data() {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                info!("event=backup_create module=storage status=skipped reason=no_data_file");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        fs::create_dir_all(&self.backup_dir).map_err(|source| StorageError::Backup {
            path: self.backup_dir.clone(),
            source,
        })?;
        let entry = next_backup_entry(&self.backup_dir, Local::now().naive_local());
        write_atomic(&self.backup_dir.join(&entry.name), &bytes)?;
        info!(
            "event=backup_create module=storage status=ok name={} bytes={}",
            entry.name,
            bytes.len()
        );
        Ok(Some(entry))
    }

    fn list_backups(&self) -> StorageResult<Vec<BackupEntry>> {
        list_backup_entries(&self.backup_dir)
    }

    fn restore_backup(&self, name: &str) -> StorageResult<()> {
        let path = self.backup_path(name)?;
        let bytes = fs::read(&path).map_err(|source| StorageError::Backup {
            path: path.clone(),
            source,
        })?;
        write_atomic(&self.data_file, &bytes)?;
        info!("event=backup_restore module=storage status=ok name={}", name);
        Ok(())
    }

    fn delete_backup(&self, name: &str) -> StorageResult<()> {
        let path = self.backup_path(name)?;
        fs::remove_file(&path).map_err(|source| StorageError::Backup { path, source })?;
        info!("event=backup_delete module=storage status=ok name={}", name);
        Ok(())
    }
}

/// Writes `bytes` to a uniquely named temp file beside `path`, syncs it and
/// renames it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let write_error = |source: std::io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(write_error)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("data");
    let tmp = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "event=atomic_write_cleanup module=storage status=error tmp={} error={}",
                    tmp.display(),
                    cleanup
                );
            }
        }
        return Err(write_error(source));
    }
    Ok(())
}
