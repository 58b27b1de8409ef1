//! Data file persistence and backup snapshots.
//!
//! # Responsibility
//! - Read and atomically replace the data file.
//! - Create, list, restore and delete timestamped backups.
//!
//! # Invariants
//! - The data file is never truncated in place; a failed write leaves the
//!   previous file intact.
//! - Backup names are validated before any filesystem access.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod backup;
pub mod gateway;

pub use backup::{parse_backup_name, BackupEntry};
pub use gateway::{write_atomic, FileGateway, PersistenceGateway};

/// Result type used by persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from persistence operations.
#[derive(Debug)]
pub enum StorageError {
    /// Data file does not exist yet.
    NotFound(PathBuf),
    /// Data file exists but cannot be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Data file content is not a valid data document.
    Parse(serde_json::Error),
    /// In-memory data cannot be encoded.
    Encode(serde_json::Error),
    /// Atomic replace of a file failed.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Backup directory access failed.
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Name does not match the backup naming scheme.
    InvalidBackupName(String),
    /// Backup with this name does not exist.
    BackupNotFound(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "data file not found: {}", path.display()),
            Self::Read { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "data file is malformed: {err}"),
            Self::Encode(err) => write!(f, "failed to encode data: {err}"),
            Self::Write { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
            Self::Backup { path, source } => {
                write!(f, "backup operation failed at `{}`: {source}", path.display())
            }
            Self::InvalidBackupName(name) => write!(f, "invalid backup name: {name}"),
            Self::BackupNotFound(name) => write!(f, "backup not found: {name}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } | Self::Backup { source, .. } => {
                Some(source)
            }
            Self::Parse(err) | Self::Encode(err) => Some(err),
            Self::NotFound(_) | Self::InvalidBackupName(_) | Self::BackupNotFound(_) => None,
        }
    }
}
