//! Backup file naming and enumeration.

use super::{StorageError, StorageResult};
use chrono::{NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static BACKUP_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data_(\d{8}_\d{6})(?:_(\d+))?\.bak$").expect("backup name regex must compile")
});

/// One backup file in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    pub created_at: NaiveDateTime,
    /// Disambiguating suffix for backups taken within the same second.
    pub sequence: u32,
}

/// Parses `data_YYYYMMDD_HHMMSS[_N].bak` into its stamp and sequence.
pub fn parse_backup_name(name: &str) -> Option<(NaiveDateTime, u32)> {
    let captures = BACKUP_NAME_RE.captures(name)?;
    let stamp = NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), STAMP_FORMAT).ok()?;
    let sequence = match captures.get(2) {
        Some(value) => value.as_str().parse().ok()?,
        None => 0,
    };
    Some((stamp, sequence))
}

pub(crate) fn validate_backup_name(name: &str) -> StorageResult<()> {
    if parse_backup_name(name).is_none() {
        return Err(StorageError::InvalidBackupName(name.to_string()));
    }
    Ok(())
}

pub(crate) fn backup_file_name(stamp: NaiveDateTime, sequence: u32) -> String {
    let stamp = stamp.format(STAMP_FORMAT);
    if sequence == 0 {
        format!("data_{stamp}.bak")
    } else {
        format!("data_{stamp}_{sequence}.bak")
    }
}

/// First free backup entry for `now` inside `dir`.
pub(crate) fn next_backup_entry(dir: &Path, now: NaiveDateTime) -> BackupEntry {
    let created_at = now.with_nanosecond(0).unwrap_or(now);
    let mut sequence = 0;
    loop {
        let name = backup_file_name(created_at, sequence);
        if !dir.join(&name).exists() {
            return BackupEntry {
                name,
                created_at,
                sequence,
            };
        }
        sequence += 1;
    }
}

/// Backups in `dir`, newest first. A missing directory lists as empty.
pub(crate) fn list_backup_entries(dir: &Path) -> StorageResult<Vec<BackupEntry>> {
    let reader = match std::fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Backup {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut entries = Vec::new();
    for item in reader {
        let item = item.map_err(|source| StorageError::Backup {
            path: dir.to_path_buf(),
            source,
        })?;
        let Some(name) = item.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some((created_at, sequence)) = parse_backup_name(&name) {
            entries.push(BackupEntry {
                name,
                created_at,
                sequence,
            });
        }
    }
    entries.sort_by(|left, right| {
        (right.created_at, right.sequence).cmp(&(left.created_at, left.sequence))
    });
    Ok(entries)
}
