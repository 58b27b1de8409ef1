//! In-memory authority over the persisted data.
//!
//! # Responsibility
//! - Load, repair and cache the data file through a [`PersistenceGateway`].
//! - Merge surface snapshots, delete notes and persist after every change.
//!
//! # Invariants
//! - The cache always satisfies the repair invariants once loaded.
//! - Save paths never return errors: a failed write is logged, the cache
//!   stays authoritative and the write is retried on the next trigger.
//! - A reload never serves disk data older than an unwritten cache.

use crate::model::app_data::AppData;
use crate::model::note::{NoteId, NoteIdGenerator, NoteRecord};
use crate::storage::{write_atomic, BackupEntry, PersistenceGateway, StorageError, StorageResult};
use crate::tree::{collect_referenced_ids, find_folder, reconcile, remove_note_refs};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::Path;

pub mod export;
pub mod merge;
pub mod query;
pub mod repair;

pub use export::render_markdown;
pub use merge::{merge_notes, SurfaceSnapshot};
pub use query::{
    collect_tags, extract_tags, filter_notes, note_alias, sort_for_display, NoteFilter,
};
pub use repair::{decode_app_data, dedupe_note_ids, repair, RepairReport};

/// Result of a save trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The data file now matches the cache.
    Persisted,
    /// Nothing needed writing.
    Unchanged,
    /// The write failed; it stays pending and is retried later.
    Deferred,
}

/// Result of storing the Zen editor text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZenCommit {
    /// Id of the updated or created note; `None` when nothing was stored.
    pub note_id: Option<NoteId>,
    pub outcome: SaveOutcome,
}

/// Single owner of the cached [`AppData`].
pub struct DataStore<G: PersistenceGateway> {
    gateway: G,
    root_folder: String,
    ids: NoteIdGenerator,
    cache: AppData,
    pending_write: bool,
    last_repair: RepairReport,
}

impl<G: PersistenceGateway> DataStore<G> {
    /// Creates a store with an empty cache; call [`Self::load_and_repair`]
    /// before handing data to a surface.
    pub fn new(gateway: G, root_folder: impl Into<String>) -> Self {
        Self {
            gateway,
            root_folder: root_folder.into(),
            ids: NoteIdGenerator::new(),
            cache: AppData::default(),
            pending_write: false,
            last_repair: RepairReport::default(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn root_folder(&self) -> &str {
        &self.root_folder
    }

    pub fn data(&self) -> &AppData {
        &self.cache
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_write
    }

    /// Report of the most recent [`Self::load_and_repair`].
    pub fn last_repair(&self) -> &RepairReport {
        &self.last_repair
    }

    /// Reloads from disk, repairs, caches and returns the data.
    ///
    /// Missing, unreadable or malformed files are replaced by seed data;
    /// a malformed file is copied into the backup directory first. Any
    /// repair is persisted before returning.
    pub fn load_and_repair(&mut self) -> AppData {
        if self.pending_write && self.persist() == SaveOutcome::Deferred {
            warn!(
                "event=data_load module=store status=cache reason=pending_write notes={}",
                self.cache.notes.len()
            );
            return self.cache.clone();
        }

        let mut report = RepairReport::default();
        let mut data = match self.read_from_disk(&mut report) {
            Some(data) => data,
            None => {
                report.seeded = true;
                let welcome_id = self.ids.next_id(&HashSet::new());
                AppData::seed(&self.root_folder, welcome_id)
            }
        };

        let repairs = repair(&mut data, &self.root_folder, &mut self.ids);
        report.reassigned_ids = repairs.reassigned_ids;
        report.root_folder_created = repairs.root_folder_created;
        report.tree_reconciled = repairs.tree_reconciled;
        report.task_lists_normalized = repairs.task_lists_normalized;

        self.cache = data;
        if report.changed() {
            info!(
                "event=integrity_repair module=store status=ok seeded={} shape_fixes={} reassigned_ids={} root_folder_created={} tree_reconciled={} task_lists_normalized={}",
                report.seeded,
                report.shape_fixes,
                report.reassigned_ids,
                report.root_folder_created,
                report.tree_reconciled,
                report.task_lists_normalized
            );
            self.persist();
        }
        debug!(
            "event=data_load module=store status=ok notes={} root_nodes={}",
            self.cache.notes.len(),
            self.cache.note_tree.len()
        );
        self.last_repair = report;
        self.cache.clone()
    }

    fn read_from_disk(&mut self, report: &mut RepairReport) -> Option<AppData> {
        let bytes = match self.gateway.read_app_data() {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                info!("event=data_load module=store status=first_run");
                return None;
            }
            Err(err) => {
                warn!(
                    "event=data_load module=store status=error reason=read error={}",
                    err
                );
                self.preserve_unusable_file();
                return None;
            }
        };

        match decode_app_data(&bytes) {
            Ok((data, fixes)) => {
                report.shape_fixes = fixes;
                Some(data)
            }
            Err(err) => {
                warn!(
                    "event=data_load module=store status=error reason=parse error={}",
                    StorageError::Parse(err)
                );
                self.preserve_unusable_file();
                None
            }
        }
    }

    fn preserve_unusable_file(&self) {
        match self.gateway.create_backup() {
            Ok(Some(entry)) => info!(
                "event=data_preserve module=store status=ok backup={}",
                entry.name
            ),
            Ok(None) => {}
            Err(err) => warn!("event=data_preserve module=store status=error error={}", err),
        }
    }

    fn persist(&mut self) -> SaveOutcome {
        let result = self
            .cache
            .to_json_bytes()
            .map_err(StorageError::Encode)
            .and_then(|bytes| self.gateway.write_app_data(&bytes));
        match result {
            Ok(()) => {
                self.pending_write = false;
                debug!(
                    "event=data_save module=store status=ok notes={}",
                    self.cache.notes.len()
                );
                SaveOutcome::Persisted
            }
            Err(err) => {
                self.pending_write = true;
                warn!(
                    "event=data_save module=store status=deferred error={}",
                    err
                );
                SaveOutcome::Deferred
            }
        }
    }

    /// Retries a pending write, if any.
    pub fn flush(&mut self) -> SaveOutcome {
        if self.pending_write {
            self.persist()
        } else {
            SaveOutcome::Unchanged
        }
    }

    /// Writes the cache unconditionally (explicit save action).
    pub fn save(&mut self) -> SaveOutcome {
        self.persist()
    }

    /// Fresh note id, distinct from every cached id.
    pub fn generate_note_id(&mut self) -> NoteId {
        let taken = self.cache.note_ids();
        self.ids.next_id(&taken)
    }

    /// Merges a surface's working copy, reconciles and persists.
    ///
    /// Incoming notes without an id get a generated one. The tree part is
    /// applied only when `owns_tree` is set.
    pub fn merge_surface_snapshot(
        &mut self,
        mut snapshot: SurfaceSnapshot,
        owns_tree: bool,
    ) -> SaveOutcome {
        if let Some(notes) = snapshot.notes.as_mut() {
            let mut taken = self.cache.note_ids();
            taken.extend(notes.iter().map(|note| note.id.clone()));
            for note in notes.iter_mut().filter(|note| note.id.is_empty()) {
                note.id = self.ids.next_id(&taken);
                taken.insert(note.id.clone());
            }
        }

        let before = self.cache.clone();
        if merge::apply_snapshot(&mut self.cache, snapshot, owns_tree) {
            debug!("event=snapshot_merge module=store status=tree_ignored reason=not_owner");
        }
        self.cache.note_tree = reconcile(&self.cache.note_tree, &self.cache.notes, &self.root_folder);

        if self.cache == before && !self.pending_write {
            return SaveOutcome::Unchanged;
        }
        self.persist()
    }

    pub fn delete_note(&mut self, id: &str) -> SaveOutcome {
        self.delete_notes(&[id.to_string()])
    }

    /// Removes notes and every reference to them; folders stay in place.
    pub fn delete_notes(&mut self, ids: &[NoteId]) -> SaveOutcome {
        let targets: HashSet<NoteId> = ids.iter().cloned().collect();
        let before = self.cache.notes.len();
        self.cache.notes.retain(|note| !targets.contains(&note.id));
        let removed_notes = before - self.cache.notes.len();
        let removed_refs = remove_note_refs(&mut self.cache.note_tree, &targets);

        if removed_notes == 0 && removed_refs == 0 {
            return self.flush();
        }
        info!(
            "event=note_delete module=store status=ok notes={} refs={}",
            removed_notes, removed_refs
        );
        self.persist()
    }

    /// Notes referenced anywhere under the first folder named
    /// `folder_name`, in note-list order. Unknown folders yield nothing.
    pub fn notes_visible_under(&self, folder_name: &str) -> Vec<NoteRecord> {
        let Some(folder) = find_folder(&self.cache.note_tree, folder_name) else {
            return Vec::new();
        };
        let visible = collect_referenced_ids(std::slice::from_ref(folder));
        self.cache
            .notes
            .iter()
            .filter(|note| visible.contains(&note.id))
            .cloned()
            .collect()
    }

    /// Stores the Zen editor text.
    ///
    /// Blank text without a source stores nothing. An existing source note
    /// gets its text replaced; otherwise a new note lands in the root
    /// folder.
    pub fn save_zen_note(&mut self, source: Option<&str>, text: &str) -> ZenCommit {
        let source = source.filter(|id| !id.is_empty());
        if source.is_none() && text.trim().is_empty() {
            return ZenCommit {
                note_id: None,
                outcome: self.flush(),
            };
        }

        let position =
            source.and_then(|id| self.cache.notes.iter().position(|note| note.id == id));
        let note_id = match position {
            Some(position) => {
                let note = &mut self.cache.notes[position];
                note.text = text.to_string();
                note.id.clone()
            }
            None => {
                let id = self.generate_note_id();
                self.cache.notes.push(NoteRecord::new(id.clone(), text));
                self.cache.note_tree =
                    reconcile(&self.cache.note_tree, &self.cache.notes, &self.root_folder);
                id
            }
        };
        ZenCommit {
            note_id: Some(note_id),
            outcome: self.persist(),
        }
    }

    /// Snapshots the persisted file. A pending write is retried first so
    /// the backup reflects the latest edit.
    pub fn create_backup(&mut self) -> StorageResult<Option<BackupEntry>> {
        self.flush();
        self.gateway.create_backup()
    }

    pub fn list_backups(&self) -> StorageResult<Vec<BackupEntry>> {
        self.gateway.list_backups()
    }

    pub fn delete_backup(&self, name: &str) -> StorageResult<()> {
        self.gateway.delete_backup(name)
    }

    /// Replaces the data file with a backup and reloads it.
    ///
    /// A pending write is discarded so it cannot overwrite the restored
    /// file.
    pub fn restore_backup(&mut self, name: &str) -> StorageResult<AppData> {
        self.gateway.restore_backup(name)?;
        self.pending_write = false;
        Ok(self.load_and_repair())
    }

    /// Writes the cached notes as markdown to `path`.
    pub fn export_markdown(&self, path: &Path) -> StorageResult<()> {
        let markdown = render_markdown(&self.cache);
        write_atomic(path, markdown.as_bytes())?;
        info!(
            "event=markdown_export module=store status=ok notes={}",
            self.cache.notes.len()
        );
        Ok(())
    }
}
