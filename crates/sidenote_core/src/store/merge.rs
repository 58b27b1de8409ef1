//! Merging surface working copies back into the cache.
//!
//! # Invariants
//! - Notes merge by id union: incoming ids overwrite, new ids append,
//!   cached ids absent from the snapshot are preserved.
//! - Task lists replace wholesale; the tree replaces wholesale only for the
//!   tree-owning surface.

use crate::model::app_data::AppData;
use crate::model::note::NoteRecord;
use crate::model::task::TaskListCollection;
use crate::model::tree::NoteTreeNode;
use std::collections::HashMap;

/// Parts of the data a surface reports back. `None` means "not touched".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    pub notes: Option<Vec<NoteRecord>>,
    pub task_lists: Option<TaskListCollection>,
    pub note_tree: Option<Vec<NoteTreeNode>>,
}

impl SurfaceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.task_lists.is_none() && self.note_tree.is_none()
    }

    /// Layers a newer snapshot over this one, field by field.
    ///
    /// Notes are unioned by id so two reports from the same surface both
    /// survive until the next flush.
    pub fn absorb(&mut self, newer: SurfaceSnapshot) {
        if let Some(incoming) = newer.notes {
            match self.notes.as_mut() {
                Some(notes) => merge_notes(notes, incoming),
                None => self.notes = Some(incoming),
            }
        }
        if newer.task_lists.is_some() {
            self.task_lists = newer.task_lists;
        }
        if newer.note_tree.is_some() {
            self.note_tree = newer.note_tree;
        }
    }

    /// Drops notes with this id from the snapshot.
    pub fn forget_note(&mut self, id: &str) {
        if let Some(notes) = self.notes.as_mut() {
            notes.retain(|note| note.id != id);
        }
    }
}

/// Id-union merge of `incoming` into `cached`, keeping cached order.
pub fn merge_notes(cached: &mut Vec<NoteRecord>, incoming: Vec<NoteRecord>) {
    let mut index: HashMap<String, usize> = cached
        .iter()
        .enumerate()
        .map(|(position, note)| (note.id.clone(), position))
        .collect();
    for note in incoming {
        match index.get(&note.id) {
            Some(position) => cached[*position] = note,
            None => {
                index.insert(note.id.clone(), cached.len());
                cached.push(note);
            }
        }
    }
}

/// Applies `snapshot` to `data`. Tree replacement is skipped unless
/// `owns_tree`. Returns whether the tree part was ignored.
pub(crate) fn apply_snapshot(data: &mut AppData, snapshot: SurfaceSnapshot, owns_tree: bool) -> bool {
    if let Some(notes) = snapshot.notes {
        merge_notes(&mut data.notes, notes);
    }
    if let Some(mut task_lists) = snapshot.task_lists {
        task_lists.normalize();
        data.task_lists = task_lists;
    }
    match snapshot.note_tree {
        Some(tree) if owns_tree => {
            data.note_tree = tree;
            false
        }
        Some(_) => true,
        None => false,
    }
}
