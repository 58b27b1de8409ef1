//! Persisted aggregate written to the data file.
//!
//! # Responsibility
//! - Bundle notes, note tree and task lists into one serializable value.
//! - Build first-run seed content.
//!
//! # Invariants
//! - The data file is always replaced wholesale with one `AppData` value.

use super::note::{NoteId, NoteRecord};
use super::task::TaskListCollection;
use super::tree::NoteTreeNode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Text of the note created on first run.
pub const WELCOME_TEXT: &str = "Welcome! Notes you write here are saved automatically.";

/// Top-level data file shape.
///
/// `task_lists` and `active_task_list` are flattened to top-level keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
    #[serde(default)]
    pub note_tree: Vec<NoteTreeNode>,
    #[serde(flatten)]
    pub task_lists: TaskListCollection,
}

impl AppData {
    /// First-run content: a pinned welcome note inside the root folder and
    /// one empty default task list.
    pub fn seed(root_folder: &str, welcome_id: NoteId) -> Self {
        Self {
            notes: vec![NoteRecord::new(welcome_id.clone(), WELCOME_TEXT).with_pinned(true)],
            note_tree: vec![NoteTreeNode::folder(
                root_folder,
                vec![NoteTreeNode::note_ref(welcome_id)],
            )],
            task_lists: TaskListCollection::default(),
        }
    }

    pub fn note(&self, id: &str) -> Option<&NoteRecord> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn note_ids(&self) -> HashSet<NoteId> {
        self.notes.iter().map(|note| note.id.clone()).collect()
    }

    /// Pretty JSON bytes for the data file.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
