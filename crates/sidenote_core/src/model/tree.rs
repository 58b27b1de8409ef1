//! Note tree node model.
//!
//! # Responsibility
//! - Define the folder / note-reference forest persisted under `note_tree`.
//!
//! # Invariants
//! - A `NoteRef` carries only the id; text lives in the flat note list.
//! - Folder names may repeat; lookups take the first depth-first match.

use super::note::NoteId;
use serde::{Deserialize, Serialize};

/// One node of the note tree.
///
/// Serialized with a `type` tag (`folder` / `note`) to match the data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NoteTreeNode {
    #[serde(rename = "folder")]
    Folder {
        #[serde(default)]
        name: String,
        #[serde(default)]
        children: Vec<NoteTreeNode>,
    },
    #[serde(rename = "note")]
    NoteRef {
        #[serde(rename = "timestamp")]
        id: NoteId,
    },
}

impl NoteTreeNode {
    pub fn folder(name: impl Into<String>, children: Vec<NoteTreeNode>) -> Self {
        Self::Folder {
            name: name.into(),
            children,
        }
    }

    pub fn note_ref(id: impl Into<NoteId>) -> Self {
        Self::NoteRef { id: id.into() }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }

    /// Folder name, or `None` for note references.
    pub fn folder_name(&self) -> Option<&str> {
        match self {
            Self::Folder { name, .. } => Some(name),
            Self::NoteRef { .. } => None,
        }
    }

    /// Referenced note id, or `None` for folders.
    pub fn note_id(&self) -> Option<&str> {
        match self {
            Self::Folder { .. } => None,
            Self::NoteRef { id } => Some(id),
        }
    }
}
