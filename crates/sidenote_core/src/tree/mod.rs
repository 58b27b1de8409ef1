//! Note tree algorithms.
//!
//! # Responsibility
//! - Keep tree references and the flat note list in agreement.
//! - Provide explicit folder edits used by the window surface.
//!
//! # Invariants
//! - After `reconcile`, every note id appears in exactly one `NoteRef` and
//!   every `NoteRef` points at an existing note.
//! - Folders are user structure: algorithms here never drop a folder.

pub mod edit;
pub mod reconcile;

pub use edit::{
    create_folder, move_to_root, move_up, node_at, place_note, remove_subtree, rename_folder,
    TreeEditError, TreePath,
};
pub use reconcile::{
    collect_referenced_ids, count_folders, ensure_root_folder, find_folder, prune_dangling,
    reconcile, remap_note_refs, remove_note_refs,
};
