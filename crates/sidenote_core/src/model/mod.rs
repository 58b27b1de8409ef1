//! Persisted data model for notes, task lists and the note tree.
//!
//! # Responsibility
//! - Define the serde shapes written to the data file.
//! - Keep note storage (flat) separate from note placement (tree).
//!
//! # Invariants
//! - Every note is identified by an opaque, unique `NoteId`.
//! - The tree only references notes; it never owns note text.

pub mod app_data;
pub mod note;
pub mod task;
pub mod tree;
