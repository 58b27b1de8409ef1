//! Note record and note id generation.
//!
//! # Responsibility
//! - Define the flat note record persisted under `notes`.
//! - Issue timestamp ids that stay unique under rapid successive calls.
//!
//! # Invariants
//! - Ids are opaque outside this module; only equality and ordering matter.
//! - A generator never hands out the same id twice, and never an id the
//!   caller reports as taken.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable note identifier, persisted as the `timestamp` field.
pub type NoteId = String;

const NOTE_ID_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One user note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Serialized as `timestamp` to match the data file schema.
    #[serde(rename = "timestamp")]
    pub id: NoteId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pinned: bool,
}

impl NoteRecord {
    /// Creates an unpinned note.
    pub fn new(id: impl Into<NoteId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            pinned: false,
        }
    }

    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }
}

/// Collision-free note id source.
///
/// The base id is the local wall clock at microsecond resolution. When that
/// value is already taken (same microsecond, or a persisted id from another
/// run) a `#N` suffix is appended until the id is free.
#[derive(Debug, Default)]
pub struct NoteIdGenerator {
    issued: HashSet<NoteId>,
}

impl NoteIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh id that is not in `taken` and was never issued before.
    pub fn next_id(&mut self, taken: &HashSet<NoteId>) -> NoteId {
        let base = Local::now().format(NOTE_ID_FORMAT).to_string();
        self.next_id_from(base, taken)
    }

    fn next_id_from(&mut self, base: String, taken: &HashSet<NoteId>) -> NoteId {
        let mut candidate = base.clone();
        let mut suffix = 0u32;
        while taken.contains(&candidate) || self.issued.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}#{suffix}");
        }
        self.issued.insert(candidate.clone());
        candidate
    }
}
