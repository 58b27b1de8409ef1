//! Read-only note projections used by the surfaces.

use crate::model::note::NoteRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").expect("valid tag regex"));

const ALIAS_MAX_CHARS: usize = 30;

/// Hashtags (`#word`) in `text`, without the leading `#`.
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|tag| tag.as_str().to_string())
        .collect()
}

/// Union of all tags across `notes`, sorted.
pub fn collect_tags(notes: &[NoteRecord]) -> BTreeSet<String> {
    notes
        .iter()
        .flat_map(|note| extract_tags(&note.text))
        .collect()
}

/// Pinned notes first, then newest id first.
pub fn sort_for_display(notes: &mut [NoteRecord]) {
    notes.sort_by(|left, right| {
        right
            .pinned
            .cmp(&left.pinned)
            .then_with(|| right.id.cmp(&left.id))
    });
}

/// Search box plus tag selector state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub search: String,
    /// `None` means all tags.
    pub tag: Option<String>,
}

impl NoteFilter {
    /// Case-insensitive substring match over `id + " " + text`, combined
    /// with an exact tag match when a tag is selected.
    pub fn matches(&self, note: &NoteRecord) -> bool {
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let haystack = format!("{} {}", note.id, note.text).to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        match &self.tag {
            Some(tag) => extract_tags(&note.text).contains(tag),
            None => true,
        }
    }
}

pub fn filter_notes<'a>(notes: &'a [NoteRecord], filter: &NoteFilter) -> Vec<&'a NoteRecord> {
    notes.iter().filter(|note| filter.matches(note)).collect()
}

/// Tree label: first non-blank line of the text, capped at 30 chars,
/// falling back to the id.
pub fn note_alias(note: &NoteRecord) -> String {
    let first_line = note.text.trim().lines().next().unwrap_or_default().trim();
    let alias = if first_line.is_empty() {
        note.id.as_str()
    } else {
        first_line
    };
    alias.chars().take(ALIAS_MAX_CHARS).collect()
}
