//! Load-time decoding and integrity repair.
//!
//! # Responsibility
//! - Decode the data file leniently, replacing malformed parts with empty
//!   defaults instead of rejecting the whole document.
//! - Deduplicate note ids and reconcile the tree.
//!
//! # Invariants
//! - After `repair`, note ids are unique and non-empty, the root folder
//!   exists and every note has exactly one tree reference.

use crate::model::app_data::AppData;
use crate::model::note::{NoteId, NoteIdGenerator, NoteRecord};
use crate::model::task::{TaskListCollection, TaskRecord};
use crate::model::tree::NoteTreeNode;
use crate::tree::{ensure_root_folder, reconcile, remap_note_refs};
use serde::de::Error as _;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What load-time repair had to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Seed content replaced a missing or unusable file.
    pub seeded: bool,
    /// Fields or entries replaced with defaults during decoding.
    pub shape_fixes: usize,
    /// Notes that received a freshly generated id.
    pub reassigned_ids: usize,
    pub root_folder_created: bool,
    /// Reconciliation added or removed references.
    pub tree_reconciled: bool,
    pub task_lists_normalized: bool,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        self.seeded
            || self.shape_fixes > 0
            || self.reassigned_ids > 0
            || self.root_folder_created
            || self.tree_reconciled
            || self.task_lists_normalized
    }
}

/// Decodes data file bytes.
///
/// Only a non-JSON document or a non-object top level is an error; every
/// other deviation is replaced with a default and counted in `shape_fixes`.
pub fn decode_app_data(bytes: &[u8]) -> Result<(AppData, usize), serde_json::Error> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Object(root) = value else {
        return Err(serde_json::Error::custom("data file top level must be an object"));
    };

    let mut fixes = 0;
    let notes = match root.get("notes") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| decode_note(item, &mut fixes))
            .collect(),
        _ => {
            fixes += 1;
            Vec::new()
        }
    };
    let note_tree = match root.get("note_tree") {
        Some(Value::Array(items)) => decode_nodes(items, &mut fixes),
        _ => {
            fixes += 1;
            Vec::new()
        }
    };
    let lists = match root.get("task_lists") {
        Some(Value::Object(lists)) => decode_task_lists(lists, &mut fixes),
        _ => {
            fixes += 1;
            BTreeMap::new()
        }
    };
    let active = match root.get("active_task_list") {
        Some(Value::String(name)) => name.clone(),
        _ => {
            fixes += 1;
            String::new()
        }
    };

    let data = AppData {
        notes,
        note_tree,
        task_lists: TaskListCollection { lists, active },
    };
    Ok((data, fixes))
}

fn decode_note(value: &Value, fixes: &mut usize) -> Option<NoteRecord> {
    let Value::Object(fields) = value else {
        *fixes += 1;
        return None;
    };
    let id = match fields.get("timestamp") {
        Some(Value::String(id)) => id.clone(),
        _ => String::new(),
    };
    let text = match fields.get("text") {
        Some(Value::String(text)) => text.clone(),
        None => String::new(),
        Some(_) => {
            *fixes += 1;
            String::new()
        }
    };
    let pinned = fields.get("pinned").and_then(Value::as_bool).unwrap_or(false);
    Some(NoteRecord { id, text, pinned })
}

fn decode_nodes(items: &[Value], fixes: &mut usize) -> Vec<NoteTreeNode> {
    items
        .iter()
        .filter_map(|item| {
            let node = decode_node(item, fixes);
            if node.is_none() {
                *fixes += 1;
            }
            node
        })
        .collect()
}

fn decode_node(value: &Value, fixes: &mut usize) -> Option<NoteTreeNode> {
    let fields = value.as_object()?;
    match fields.get("type").and_then(Value::as_str)? {
        "folder" => {
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let children = match fields.get("children") {
                Some(Value::Array(items)) => decode_nodes(items, fixes),
                None => Vec::new(),
                Some(_) => {
                    *fixes += 1;
                    Vec::new()
                }
            };
            Some(NoteTreeNode::Folder { name, children })
        }
        "note" => {
            let id = fields.get("timestamp").and_then(Value::as_str)?;
            Some(NoteTreeNode::note_ref(id))
        }
        _ => None,
    }
}

fn decode_task_lists(
    lists: &Map<String, Value>,
    fixes: &mut usize,
) -> BTreeMap<String, Vec<TaskRecord>> {
    let mut out = BTreeMap::new();
    for (name, tasks) in lists {
        let Value::Array(tasks) = tasks else {
            *fixes += 1;
            out.insert(name.clone(), Vec::new());
            continue;
        };
        let decoded = tasks
            .iter()
            .filter_map(|task| match serde_json::from_value::<TaskRecord>(task.clone()) {
                Ok(task) => Some(task),
                Err(_) => {
                    *fixes += 1;
                    None
                }
            })
            .collect();
        out.insert(name.clone(), decoded);
    }
    out
}

/// Gives every note with an empty or repeated id a fresh id.
///
/// A repeated id is remapped to the first replacement issued for it, and
/// every tree reference to the old id is rewritten to that replacement.
/// Returns the number of notes that received a new id.
pub fn dedupe_note_ids(data: &mut AppData, ids: &mut NoteIdGenerator) -> usize {
    let mut taken: HashSet<NoteId> = data.note_ids();
    let mut seen = HashSet::new();
    let mut remap: HashMap<NoteId, NoteId> = HashMap::new();
    let mut reassigned = 0;

    for note in data.notes.iter_mut() {
        if !note.id.is_empty() && seen.insert(note.id.clone()) {
            continue;
        }
        let fresh = ids.next_id(&taken);
        taken.insert(fresh.clone());
        seen.insert(fresh.clone());
        if !note.id.is_empty() {
            remap.entry(note.id.clone()).or_insert_with(|| fresh.clone());
        }
        note.id = fresh;
        reassigned += 1;
    }

    if !remap.is_empty() {
        remap_note_refs(&mut data.note_tree, &remap);
    }
    reassigned
}

/// Runs every integrity repair on `data` in place.
pub fn repair(data: &mut AppData, root_folder: &str, ids: &mut NoteIdGenerator) -> RepairReport {
    let mut report = RepairReport {
        reassigned_ids: dedupe_note_ids(data, ids),
        root_folder_created: ensure_root_folder(&mut data.note_tree, root_folder),
        ..RepairReport::default()
    };

    let reconciled = reconcile(&data.note_tree, &data.notes, root_folder);
    report.tree_reconciled = reconciled != data.note_tree;
    data.note_tree = reconciled;
    report.task_lists_normalized = data.task_lists.normalize();
    report
}
