//! Tree/note reconciliation.
//!
//! # Invariants
//! - `reconcile` is deterministic and idempotent for equal inputs.
//! - Missing notes are appended to the root folder in note-list order.

use crate::model::note::{NoteId, NoteRecord};
use crate::model::tree::NoteTreeNode;
use std::collections::{HashMap, HashSet};

/// Gathers every `NoteRef` id in the subtree.
pub fn collect_referenced_ids(nodes: &[NoteTreeNode]) -> HashSet<NoteId> {
    let mut out = HashSet::new();
    collect_into(nodes, &mut out);
    out
}

fn collect_into(nodes: &[NoteTreeNode], out: &mut HashSet<NoteId>) {
    for node in nodes {
        match node {
            NoteTreeNode::NoteRef { id } => {
                out.insert(id.clone());
            }
            NoteTreeNode::Folder { children, .. } => collect_into(children, out),
        }
    }
}

/// Rebuilds the tree keeping only refs whose id is in `valid_ids`.
///
/// Folders are kept even when they end up empty.
pub fn prune_dangling(nodes: &[NoteTreeNode], valid_ids: &HashSet<NoteId>) -> Vec<NoteTreeNode> {
    nodes
        .iter()
        .filter_map(|node| match node {
            NoteTreeNode::NoteRef { id } => valid_ids.contains(id).then(|| node.clone()),
            NoteTreeNode::Folder { name, children } => Some(NoteTreeNode::Folder {
                name: name.clone(),
                children: prune_dangling(children, valid_ids),
            }),
        })
        .collect()
}

/// Restores the one-ref-per-note invariant between `tree` and `notes`.
///
/// Dangling refs are dropped, repeated refs keep their first depth-first
/// occurrence, and notes without a ref are appended to the folder named
/// `root_folder` (created as the first root node when absent).
pub fn reconcile(
    tree: &[NoteTreeNode],
    notes: &[NoteRecord],
    root_folder: &str,
) -> Vec<NoteTreeNode> {
    let valid_ids: HashSet<NoteId> = notes
        .iter()
        .filter(|note| !note.id.is_empty())
        .map(|note| note.id.clone())
        .collect();

    let mut result = prune_dangling(tree, &valid_ids);
    let mut seen = HashSet::new();
    drop_repeated_refs(&mut result, &mut seen);

    let mut queued = HashSet::new();
    let missing: Vec<NoteId> = notes
        .iter()
        .filter(|note| valid_ids.contains(&note.id) && !seen.contains(&note.id))
        .filter(|note| queued.insert(note.id.clone()))
        .map(|note| note.id.clone())
        .collect();

    if !missing.is_empty() {
        ensure_root_folder(&mut result, root_folder);
        if let Some(NoteTreeNode::Folder { children, .. }) = find_folder_mut(&mut result, root_folder)
        {
            children.extend(missing.into_iter().map(NoteTreeNode::note_ref));
        }
    }
    result
}

fn drop_repeated_refs(nodes: &mut Vec<NoteTreeNode>, seen: &mut HashSet<NoteId>) {
    nodes.retain_mut(|node| match node {
        NoteTreeNode::NoteRef { id } => seen.insert(id.clone()),
        NoteTreeNode::Folder { children, .. } => {
            drop_repeated_refs(children, seen);
            true
        }
    });
}

/// First depth-first folder with this name.
pub fn find_folder<'a>(nodes: &'a [NoteTreeNode], name: &str) -> Option<&'a NoteTreeNode> {
    for node in nodes {
        if let NoteTreeNode::Folder {
            name: folder_name,
            children,
        } = node
        {
            if folder_name == name {
                return Some(node);
            }
            if let Some(found) = find_folder(children, name) {
                return Some(found);
            }
        }
    }
    None
}

pub(crate) fn find_folder_mut<'a>(
    nodes: &'a mut [NoteTreeNode],
    name: &str,
) -> Option<&'a mut NoteTreeNode> {
    for node in nodes.iter_mut() {
        let is_match = matches!(
            node,
            NoteTreeNode::Folder { name: folder_name, .. } if folder_name.as_str() == name
        );
        if is_match {
            return Some(node);
        }
        if let NoteTreeNode::Folder { children, .. } = node {
            if let Some(found) = find_folder_mut(children, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Inserts an empty root folder as the first root node when no folder with
/// that name exists. Returns whether the tree changed.
pub fn ensure_root_folder(tree: &mut Vec<NoteTreeNode>, root_folder: &str) -> bool {
    if find_folder(tree, root_folder).is_some() {
        return false;
    }
    tree.insert(0, NoteTreeNode::folder(root_folder, Vec::new()));
    true
}

/// Removes every ref to one of `ids`, at any depth. Returns how many refs
/// were removed. Folders are left in place.
pub fn remove_note_refs(nodes: &mut Vec<NoteTreeNode>, ids: &HashSet<NoteId>) -> usize {
    let before = nodes.len();
    nodes.retain(|node| !matches!(node, NoteTreeNode::NoteRef { id } if ids.contains(id)));
    let mut removed = before - nodes.len();
    for node in nodes.iter_mut() {
        if let NoteTreeNode::Folder { children, .. } = node {
            removed += remove_note_refs(children, ids);
        }
    }
    removed
}

/// Rewrites refs through `remap` (old id -> new id). Returns the number of
/// rewritten refs.
pub fn remap_note_refs(nodes: &mut [NoteTreeNode], remap: &HashMap<NoteId, NoteId>) -> usize {
    let mut rewritten = 0;
    for node in nodes.iter_mut() {
        match node {
            NoteTreeNode::NoteRef { id } => {
                if let Some(new_id) = remap.get(id) {
                    *id = new_id.clone();
                    rewritten += 1;
                }
            }
            NoteTreeNode::Folder { children, .. } => rewritten += remap_note_refs(children, remap),
        }
    }
    rewritten
}

pub fn count_folders(nodes: &[NoteTreeNode]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            NoteTreeNode::Folder { children, .. } => 1 + count_folders(children),
            NoteTreeNode::NoteRef { .. } => 0,
        })
        .sum()
}
