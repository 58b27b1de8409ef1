//! Explicit folder edits for the tree-owning surface.
//!
//! # Responsibility
//! - Address nodes by index path and apply structural edits in place.
//!
//! # Invariants
//! - A path is a sequence of child indexes starting at the root forest.
//! - Edits never change the set of referenced notes, except
//!   `remove_subtree`, which reports the ids it removed, and `place_note`,
//!   which keeps exactly one ref for the placed note.

use crate::model::note::NoteId;
use crate::model::tree::NoteTreeNode;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Index path from the root forest to one node.
pub type TreePath = Vec<usize>;

/// Errors from explicit tree edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEditError {
    /// No node exists at this path.
    InvalidPath(TreePath),
    /// The node at this path is a note reference, not a folder.
    NotAFolder(TreePath),
    /// Folder name is blank after trim.
    BlankName,
    /// The node already sits at root level.
    AlreadyAtRoot(TreePath),
}

impl Display for TreeEditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "no tree node at path {path:?}"),
            Self::NotAFolder(path) => write!(f, "tree node at path {path:?} is not a folder"),
            Self::BlankName => write!(f, "folder name must not be blank"),
            Self::AlreadyAtRoot(path) => write!(f, "tree node at path {path:?} is already at root"),
        }
    }
}

impl Error for TreeEditError {}

pub fn node_at<'a>(tree: &'a [NoteTreeNode], path: &[usize]) -> Option<&'a NoteTreeNode> {
    let (first, rest) = path.split_first()?;
    let mut node = tree.get(*first)?;
    for index in rest {
        match node {
            NoteTreeNode::Folder { children, .. } => node = children.get(*index)?,
            NoteTreeNode::NoteRef { .. } => return None,
        }
    }
    Some(node)
}

/// Children list of the folder at `path`; the empty path is the root forest.
fn children_mut<'a>(
    tree: &'a mut Vec<NoteTreeNode>,
    path: &[usize],
) -> Result<&'a mut Vec<NoteTreeNode>, TreeEditError> {
    let mut list = tree;
    for (depth, index) in path.iter().enumerate() {
        let node = list
            .get_mut(*index)
            .ok_or_else(|| TreeEditError::InvalidPath(path.to_vec()))?;
        list = match node {
            NoteTreeNode::Folder { children, .. } => children,
            NoteTreeNode::NoteRef { .. } => {
                return Err(TreeEditError::NotAFolder(path[..=depth].to_vec()))
            }
        };
    }
    Ok(list)
}

fn detach(tree: &mut Vec<NoteTreeNode>, path: &[usize]) -> Result<NoteTreeNode, TreeEditError> {
    let (index, parent) = path
        .split_last()
        .ok_or_else(|| TreeEditError::InvalidPath(Vec::new()))?;
    let siblings = children_mut(tree, parent)?;
    if *index >= siblings.len() {
        return Err(TreeEditError::InvalidPath(path.to_vec()));
    }
    Ok(siblings.remove(*index))
}

/// Appends an empty folder under `parent` (`None` = root level) and returns
/// its path.
pub fn create_folder(
    tree: &mut Vec<NoteTreeNode>,
    parent: Option<&[usize]>,
    name: &str,
) -> Result<TreePath, TreeEditError> {
    let name = normalize_folder_name(name)?;
    let parent = parent.unwrap_or(&[]);
    let siblings = children_mut(tree, parent)?;
    siblings.push(NoteTreeNode::folder(name, Vec::new()));
    let mut path = parent.to_vec();
    path.push(siblings.len() - 1);
    Ok(path)
}

pub fn rename_folder(
    tree: &mut Vec<NoteTreeNode>,
    path: &[usize],
    new_name: &str,
) -> Result<(), TreeEditError> {
    let new_name = normalize_folder_name(new_name)?;
    let (index, parent) = path
        .split_last()
        .ok_or_else(|| TreeEditError::InvalidPath(Vec::new()))?;
    let node = children_mut(tree, parent)?
        .get_mut(*index)
        .ok_or_else(|| TreeEditError::InvalidPath(path.to_vec()))?;
    match node {
        NoteTreeNode::Folder { name, .. } => {
            *name = new_name;
            Ok(())
        }
        NoteTreeNode::NoteRef { .. } => Err(TreeEditError::NotAFolder(path.to_vec())),
    }
}

/// Moves a node out of its folder, placing it right after that folder in
/// the grandparent list. Returns the new path.
pub fn move_up(tree: &mut Vec<NoteTreeNode>, path: &[usize]) -> Result<TreePath, TreeEditError> {
    if path.len() < 2 {
        return reject_root_move(tree, path);
    }
    let parent = &path[..path.len() - 1];
    let (parent_index, grandparent) = parent
        .split_last()
        .ok_or_else(|| TreeEditError::InvalidPath(path.to_vec()))?;
    let node = detach(tree, path)?;
    let target = children_mut(tree, grandparent)?;
    let insert_at = (parent_index + 1).min(target.len());
    target.insert(insert_at, node);
    let mut new_path = grandparent.to_vec();
    new_path.push(insert_at);
    Ok(new_path)
}

/// Moves a nested node to the end of the root level. Returns the new path.
pub fn move_to_root(
    tree: &mut Vec<NoteTreeNode>,
    path: &[usize],
) -> Result<TreePath, TreeEditError> {
    if path.len() < 2 {
        return reject_root_move(tree, path);
    }
    let node = detach(tree, path)?;
    tree.push(node);
    Ok(vec![tree.len() - 1])
}

fn reject_root_move(tree: &[NoteTreeNode], path: &[usize]) -> Result<TreePath, TreeEditError> {
    if node_at(tree, path).is_none() {
        return Err(TreeEditError::InvalidPath(path.to_vec()));
    }
    Err(TreeEditError::AlreadyAtRoot(path.to_vec()))
}

/// Removes the node at `path` and returns the note ids referenced inside it
/// in depth-first order.
pub fn remove_subtree(
    tree: &mut Vec<NoteTreeNode>,
    path: &[usize],
) -> Result<Vec<NoteId>, TreeEditError> {
    let removed = detach(tree, path)?;
    let mut ids = Vec::new();
    collect_ordered(std::slice::from_ref(&removed), &mut ids);
    Ok(ids)
}

fn collect_ordered(nodes: &[NoteTreeNode], out: &mut Vec<NoteId>) {
    for node in nodes {
        match node {
            NoteTreeNode::NoteRef { id } => out.push(id.clone()),
            NoteTreeNode::Folder { children, .. } => collect_ordered(children, out),
        }
    }
}

/// Moves (or inserts) the ref for `note_id` to the end of the folder at
/// `folder`. Any previous ref for that note is removed first.
pub fn place_note(
    tree: &mut Vec<NoteTreeNode>,
    note_id: &str,
    folder: &[usize],
) -> Result<(), TreeEditError> {
    match node_at(tree, folder) {
        Some(NoteTreeNode::Folder { .. }) => {}
        Some(NoteTreeNode::NoteRef { .. }) => {
            return Err(TreeEditError::NotAFolder(folder.to_vec()))
        }
        None => return Err(TreeEditError::InvalidPath(folder.to_vec())),
    }

    let mut target = folder.to_vec();
    while let Some(existing) = find_ref_path(tree, note_id) {
        detach(tree, &existing)?;
        shift_after_removal(&mut target, &existing);
    }
    children_mut(tree, &target)?.push(NoteTreeNode::note_ref(note_id));
    Ok(())
}

fn find_ref_path(nodes: &[NoteTreeNode], note_id: &str) -> Option<TreePath> {
    for (index, node) in nodes.iter().enumerate() {
        match node {
            NoteTreeNode::NoteRef { id } if id == note_id => return Some(vec![index]),
            NoteTreeNode::Folder { children, .. } => {
                if let Some(mut rest) = find_ref_path(children, note_id) {
                    rest.insert(0, index);
                    return Some(rest);
                }
            }
            NoteTreeNode::NoteRef { .. } => {}
        }
    }
    None
}

/// Adjusts `target` after the node at `removed` left its sibling list.
fn shift_after_removal(target: &mut TreePath, removed: &[usize]) {
    let depth = removed.len() - 1;
    if target.len() > depth
        && target[..depth] == removed[..depth]
        && target[depth] > removed[depth]
    {
        target[depth] -= 1;
    }
}

fn normalize_folder_name(value: &str) -> Result<String, TreeEditError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TreeEditError::BlankName);
    }
    Ok(trimmed.to_string())
}
