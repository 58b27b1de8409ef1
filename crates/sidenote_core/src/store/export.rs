//! Markdown export of the note tree.

use crate::model::app_data::AppData;
use crate::model::note::NoteRecord;
use crate::model::tree::NoteTreeNode;
use std::collections::HashMap;
use std::fmt::Write;

const EXPORT_TITLE: &str = "# Notes export";

/// Renders every referenced note depth-first with its folder path.
pub fn render_markdown(data: &AppData) -> String {
    let notes: HashMap<&str, &NoteRecord> = data
        .notes
        .iter()
        .map(|note| (note.id.as_str(), note))
        .collect();
    let mut out = format!("{EXPORT_TITLE}\n\n");
    let mut path = Vec::new();
    render_nodes(&data.note_tree, &notes, &mut path, &mut out);
    out
}

fn render_nodes<'a>(
    nodes: &'a [NoteTreeNode],
    notes: &HashMap<&str, &NoteRecord>,
    path: &mut Vec<&'a str>,
    out: &mut String,
) {
    for node in nodes {
        match node {
            NoteTreeNode::Folder { name, children } => {
                path.push(name.as_str());
                render_nodes(children, notes, path, out);
                path.pop();
            }
            NoteTreeNode::NoteRef { id } => {
                let Some(note) = notes.get(id.as_str()) else {
                    continue;
                };
                // Writing into a String cannot fail.
                let _ = write!(
                    out,
                    "## [{}] {}\n\n{}\n\n---\n\n",
                    path.join(" / "),
                    note.id,
                    note.text
                );
            }
        }
    }
}
