use serde_json::{json, Value};
use sidenote_core::tree::{collect_referenced_ids, find_folder};
use sidenote_core::{
    BackupEntry, DataStore, FileGateway, NoteRecord, NoteTreeNode, PersistenceGateway,
    SaveOutcome, StorageError, StorageResult, SurfaceSnapshot, TaskListCollection,
};
use std::cell::Cell;
use std::collections::HashSet;
use std::path::Path;

const ROOT: &str = "Notes";

/// File gateway whose writes can be switched off.
struct FlakyGateway {
    inner: FileGateway,
    fail_writes: Cell<bool>,
}

impl PersistenceGateway for FlakyGateway {
    fn read_app_data(&self) -> StorageResult<Vec<u8>> {
        self.inner.read_app_data()
    }

    fn write_app_data(&self, bytes: &[u8]) -> StorageResult<()> {
        if self.fail_writes.get() {
            return Err(StorageError::Write {
                path: self.inner.data_file().to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.write_app_data(bytes)
    }

    fn create_backup(&self) -> StorageResult<Option<BackupEntry>> {
        self.inner.create_backup()
    }

    fn list_backups(&self) -> StorageResult<Vec<BackupEntry>> {
        self.inner.list_backups()
    }

    fn restore_backup(&self, name: &str) -> StorageResult<()> {
        self.inner.restore_backup(name)
    }

    fn delete_backup(&self, name: &str) -> StorageResult<()> {
        self.inner.delete_backup(name)
    }
}

fn file_store(dir: &Path) -> DataStore<FileGateway> {
    DataStore::new(
        FileGateway::new(dir.join("data.json"), dir.join("backups")),
        ROOT,
    )
}

fn flaky_store(dir: &Path) -> DataStore<FlakyGateway> {
    DataStore::new(
        FlakyGateway {
            inner: FileGateway::new(dir.join("data.json"), dir.join("backups")),
            fail_writes: Cell::new(false),
        },
        ROOT,
    )
}

fn write_raw(dir: &Path, value: &Value) {
    std::fs::write(dir.join("data.json"), serde_json::to_vec(value).unwrap()).unwrap();
}

fn read_raw(dir: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(dir.join("data.json")).unwrap()).unwrap()
}

#[test]
fn first_run_seeds_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = file_store(dir.path());

    let data = store.load_and_repair();
    assert!(store.last_repair().seeded);
    assert_eq!(data.notes.len(), 1);
    assert!(data.notes[0].pinned);
    assert_eq!(
        data.note_tree,
        vec![NoteTreeNode::folder(
            ROOT,
            vec![NoteTreeNode::note_ref(data.notes[0].id.clone())]
        )]
    );

    let on_disk = read_raw(dir.path());
    assert_eq!(on_disk["active_task_list"], "Default");
    assert_eq!(on_disk["notes"][0]["timestamp"], Value::from(data.notes[0].id.clone()));
}

#[test]
fn clean_file_loads_without_repair() {
    let dir = tempfile::tempdir().unwrap();
    file_store(dir.path()).load_and_repair();

    let mut second = file_store(dir.path());
    second.load_and_repair();
    assert!(!second.last_repair().changed());
}

#[test]
fn duplicate_ids_become_distinct_with_one_ref_each() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        &json!({
            "notes": [
                {"timestamp": "a", "text": "first", "pinned": false},
                {"timestamp": "a", "text": "second", "pinned": false}
            ],
            "note_tree": [],
            "task_lists": {"Default": []},
            "active_task_list": "Default"
        }),
    );

    let mut store = file_store(dir.path());
    let data = store.load_and_repair();
    let ids: HashSet<String> = data.notes.iter().map(|note| note.id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("a"));
    assert_eq!(collect_referenced_ids(&data.note_tree), ids);
    assert_eq!(store.last_repair().reassigned_ids, 1);

    let on_disk = read_raw(dir.path());
    assert_eq!(on_disk["notes"].as_array().unwrap().len(), 2);
    assert_ne!(on_disk["notes"][0]["timestamp"], on_disk["notes"][1]["timestamp"]);
}

#[test]
fn dedupe_rewrites_tree_refs_consistently() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        &json!({
            "notes": [
                {"timestamp": "a", "text": "one"},
                {"timestamp": "a", "text": "two"},
                {"timestamp": "", "text": "three"},
                {"text": "four"}
            ],
            "note_tree": [
                {"type": "folder", "name": "Work", "children": [{"type": "note", "timestamp": "a"}]}
            ],
            "task_lists": {"Default": []},
            "active_task_list": "Default"
        }),
    );

    let mut store = file_store(dir.path());
    let data = store.load_and_repair();

    let ids: Vec<String> = data.notes.iter().map(|note| note.id.clone()).collect();
    let unique: HashSet<String> = ids.iter().cloned().collect();
    assert_eq!(unique.len(), 4);
    assert!(ids.iter().all(|id| !id.is_empty()));
    assert_eq!(collect_referenced_ids(&data.note_tree), unique);

    let replacement = ids[1].clone();
    assert_eq!(
        find_folder(&data.note_tree, "Work"),
        Some(&NoteTreeNode::folder(
            "Work",
            vec![NoteTreeNode::note_ref(replacement)]
        ))
    );
    let root_ids = collect_referenced_ids(std::slice::from_ref(
        find_folder(&data.note_tree, ROOT).unwrap(),
    ));
    assert!(root_ids.contains("a"));
}

#[test]
fn malformed_file_is_preserved_in_backups_before_seeding() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.json"), b"{not json").unwrap();

    let mut store = file_store(dir.path());
    let data = store.load_and_repair();
    assert!(store.last_repair().seeded);
    assert_eq!(data.notes.len(), 1);

    let backups = store.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    let preserved = std::fs::read(dir.path().join("backups").join(&backups[0].name)).unwrap();
    assert_eq!(preserved, b"{not json");
    assert!(read_raw(dir.path()).is_object());
}

#[test]
fn wrong_shapes_are_replaced_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        &json!({
            "notes": 5,
            "note_tree": [{"type": "folder", "name": "Keep", "children": []}],
            "task_lists": {"Home": [{"text": "water plants", "completed": false}]},
            "active_task_list": "Missing"
        }),
    );

    let mut store = file_store(dir.path());
    let data = store.load_and_repair();
    let report = store.last_repair().clone();
    assert!(report.shape_fixes >= 1);
    assert!(report.root_folder_created);
    assert!(report.task_lists_normalized);
    assert!(data.notes.is_empty());
    assert_eq!(data.task_lists.active_name(), "Home");
    assert_eq!(
        data.note_tree,
        vec![
            NoteTreeNode::folder(ROOT, Vec::new()),
            NoteTreeNode::folder("Keep", Vec::new()),
        ]
    );
}

#[test]
fn merge_keeps_notes_missing_from_a_partial_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = file_store(dir.path());
    let seed = store.load_and_repair();
    let welcome = seed.notes[0].clone();

    let outcome = store.merge_surface_snapshot(
        SurfaceSnapshot {
            notes: Some(vec![NoteRecord::new("2030-01-01 00:00:00.000001", "new")]),
            ..SurfaceSnapshot::default()
        },
        false,
    );
    assert_eq!(outcome, SaveOutcome::Persisted);

    let edited = NoteRecord::new(welcome.id.clone(), "edited welcome").with_pinned(true);
    store.merge_surface_snapshot(
        SurfaceSnapshot {
            notes: Some(vec![edited.clone()]),
            ..SurfaceSnapshot::default()
        },
        false,
    );

    let data = store.data().clone();
    assert_eq!(data.notes.len(), 2);
    assert_eq!(data.note(&welcome.id), Some(&edited));
    assert_eq!(collect_referenced_ids(&data.note_tree).len(), 2);
    assert_eq!(read_raw(dir.path())["notes"].as_array().unwrap().len(), 2);
}

#[test]
fn merge_applies_tree_only_for_owner_and_reconciles() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = file_store(dir.path());
    let seed = store.load_and_repair();
    let welcome_id = seed.notes[0].id.clone();
    let tree_without_refs = vec![NoteTreeNode::folder("Projects", Vec::new())];

    let ignored = store.merge_surface_snapshot(
        SurfaceSnapshot {
            note_tree: Some(tree_without_refs.clone()),
            ..SurfaceSnapshot::default()
        },
        false,
    );
    assert_eq!(ignored, SaveOutcome::Unchanged);
    assert_eq!(store.data().note_tree, seed.note_tree);

    store.merge_surface_snapshot(
        SurfaceSnapshot {
            note_tree: Some(tree_without_refs),
            ..SurfaceSnapshot::default()
        },
        true,
    );
    assert_eq!(
        store.data().note_tree,
        vec![
            NoteTreeNode::folder(ROOT, vec![NoteTreeNode::note_ref(welcome_id)]),
            NoteTreeNode::folder("Projects", Vec::new()),
        ]
    );
}

#[test]
fn merge_assigns_ids_to_new_notes_and_replaces_task_lists() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = file_store(dir.path());
    store.load_and_repair();

    let mut tasks = TaskListCollection::default();
    tasks.add_list("Errands").unwrap();
    tasks.add_task("post office").unwrap();
    store.merge_surface_snapshot(
        SurfaceSnapshot {
            notes: Some(vec![NoteRecord::new("", "draft")]),
            task_lists: Some(tasks.clone()),
            note_tree: None,
        },
        false,
    );

    let data = store.data();
    assert_eq!(data.notes.len(), 2);
    assert!(data.notes.iter().all(|note| !note.id.is_empty()));
    assert_eq!(data.task_lists, tasks);
    assert_eq!(read_raw(dir.path())["active_task_list"], "Errands");
}

#[test]
fn delete_note_in_nested_folder_leaves_folder_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        &json!({
            "notes": [{"timestamp": "a", "text": "alpha"}, {"timestamp": "b", "text": "bravo"}],
            "note_tree": [
                {"type": "folder", "name": ROOT, "children": [
                    {"type": "note", "timestamp": "b"},
                    {"type": "folder", "name": "Sub", "children": [{"type": "note", "timestamp": "a"}]}
                ]}
            ],
            "task_lists": {"Default": []},
            "active_task_list": "Default"
        }),
    );
    let mut store = file_store(dir.path());
    store.load_and_repair();

    assert_eq!(store.delete_note("a"), SaveOutcome::Persisted);
    let data = store.data();
    assert!(data.note("a").is_none());
    assert_eq!(
        data.note_tree,
        vec![NoteTreeNode::folder(
            ROOT,
            vec![
                NoteTreeNode::note_ref("b"),
                NoteTreeNode::folder("Sub", Vec::new()),
            ]
        )]
    );
    assert_eq!(data.note("b").unwrap().text, "bravo");

    let reloaded = file_store(dir.path()).load_and_repair();
    assert_eq!(reloaded.note_tree, data.note_tree);
    assert_eq!(store.delete_note("missing"), SaveOutcome::Unchanged);
}

#[test]
fn visible_notes_are_limited_to_the_folder_subtree() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        &json!({
            "notes": [
                {"timestamp": "in-root", "text": ""},
                {"timestamp": "in-sub", "text": ""},
                {"timestamp": "elsewhere", "text": ""}
            ],
            "note_tree": [
                {"type": "folder", "name": ROOT, "children": [
                    {"type": "note", "timestamp": "in-root"},
                    {"type": "folder", "name": "Sub", "children": [{"type": "note", "timestamp": "in-sub"}]}
                ]},
                {"type": "folder", "name": "Archive", "children": [{"type": "note", "timestamp": "elsewhere"}]}
            ],
            "task_lists": {"Default": []},
            "active_task_list": "Default"
        }),
    );
    let mut store = file_store(dir.path());
    store.load_and_repair();

    let visible: Vec<String> = store
        .notes_visible_under(ROOT)
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(visible, vec!["in-root".to_string(), "in-sub".to_string()]);
    assert!(store.notes_visible_under("Nope").is_empty());
}

#[test]
fn failed_write_keeps_previous_file_and_retries_later() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = flaky_store(dir.path());
    store.load_and_repair();
    let before = std::fs::read(dir.path().join("data.json")).unwrap();

    store.gateway().fail_writes.set(true);
    let outcome = store.merge_surface_snapshot(
        SurfaceSnapshot {
            notes: Some(vec![NoteRecord::new("x", "unsaved")]),
            ..SurfaceSnapshot::default()
        },
        false,
    );
    assert_eq!(outcome, SaveOutcome::Deferred);
    assert!(store.has_pending_write());
    assert_eq!(std::fs::read(dir.path().join("data.json")).unwrap(), before);

    // Reload while the write is still failing serves the cache.
    let served = store.load_and_repair();
    assert!(served.note("x").is_some());

    store.gateway().fail_writes.set(false);
    assert_eq!(store.flush(), SaveOutcome::Persisted);
    assert!(!store.has_pending_write());
    let on_disk = read_raw(dir.path());
    assert!(on_disk["notes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|note| note["timestamp"] == "x"));
    assert_eq!(store.flush(), SaveOutcome::Unchanged);
}

#[test]
fn zen_save_updates_creates_or_skips() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = file_store(dir.path());
    let seed = store.load_and_repair();
    let welcome_id = seed.notes[0].id.clone();

    let skipped = store.save_zen_note(None, "   ");
    assert_eq!(skipped.note_id, None);
    assert_eq!(store.data().notes.len(), 1);

    let updated = store.save_zen_note(Some(&welcome_id), "rewritten");
    assert_eq!(updated.note_id.as_deref(), Some(welcome_id.as_str()));
    assert_eq!(store.data().note(&welcome_id).unwrap().text, "rewritten");

    let created = store.save_zen_note(Some("deleted-meanwhile"), "fresh");
    let new_id = created.note_id.unwrap();
    assert_eq!(created.outcome, SaveOutcome::Persisted);
    assert_ne!(new_id, "deleted-meanwhile");
    let root = find_folder(&store.data().note_tree, ROOT).unwrap();
    assert!(collect_referenced_ids(std::slice::from_ref(root)).contains(&new_id));
}

#[test]
fn markdown_export_writes_tree_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = file_store(dir.path());
    let seed = store.load_and_repair();

    let target = dir.path().join("export").join("notes.md");
    store.export_markdown(&target).unwrap();
    let markdown = std::fs::read_to_string(&target).unwrap();
    assert!(markdown.starts_with("# Notes export\n\n"));
    assert!(markdown.contains(&format!("## [{ROOT}] {}", seed.notes[0].id)));
    assert!(markdown.contains(&seed.notes[0].text));
}
