use serde_json::Value;
use sidenote_core::{
    DataStore, FileGateway, NoteRecord, NoteTreeNode, SaveOutcome, Scheduler, SurfaceController,
    SurfaceError, SurfaceKind, SurfaceSnapshot, SurfaceState, SurfaceView, TransitionStep,
    ZenExit, ZenRequest,
};
use std::path::Path;
use std::time::{Duration, Instant};

const ROOT: &str = "Notes";

fn controller(dir: &Path, now: Instant) -> SurfaceController<FileGateway> {
    let store = DataStore::new(
        FileGateway::new(dir.join("data.json"), dir.join("backups")),
        ROOT,
    );
    SurfaceController::new(
        store,
        Scheduler::new(Duration::from_secs(10), Duration::from_secs(600), now),
    )
}

fn read_raw(dir: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(dir.join("data.json")).unwrap()).unwrap()
}

fn note_text_on_disk(dir: &Path, id: &str) -> Option<String> {
    read_raw(dir)["notes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|note| note["timestamp"] == id)
        .map(|note| note["text"].as_str().unwrap_or_default().to_string())
}

fn activate_popup(controller: &mut SurfaceController<FileGateway>) -> SurfaceView {
    match controller
        .request_activate(SurfaceKind::Popup, None)
        .unwrap()
    {
        TransitionStep::Activated(view) => view,
        other => panic!("unexpected step {other:?}"),
    }
}

fn edit(id: &str, text: &str) -> SurfaceSnapshot {
    SurfaceSnapshot {
        notes: Some(vec![NoteRecord::new(id, text)]),
        ..SurfaceSnapshot::default()
    }
}

#[test]
fn popup_to_window_flushes_dirty_note_before_teardown_completes() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    let view = activate_popup(&mut controller);
    let SurfaceView::Popup { notes, .. } = view else {
        panic!("popup view expected");
    };
    let id = notes[0].id.clone();

    controller
        .report_dirty_snapshot(SurfaceKind::Popup, edit(&id, "unsaved edit"))
        .unwrap();
    let step = controller
        .request_activate(SurfaceKind::Window, Some(id.clone()))
        .unwrap();
    let TransitionStep::TearingDown(ticket) = step else {
        panic!("teardown expected");
    };

    // The close animation has not finished yet, but the edit is on disk.
    assert_eq!(
        controller.state(),
        SurfaceState::TearingDown {
            from: SurfaceKind::Popup,
            target: Some(SurfaceKind::Window)
        }
    );
    assert_eq!(note_text_on_disk(dir.path(), &id).as_deref(), Some("unsaved edit"));

    let view = controller.complete_teardown(ticket).unwrap().unwrap();
    let SurfaceView::Window {
        notes,
        note_tree,
        selected,
        ..
    } = view
    else {
        panic!("window view expected");
    };
    assert_eq!(selected.as_deref(), Some(id.as_str()));
    assert_eq!(notes[0].text, "unsaved edit");
    assert_eq!(note_tree[0].folder_name(), Some(ROOT));
    assert_eq!(controller.state(), SurfaceState::Active(SurfaceKind::Window));
}

#[test]
fn requests_during_teardown_are_rejected_and_tickets_are_single_use() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    activate_popup(&mut controller);

    let TransitionStep::TearingDown(ticket) = controller
        .request_activate(SurfaceKind::Window, None)
        .unwrap()
    else {
        panic!("teardown expected");
    };
    assert_eq!(
        controller.request_activate(SurfaceKind::Popup, None),
        Err(SurfaceError::TransitionInProgress)
    );
    assert_eq!(
        controller.report_dirty_snapshot(SurfaceKind::Popup, edit("x", "late")),
        Err(SurfaceError::TransitionInProgress)
    );

    controller.complete_teardown(ticket.clone()).unwrap();
    assert_eq!(
        controller.complete_teardown(ticket),
        Err(SurfaceError::StaleTicket)
    );
}

#[test]
fn only_the_active_surface_may_report_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    assert_eq!(
        controller.report_dirty_snapshot(SurfaceKind::Window, SurfaceSnapshot::default()),
        Err(SurfaceError::NotActiveOwner(SurfaceKind::Window))
    );
    activate_popup(&mut controller);
    assert_eq!(
        controller.report_dirty_snapshot(SurfaceKind::Window, SurfaceSnapshot::default()),
        Err(SurfaceError::NotActiveOwner(SurfaceKind::Window))
    );
}

#[test]
fn popup_request_toggles_and_window_request_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    activate_popup(&mut controller);

    let TransitionStep::TearingDown(ticket) = controller
        .request_activate(SurfaceKind::Popup, None)
        .unwrap()
    else {
        panic!("toggle teardown expected");
    };
    assert_eq!(ticket.target(), None);
    assert_eq!(controller.complete_teardown(ticket).unwrap(), None);
    assert_eq!(controller.state(), SurfaceState::Idle);

    let step = controller.request_activate(SurfaceKind::Window, None).unwrap();
    assert!(matches!(step, TransitionStep::Activated(SurfaceView::Window { .. })));
    assert_eq!(
        controller.request_activate(SurfaceKind::Window, None),
        Ok(TransitionStep::AlreadyActive)
    );
}

#[test]
fn zen_round_trip_creates_note_and_selects_it_on_return() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    activate_popup(&mut controller);

    assert!(matches!(
        controller.request_activate(SurfaceKind::Zen, None),
        Err(SurfaceError::TransitionNotAllowed { .. })
    ));

    let ticket = controller
        .enter_zen(ZenRequest {
            source_note: None,
            text: "draft".to_string(),
        })
        .unwrap();
    let zen_view = controller.complete_teardown(ticket).unwrap().unwrap();
    assert_eq!(
        zen_view,
        SurfaceView::Zen {
            source: None,
            text: "draft".to_string()
        }
    );
    assert_eq!(
        controller.request_activate(SurfaceKind::Window, None),
        Err(SurfaceError::ZenExitRequired)
    );

    let ticket = controller
        .exit_zen(ZenExit {
            text: "finished thought".to_string(),
            clear_selection: false,
        })
        .unwrap();
    assert_eq!(ticket.target(), Some(SurfaceKind::Popup));
    let view = controller.complete_teardown(ticket).unwrap().unwrap();

    let selected = view.selected().unwrap().to_string();
    assert_eq!(
        note_text_on_disk(dir.path(), &selected).as_deref(),
        Some("finished thought")
    );
    let SurfaceView::Popup { notes, .. } = view else {
        panic!("popup view expected");
    };
    assert!(notes.iter().any(|note| note.id == selected));
}

#[test]
fn zen_exit_with_clear_selection_updates_source_without_selecting() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    controller.request_activate(SurfaceKind::Window, None).unwrap();
    let source = controller.store().data().notes[0].id.clone();

    let ticket = controller
        .enter_zen(ZenRequest {
            source_note: Some(source.clone()),
            text: "welcome".to_string(),
        })
        .unwrap();
    controller.complete_teardown(ticket).unwrap();

    let ticket = controller
        .exit_zen(ZenExit {
            text: "rewritten in zen".to_string(),
            clear_selection: true,
        })
        .unwrap();
    let view = controller.complete_teardown(ticket).unwrap().unwrap();
    assert_eq!(view.kind(), SurfaceKind::Window);
    assert_eq!(view.selected(), None);
    assert_eq!(
        note_text_on_disk(dir.path(), &source).as_deref(),
        Some("rewritten in zen")
    );
    assert_eq!(controller.store().data().notes.len(), 1);
}

#[test]
fn quit_from_zen_keeps_the_reported_draft() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    activate_popup(&mut controller);
    let ticket = controller.enter_zen(ZenRequest::default()).unwrap();
    controller.complete_teardown(ticket).unwrap();

    controller.report_zen_draft("typed before quit").unwrap();
    assert_eq!(controller.quit(None), SaveOutcome::Persisted);
    assert_eq!(controller.state(), SurfaceState::Idle);

    let texts: Vec<String> = read_raw(dir.path())["notes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|note| note["text"].as_str().unwrap().to_string())
        .collect();
    assert!(texts.contains(&"typed before quit".to_string()));
}

#[test]
fn quit_from_zen_stores_a_new_draft_that_was_never_edited() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    activate_popup(&mut controller);
    let ticket = controller
        .enter_zen(ZenRequest {
            source_note: None,
            text: "carried into zen".to_string(),
        })
        .unwrap();
    controller.complete_teardown(ticket).unwrap();

    assert_eq!(controller.quit(None), SaveOutcome::Persisted);
    let texts: Vec<String> = read_raw(dir.path())["notes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|note| note["text"].as_str().unwrap().to_string())
        .collect();
    assert!(texts.contains(&"carried into zen".to_string()));
}

#[test]
fn quit_from_zen_skips_write_when_source_text_is_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    let SurfaceView::Popup { notes, .. } = activate_popup(&mut controller) else {
        panic!("popup view expected");
    };
    let ticket = controller
        .enter_zen(ZenRequest {
            source_note: Some(notes[0].id.clone()),
            text: notes[0].text.clone(),
        })
        .unwrap();
    controller.complete_teardown(ticket).unwrap();

    assert_eq!(controller.quit(None), SaveOutcome::Unchanged);
    assert_eq!(controller.store().data().notes.len(), 1);
}

#[test]
fn quit_during_teardown_keeps_the_closing_surface_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    activate_popup(&mut controller);
    let step = controller
        .request_activate(SurfaceKind::Window, None)
        .unwrap();
    assert!(matches!(step, TransitionStep::TearingDown(_)));

    assert_eq!(
        controller.quit(Some(edit("late", "final edit"))),
        SaveOutcome::Persisted
    );
    assert_eq!(controller.state(), SurfaceState::Idle);
    assert_eq!(
        note_text_on_disk(dir.path(), "late").as_deref(),
        Some("final edit")
    );
}

#[test]
fn quit_merges_final_snapshot_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    controller.request_activate(SurfaceKind::Window, None).unwrap();

    let snapshot = SurfaceSnapshot {
        notes: Some(vec![NoteRecord::new("late", "written at exit")]),
        note_tree: Some(vec![
            NoteTreeNode::folder(ROOT, Vec::new()),
            NoteTreeNode::folder("Ideas", vec![NoteTreeNode::note_ref("late")]),
        ]),
        task_lists: None,
    };
    assert_eq!(controller.quit(Some(snapshot)), SaveOutcome::Persisted);

    let on_disk = read_raw(dir.path());
    assert_eq!(on_disk["note_tree"][1]["name"], "Ideas");
    assert_eq!(on_disk["note_tree"][1]["children"][0]["timestamp"], "late");
    assert_eq!(controller.quit(None), SaveOutcome::Unchanged);
}

#[test]
fn autosave_tick_writes_only_dirty_data() {
    let dir = tempfile::tempdir().unwrap();
    let start = Instant::now();
    let mut controller = controller(dir.path(), start);
    activate_popup(&mut controller);
    let id = controller.store().data().notes[0].id.clone();

    let report = controller.tick(start + Duration::from_secs(11));
    assert_eq!(report.autosave, None);
    assert!(report.backup.is_none());

    controller
        .report_dirty_snapshot(SurfaceKind::Popup, edit(&id, "autosaved"))
        .unwrap();
    let early = controller.tick(start + Duration::from_secs(15));
    assert_eq!(early.autosave, None);
    assert!(controller.has_dirty_snapshot());

    let due = controller.tick(start + Duration::from_secs(22));
    assert_eq!(due.autosave, Some(SaveOutcome::Persisted));
    assert!(!controller.has_dirty_snapshot());
    assert_eq!(note_text_on_disk(dir.path(), &id).as_deref(), Some("autosaved"));
}

#[test]
fn backup_tick_snapshots_the_persisted_file() {
    let dir = tempfile::tempdir().unwrap();
    let start = Instant::now();
    let mut controller = controller(dir.path(), start);
    activate_popup(&mut controller);

    let report = controller.tick(start + Duration::from_secs(601));
    let entry = report.backup.unwrap().unwrap().unwrap();
    let copied = std::fs::read(dir.path().join("backups").join(&entry.name)).unwrap();
    assert_eq!(copied, std::fs::read(dir.path().join("data.json")).unwrap());
}

#[test]
fn deleting_a_note_drops_it_from_the_pending_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), Instant::now());
    controller.request_activate(SurfaceKind::Window, None).unwrap();

    controller
        .report_dirty_snapshot(SurfaceKind::Window, edit("temp", "soon gone"))
        .unwrap();
    controller
        .delete_note(SurfaceKind::Window, "temp")
        .unwrap();
    controller.save_now(SurfaceKind::Window).unwrap();
    assert_eq!(note_text_on_disk(dir.path(), "temp"), None);
}
