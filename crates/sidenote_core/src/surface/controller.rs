//! Surface controller: exclusivity and flush-before-handoff.
//!
//! # Invariants
//! - Every transition flushes the source surface's dirty snapshot into the
//!   store before the teardown ticket is handed out.
//! - Destination views are loaded from the store only in
//!   `complete_teardown`, never before the flush.
//! - Dirty snapshots are accepted only from the active surface.

use super::schedule::Scheduler;
use super::{
    is_transition_allowed, SurfaceError, SurfaceKind, SurfaceState, SurfaceView, TeardownTicket,
    TransitionStep, ZenExit, ZenRequest,
};
use crate::model::note::NoteId;
use crate::storage::{BackupEntry, PersistenceGateway, StorageResult};
use crate::store::{sort_for_display, DataStore, SaveOutcome, SurfaceSnapshot};
use log::{info, warn};
use std::time::Instant;

/// What one scheduler tick did.
#[derive(Debug)]
pub struct TickReport {
    /// `None` when autosave was not due or nothing was dirty.
    pub autosave: Option<SaveOutcome>,
    /// `None` when no backup was due.
    pub backup: Option<StorageResult<Option<BackupEntry>>>,
}

#[derive(Debug, Clone)]
struct ZenSession {
    return_to: SurfaceKind,
    source: Option<NoteId>,
    draft: String,
}

/// Owns the store and arbitrates which surface may use it.
pub struct SurfaceController<G: PersistenceGateway> {
    store: DataStore<G>,
    scheduler: Scheduler,
    state: SurfaceState,
    dirty: Option<(SurfaceKind, SurfaceSnapshot)>,
    zen: Option<ZenSession>,
    pending_selection: Option<NoteId>,
    outstanding: Option<TeardownTicket>,
    next_sequence: u64,
}

impl<G: PersistenceGateway> SurfaceController<G> {
    pub fn new(store: DataStore<G>, scheduler: Scheduler) -> Self {
        Self {
            store,
            scheduler,
            state: SurfaceState::Idle,
            dirty: None,
            zen: None,
            pending_selection: None,
            outstanding: None,
            next_sequence: 0,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn store(&self) -> &DataStore<G> {
        &self.store
    }

    /// Whether a dirty snapshot is waiting for the next flush point.
    pub fn has_dirty_snapshot(&self) -> bool {
        self.dirty.is_some()
    }

    /// Activates `kind`, pre-selecting `select` in the new view.
    ///
    /// From idle the view is built at once. From another surface the source
    /// is flushed and a teardown ticket is returned; the view is built by
    /// [`Self::complete_teardown`]. Requesting the active popup toggles it
    /// closed.
    pub fn request_activate(
        &mut self,
        kind: SurfaceKind,
        select: Option<NoteId>,
    ) -> Result<TransitionStep, SurfaceError> {
        match self.state {
            SurfaceState::TearingDown { .. } => Err(SurfaceError::TransitionInProgress),
            SurfaceState::Idle => {
                self.ensure_allowed(None, Some(kind))?;
                self.pending_selection = select;
                let view = self.construct(kind);
                self.state = SurfaceState::Active(kind);
                info!(
                    "event=surface_activate module=surface status=ok from=idle to={}",
                    kind.as_str()
                );
                Ok(TransitionStep::Activated(view))
            }
            SurfaceState::Active(SurfaceKind::Zen) => Err(SurfaceError::ZenExitRequired),
            // Zen needs the editor text, so it is entered through `enter_zen`.
            SurfaceState::Active(current) if kind == SurfaceKind::Zen => {
                Err(SurfaceError::TransitionNotAllowed {
                    from: Some(current),
                    to: Some(kind),
                })
            }
            SurfaceState::Active(current) if current == kind => match kind {
                SurfaceKind::Popup => {
                    self.flush_dirty();
                    Ok(TransitionStep::TearingDown(self.begin_teardown(current, None)))
                }
                SurfaceKind::Window | SurfaceKind::Zen => Ok(TransitionStep::AlreadyActive),
            },
            SurfaceState::Active(current) => {
                self.ensure_allowed(Some(current), Some(kind))?;
                self.flush_dirty();
                self.pending_selection = select;
                Ok(TransitionStep::TearingDown(
                    self.begin_teardown(current, Some(kind)),
                ))
            }
        }
    }

    /// Flushes the active surface and starts closing it without a
    /// successor.
    pub fn request_teardown(&mut self) -> Result<TeardownTicket, SurfaceError> {
        match self.state {
            SurfaceState::TearingDown { .. } => Err(SurfaceError::TransitionInProgress),
            SurfaceState::Idle => Err(SurfaceError::TransitionNotAllowed {
                from: None,
                to: None,
            }),
            SurfaceState::Active(SurfaceKind::Zen) => Err(SurfaceError::ZenExitRequired),
            SurfaceState::Active(current) => {
                self.flush_dirty();
                Ok(self.begin_teardown(current, None))
            }
        }
    }

    /// Finishes a teardown and builds the destination view, if any.
    pub fn complete_teardown(
        &mut self,
        ticket: TeardownTicket,
    ) -> Result<Option<SurfaceView>, SurfaceError> {
        if self.outstanding.as_ref() != Some(&ticket) {
            return Err(SurfaceError::StaleTicket);
        }
        self.outstanding = None;
        self.dirty = None;

        let Some(target) = ticket.target else {
            self.state = SurfaceState::Idle;
            self.pending_selection = None;
            info!(
                "event=surface_teardown module=surface status=ok from={} to=idle",
                ticket.from.as_str()
            );
            return Ok(None);
        };

        let view = self.construct(target);
        self.state = SurfaceState::Active(target);
        info!(
            "event=surface_activate module=surface status=ok from={} to={}",
            ticket.from.as_str(),
            target.as_str()
        );
        Ok(Some(view))
    }

    /// Hides the popup or window behind the Zen editor.
    pub fn enter_zen(&mut self, request: ZenRequest) -> Result<TeardownTicket, SurfaceError> {
        let current = match self.state {
            SurfaceState::TearingDown { .. } => return Err(SurfaceError::TransitionInProgress),
            SurfaceState::Idle => None,
            SurfaceState::Active(kind) => Some(kind),
        };
        self.ensure_allowed(current, Some(SurfaceKind::Zen))?;
        let Some(current) = current else {
            return Err(SurfaceError::TransitionNotAllowed {
                from: None,
                to: Some(SurfaceKind::Zen),
            });
        };

        self.flush_dirty();
        self.zen = Some(ZenSession {
            return_to: current,
            source: request.source_note,
            draft: request.text,
        });
        Ok(self.begin_teardown(current, Some(SurfaceKind::Zen)))
    }

    /// Keeps the latest Zen editor text so quitting cannot lose it.
    pub fn report_zen_draft(&mut self, text: impl Into<String>) -> Result<(), SurfaceError> {
        if self.state != SurfaceState::Active(SurfaceKind::Zen) {
            return Err(SurfaceError::ZenNotActive);
        }
        if let Some(session) = self.zen.as_mut() {
            session.draft = text.into();
        }
        Ok(())
    }

    /// Stores the Zen text, then starts closing Zen. The return surface is
    /// built by [`Self::complete_teardown`] with the stored note selected,
    /// unless `clear_selection` is set.
    pub fn exit_zen(&mut self, exit: ZenExit) -> Result<TeardownTicket, SurfaceError> {
        if self.state != SurfaceState::Active(SurfaceKind::Zen) {
            return Err(SurfaceError::ZenNotActive);
        }
        let session = self.zen.take();
        let return_to = session
            .as_ref()
            .map(|session| session.return_to)
            .unwrap_or(SurfaceKind::Popup);
        let source = session.and_then(|session| session.source);

        let commit = self.store.save_zen_note(source.as_deref(), &exit.text);
        self.pending_selection = if exit.clear_selection {
            None
        } else {
            commit.note_id
        };
        Ok(self.begin_teardown(SurfaceKind::Zen, Some(return_to)))
    }

    /// Records the active surface's working copy for the next flush point.
    pub fn report_dirty_snapshot(
        &mut self,
        kind: SurfaceKind,
        snapshot: SurfaceSnapshot,
    ) -> Result<(), SurfaceError> {
        self.ensure_owner(kind)?;
        match self.dirty.as_mut() {
            Some((_, pending)) => pending.absorb(snapshot),
            None => self.dirty = Some((kind, snapshot)),
        }
        Ok(())
    }

    /// Explicit save action from the active surface.
    pub fn save_now(&mut self, kind: SurfaceKind) -> Result<SaveOutcome, SurfaceError> {
        self.ensure_owner(kind)?;
        if self.dirty.is_some() {
            Ok(self.flush_dirty())
        } else {
            Ok(self.store.save())
        }
    }

    pub fn delete_note(&mut self, kind: SurfaceKind, id: &str) -> Result<SaveOutcome, SurfaceError> {
        self.delete_notes(kind, &[id.to_string()])
    }

    /// Deletes notes, also dropping them from the pending dirty snapshot so
    /// a later flush cannot bring them back.
    pub fn delete_notes(
        &mut self,
        kind: SurfaceKind,
        ids: &[NoteId],
    ) -> Result<SaveOutcome, SurfaceError> {
        self.ensure_owner(kind)?;
        if let Some((_, pending)) = self.dirty.as_mut() {
            for id in ids {
                pending.forget_note(id);
            }
        }
        Ok(self.store.delete_notes(ids))
    }

    /// Runs due periodic jobs. Autosave writes only when a dirty snapshot
    /// or a failed write is waiting.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let due = self.scheduler.poll(now);
        let autosave = (due.autosave && (self.dirty.is_some() || self.store.has_pending_write()))
            .then(|| self.flush_dirty());
        let backup = due.backup.then(|| self.create_backup());
        TickReport { autosave, backup }
    }

    pub fn create_backup(&mut self) -> StorageResult<Option<BackupEntry>> {
        let result = self.store.create_backup();
        if let Err(err) = &result {
            warn!("event=backup_create module=surface status=error error={}", err);
        }
        result
    }

    pub fn list_backups(&self) -> StorageResult<Vec<BackupEntry>> {
        self.store.list_backups()
    }

    pub fn delete_backup(&self, name: &str) -> StorageResult<()> {
        self.store.delete_backup(name)
    }

    /// Restores a backup and rebuilds the active surface's view from it.
    ///
    /// The active surface's unsaved snapshot is discarded. Returns `None`
    /// when no popup or window is active.
    pub fn restore_backup(&mut self, name: &str) -> StorageResult<Option<SurfaceView>> {
        self.store.restore_backup(name)?;
        self.dirty = None;
        match self.state.active_surface() {
            Some(kind) if kind != SurfaceKind::Zen => Ok(Some(self.construct(kind))),
            _ => Ok(None),
        }
    }

    /// Synchronous shutdown: stores any unsaved Zen draft, merges
    /// `final_snapshot` from the surface on screen, flushes and returns to
    /// idle.
    ///
    /// A surface still running its close animation owns the snapshot it
    /// reports here.
    pub fn quit(&mut self, final_snapshot: Option<SurfaceSnapshot>) -> SaveOutcome {
        let mut outcome = SaveOutcome::Unchanged;
        if let Some(session) = self.zen.take() {
            if self.zen_draft_is_unsaved(&session) {
                outcome = self
                    .store
                    .save_zen_note(session.source.as_deref(), &session.draft)
                    .outcome;
            }
        }

        if let Some(snapshot) = final_snapshot {
            let owner = match self.state {
                SurfaceState::Active(kind) | SurfaceState::TearingDown { from: kind, .. } => {
                    Some(kind)
                }
                SurfaceState::Idle => None,
            };
            match (owner, self.dirty.as_mut()) {
                (_, Some((_, pending))) => pending.absorb(snapshot),
                (Some(kind), None) => self.dirty = Some((kind, snapshot)),
                (None, None) => warn!(
                    "event=app_quit module=surface status=skipped reason=no_surface_for_snapshot"
                ),
            }
        }
        let flushed = self.flush_dirty();
        if flushed != SaveOutcome::Unchanged {
            outcome = flushed;
        }

        self.state = SurfaceState::Idle;
        self.outstanding = None;
        self.pending_selection = None;
        info!(
            "event=app_quit module=surface status={}",
            match outcome {
                SaveOutcome::Persisted => "persisted",
                SaveOutcome::Unchanged => "clean",
                SaveOutcome::Deferred => "write_failed",
            }
        );
        outcome
    }

    fn ensure_allowed(
        &self,
        from: Option<SurfaceKind>,
        to: Option<SurfaceKind>,
    ) -> Result<(), SurfaceError> {
        if is_transition_allowed(from, to) {
            Ok(())
        } else {
            Err(SurfaceError::TransitionNotAllowed { from, to })
        }
    }

    fn ensure_owner(&self, kind: SurfaceKind) -> Result<(), SurfaceError> {
        match self.state {
            SurfaceState::Active(active) if active == kind => Ok(()),
            SurfaceState::TearingDown { .. } => Err(SurfaceError::TransitionInProgress),
            _ => Err(SurfaceError::NotActiveOwner(kind)),
        }
    }

    /// A draft with no stored note is unsaved unless blank; a draft for a
    /// stored note is unsaved when its text differs.
    fn zen_draft_is_unsaved(&self, session: &ZenSession) -> bool {
        let stored = session
            .source
            .as_deref()
            .and_then(|id| self.store.data().notes.iter().find(|note| note.id == id));
        match stored {
            Some(note) => note.text != session.draft,
            None => !session.draft.trim().is_empty(),
        }
    }

    /// Merges the dirty snapshot, or retries a failed write.
    fn flush_dirty(&mut self) -> SaveOutcome {
        match self.dirty.take() {
            Some((kind, snapshot)) => self.store.merge_surface_snapshot(snapshot, kind.owns_tree()),
            None => self.store.flush(),
        }
    }

    fn begin_teardown(&mut self, from: SurfaceKind, target: Option<SurfaceKind>) -> TeardownTicket {
        self.next_sequence += 1;
        let ticket = TeardownTicket {
            sequence: self.next_sequence,
            from,
            target,
        };
        self.state = SurfaceState::TearingDown { from, target };
        self.outstanding = Some(ticket.clone());
        info!(
            "event=surface_teardown module=surface status=started from={} to={}",
            from.as_str(),
            target.map(SurfaceKind::as_str).unwrap_or("idle")
        );
        ticket
    }

    fn construct(&mut self, kind: SurfaceKind) -> SurfaceView {
        let data = self.store.load_and_repair();
        let selected = self.pending_selection.take();
        match kind {
            SurfaceKind::Popup => {
                let mut notes = self.store.notes_visible_under(self.store.root_folder());
                sort_for_display(&mut notes);
                SurfaceView::Popup {
                    notes,
                    task_lists: data.task_lists,
                    selected,
                }
            }
            SurfaceKind::Window => {
                let mut notes = data.notes;
                sort_for_display(&mut notes);
                SurfaceView::Window {
                    notes,
                    note_tree: data.note_tree,
                    task_lists: data.task_lists,
                    selected,
                }
            }
            SurfaceKind::Zen => {
                let (source, text) = match &self.zen {
                    Some(session) => (session.source.clone(), session.draft.clone()),
                    None => (None, String::new()),
                };
                SurfaceView::Zen { source, text }
            }
        }
    }
}
