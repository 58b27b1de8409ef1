//! Surface ownership state machine.
//!
//! # Responsibility
//! - Decide which presentation surface owns the data at any moment.
//! - Order every handoff as flush, then teardown, then construct.
//!
//! # Invariants
//! - At most one surface is an active owner; Zen hides its origin.
//! - A destination surface is only built by `complete_teardown`, which runs
//!   strictly after the source surface was flushed.

use crate::model::note::{NoteId, NoteRecord};
use crate::model::task::TaskListCollection;
use crate::model::tree::NoteTreeNode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod controller;
pub mod schedule;

pub use controller::{SurfaceController, TickReport};
pub use schedule::{DueTasks, IntervalTimer, Scheduler};

/// The three presentation surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Popup,
    Window,
    Zen,
}

impl SurfaceKind {
    /// Stable name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Popup => "popup",
            Self::Window => "window",
            Self::Zen => "zen",
        }
    }

    /// Only the window edits tree structure directly.
    pub fn owns_tree(self) -> bool {
        matches!(self, Self::Window)
    }
}

/// Controller state. `None` targets mean "back to idle".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Idle,
    Active(SurfaceKind),
    TearingDown {
        from: SurfaceKind,
        target: Option<SurfaceKind>,
    },
}

impl SurfaceState {
    pub fn active_surface(self) -> Option<SurfaceKind> {
        match self {
            Self::Active(kind) => Some(kind),
            Self::Idle | Self::TearingDown { .. } => None,
        }
    }
}

/// Allowed `(from, to)` pairs; `None` is idle.
const ALLOWED_TRANSITIONS: &[(Option<SurfaceKind>, Option<SurfaceKind>)] = &[
    (None, Some(SurfaceKind::Popup)),
    (None, Some(SurfaceKind::Window)),
    (Some(SurfaceKind::Popup), Some(SurfaceKind::Window)),
    (Some(SurfaceKind::Window), Some(SurfaceKind::Popup)),
    (Some(SurfaceKind::Popup), Some(SurfaceKind::Zen)),
    (Some(SurfaceKind::Window), Some(SurfaceKind::Zen)),
    (Some(SurfaceKind::Zen), Some(SurfaceKind::Popup)),
    (Some(SurfaceKind::Zen), Some(SurfaceKind::Window)),
    (Some(SurfaceKind::Popup), None),
    (Some(SurfaceKind::Window), None),
    (Some(SurfaceKind::Zen), None),
];

pub fn is_transition_allowed(from: Option<SurfaceKind>, to: Option<SurfaceKind>) -> bool {
    ALLOWED_TRANSITIONS.contains(&(from, to))
}

/// Proof that a teardown was started; hand it back once the close
/// animation has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownTicket {
    sequence: u64,
    from: SurfaceKind,
    target: Option<SurfaceKind>,
}

impl TeardownTicket {
    pub fn from(&self) -> SurfaceKind {
        self.from
    }

    pub fn target(&self) -> Option<SurfaceKind> {
        self.target
    }
}

/// Data a freshly constructed surface renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceView {
    /// Notes under the root folder only.
    Popup {
        notes: Vec<NoteRecord>,
        task_lists: TaskListCollection,
        selected: Option<NoteId>,
    },
    Window {
        notes: Vec<NoteRecord>,
        note_tree: Vec<NoteTreeNode>,
        task_lists: TaskListCollection,
        selected: Option<NoteId>,
    },
    Zen {
        source: Option<NoteId>,
        text: String,
    },
}

impl SurfaceView {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Self::Popup { .. } => SurfaceKind::Popup,
            Self::Window { .. } => SurfaceKind::Window,
            Self::Zen { .. } => SurfaceKind::Zen,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        match self {
            Self::Popup { selected, .. } | Self::Window { selected, .. } => selected.as_deref(),
            Self::Zen { .. } => None,
        }
    }
}

/// Outcome of an activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionStep {
    /// Built immediately; nothing had to be torn down.
    Activated(SurfaceView),
    /// The source surface was flushed and must now run its close animation.
    TearingDown(TeardownTicket),
    AlreadyActive,
}

/// Entering Zen from the popup or the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZenRequest {
    /// Note being edited, `None` for a new draft.
    pub source_note: Option<NoteId>,
    pub text: String,
}

/// Leaving Zen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZenExit {
    pub text: String,
    /// "Save and clear": store the text but select nothing afterwards.
    pub clear_selection: bool,
}

/// Protocol violations reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    TransitionNotAllowed {
        from: Option<SurfaceKind>,
        to: Option<SurfaceKind>,
    },
    /// The caller is not the active surface.
    NotActiveOwner(SurfaceKind),
    /// A teardown is still running.
    TransitionInProgress,
    /// The ticket does not match the running teardown.
    StaleTicket,
    ZenNotActive,
    /// Zen must be left through `exit_zen` so its text is stored.
    ZenExitRequired,
}

fn state_label(kind: Option<SurfaceKind>) -> &'static str {
    kind.map(SurfaceKind::as_str).unwrap_or("idle")
}

impl Display for SurfaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransitionNotAllowed { from, to } => write!(
                f,
                "surface transition not allowed: {} -> {}",
                state_label(*from),
                state_label(*to)
            ),
            Self::NotActiveOwner(kind) => {
                write!(f, "surface `{}` is not the active owner", kind.as_str())
            }
            Self::TransitionInProgress => write!(f, "a surface transition is in progress"),
            Self::StaleTicket => write!(f, "teardown ticket does not match the running teardown"),
            Self::ZenNotActive => write!(f, "zen surface is not active"),
            Self::ZenExitRequired => write!(f, "zen surface must be exited explicitly"),
        }
    }
}

impl Error for SurfaceError {}
