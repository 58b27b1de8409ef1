//! Core data layer for the Sidenote notes/tasks sidebar.
//! This crate is the single source of truth for data invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod storage;
pub mod store;
pub mod surface;
pub mod tree;

pub use config::{AppPaths, Settings};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::app_data::AppData;
pub use model::note::{NoteId, NoteIdGenerator, NoteRecord};
pub use model::task::{TaskFilter, TaskListCollection, TaskListError, TaskRecord};
pub use model::tree::NoteTreeNode;
pub use storage::{BackupEntry, FileGateway, PersistenceGateway, StorageError, StorageResult};
pub use store::{DataStore, RepairReport, SaveOutcome, SurfaceSnapshot, ZenCommit};
pub use surface::{
    Scheduler, SurfaceController, SurfaceError, SurfaceKind, SurfaceState, SurfaceView,
    TeardownTicket, TickReport, TransitionStep, ZenExit, ZenRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
