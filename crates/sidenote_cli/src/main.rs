//! Process launcher.
//!
//! # Responsibility
//! - Resolve the profile directory, start logging and load the data file.
//! - Print a one-line summary and flush before exit.

use log::error;
use sidenote_core::config::SETTINGS_FILE_NAME;
use sidenote_core::tree::count_folders;
use sidenote_core::{
    core_version, default_log_level, init_logging, AppPaths, DataStore, FileGateway, SaveOutcome,
    Scheduler, Settings, SurfaceController,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

const HOME_ENV: &str = "SIDENOTE_HOME";

fn main() -> ExitCode {
    let base_dir = match resolve_base_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("sidenote: cannot resolve base directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let settings = Settings::load(&base_dir.join(SETTINGS_FILE_NAME));
    let paths = AppPaths::resolve(&base_dir, &settings);
    let level = settings
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_logging(&level, &paths.log_dir) {
        eprintln!("sidenote: logging disabled: {err}");
    }

    let mut store = DataStore::new(FileGateway::from_paths(&paths), settings.root_folder_name());
    let data = store.load_and_repair();
    println!("sidenote_core version={}", core_version());
    println!(
        "notes={} folders={} task_lists={}",
        data.notes.len(),
        count_folders(&data.note_tree),
        data.task_lists.lists.len()
    );

    let mut controller = SurfaceController::new(store, Scheduler::from_settings(&settings, Instant::now()));
    if controller.quit(None) == SaveOutcome::Deferred {
        error!("event=app_exit module=cli status=error reason=write_pending");
        eprintln!("sidenote: data file could not be written");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn resolve_base_dir() -> std::io::Result<PathBuf> {
    let raw = match std::env::var_os(HOME_ENV) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => std::env::current_dir()?,
    };
    std::path::absolute(raw)
}
