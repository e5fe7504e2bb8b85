//! Session logger: routes the `log` facade into a single file in the OS data
//! directory.
//!
//! The file is **truncated at each launch**, so it only ever holds output
//! from the most recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\Strata\strata.log`
//!   Linux:    `~/.local/share/Strata/strata.log`
//!   macOS:    `~/Library/Application Support/Strata/strata.log`
//!
//! `RUST_LOG` filters as usual; without it everything at `info` and above is
//! written.  Panics are mirrored into the log before the default handler runs.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Path of the current session log, once `init` has opened it.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Initialise the session logger at the platform location.  Safe to call
/// more than once; only the first call installs anything.
pub fn init() {
    init_at(&log_file_path());
}

/// Initialise the session logger writing to `path`.  When the file cannot be
/// opened, output falls back to stderr.
pub fn init_at(path: &Path) {
    if LOG_PATH.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs().format_module_path(false);

    match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            let _ = LOG_PATH.set(path.to_path_buf());
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            builder.target(env_logger::Target::Stderr);
        }
    }

    if builder.try_init().is_err() {
        // another logger owns the facade already (test harnesses)
        return;
    }

    log::info!("=== Strata {} session started ===", env!("CARGO_PKG_VERSION"));
    log::info!("Log file: {}", path.display());

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC: {}", info);
        log::logger().flush();
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    data_dir().join("Strata").join("strata.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}
