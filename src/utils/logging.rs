//! tracing subscriber setup

use crate::utils::platform;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;

pub const LOG_FILE_NAME: &str = "hexloader.log";

/// Install the global subscriber. Logs go to `hexloader.log` in the
/// per-user log directory, or to stderr if that file can't be opened.
///
/// Returns the log file path when file logging is active.
pub fn init(verbose: bool) -> Option<PathBuf> {
    init_in(&platform::log_dir(), verbose)
}

pub fn init_in(dir: &Path, verbose: bool) -> Option<PathBuf> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let path = dir.join(LOG_FILE_NAME);

    let file = std::fs::create_dir_all(dir)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    match file {
        Ok(file) => {
            let installed = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok();
            installed.then_some(path)
        }
        Err(e) => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .try_init();
            tracing::warn!("Cannot open log file {:?}: {}, logging to stderr", path, e);
            None
        }
    }
}
