//! Per-user directories for hexloader
//!
//! - config: where `config.json` lives
//! - downloads: the default output directory
//! - logs: where the tracing log file is written

use std::path::PathBuf;

const APP_DIR: &str = "hexloader";

/// Returns the configuration directory
/// - macOS: ~/Library/Application Support/hexloader
/// - Windows: %APPDATA%\hexloader
/// - Linux: ~/.config/hexloader
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Returns the path of the persisted settings file
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

/// Returns the default download directory (`~/Downloads`)
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

/// Returns the log directory
pub fn log_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library/Logs")
            .join(APP_DIR)
    }

    #[cfg(target_os = "linux")]
    {
        dirs::state_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("logs")
    }
}
