//! Application configuration

use crate::downloader::options::{
    DownloadRequest, MediaFormat, NetworkSettings, Quality, DEFAULT_USER_AGENT,
};
use crate::utils::error::HexError;
use crate::utils::platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// User settings, persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download location
    pub output_path: PathBuf,

    pub quality: Quality,

    pub format: MediaFormat,

    /// Download and embed subtitles
    pub subtitle: bool,

    /// Embed the thumbnail as cover art
    pub thumbnail: bool,

    /// Embed metadata tags
    pub metadata: bool,

    pub user_agent: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_path: platform::default_download_dir(),
            quality: Quality::Best,
            format: MediaFormat::Mp4,
            subtitle: false,
            thumbnail: true,
            metadata: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            cookies_file: None,
        }
    }
}

impl AppConfig {
    pub fn network(&self) -> NetworkSettings {
        NetworkSettings {
            user_agent: self.user_agent.clone(),
            proxy: self.proxy.clone(),
            cookies_file: self.cookies_file.clone(),
        }
    }

    /// Build a download request for `url` from the current settings.
    pub fn request(&self, url: &str) -> DownloadRequest {
        let mut request = DownloadRequest::new(url, self.output_path.clone());
        request.format = self.format;
        request.quality = self.quality;
        request.include_subtitles = self.subtitle;
        request.include_thumbnail = self.thumbnail;
        request.include_metadata = self.metadata;
        request.network = self.network();
        request
    }
}

/// Reads and writes `AppConfig` as pretty JSON
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user config location
    pub fn default_location() -> Self {
        Self::new(platform::config_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. Persisted keys are merged over the defaults one by
    /// one; a missing file yields the defaults and an unreadable one is
    /// logged and also yields the defaults.
    pub fn load(&self) -> AppConfig {
        match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config from {:?}: {}", self.path, e);
                AppConfig::default()
            }
        }
    }

    fn try_load(&self) -> Result<AppConfig, HexError> {
        if !self.path.exists() {
            debug!("No config at {:?}, using defaults", self.path);
            return Ok(AppConfig::default());
        }

        let text = std::fs::read_to_string(&self.path)?;
        let persisted: Value = serde_json::from_str(&text)?;
        Ok(merge_over_defaults(persisted))
    }

    /// Write settings, creating the parent directory if needed.
    pub fn save(&self, config: &AppConfig) -> Result<(), HexError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(config)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &self.path)?;

        debug!("Saved config to {:?}", self.path);
        Ok(())
    }
}

/// Apply each persisted key on top of the defaults, skipping values that
/// don't fit their field.
fn merge_over_defaults(persisted: Value) -> AppConfig {
    let defaults = AppConfig::default();
    let Value::Object(overrides) = persisted else {
        warn!("Config file is not a JSON object, using defaults");
        return defaults;
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
        return defaults;
    };

    for (key, value) in overrides {
        let previous = merged.insert(key.clone(), value);
        if serde_json::from_value::<AppConfig>(Value::Object(merged.clone())).is_err() {
            warn!("Ignoring invalid config value for '{}'", key);
            match previous {
                Some(old) => merged.insert(key, old),
                None => merged.remove(&key),
            };
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}
