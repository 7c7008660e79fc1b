//! Data structures exchanged with the media-fetching library

use serde::{Deserialize, Serialize};

fn unknown() -> String {
    "Unknown".to_string()
}

/// Video metadata returned by the library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default = "unknown")]
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub extractor: Option<String>,
}

impl VideoInfo {
    /// Whole seconds, if the library reported a duration.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d as u64)
    }

    /// `H:MM:SS` for an hour or more, else `M:SS`.
    pub fn duration_display(&self) -> Option<String> {
        let total = self.duration_seconds()?;
        let (mins, secs) = (total / 60, total % 60);
        let (hours, mins) = (mins / 60, mins % 60);
        Some(if hours > 0 {
            format!("{}:{:02}:{:02}", hours, mins, secs)
        } else {
            format!("{}:{:02}", mins, secs)
        })
    }

    pub fn uploader_or_unknown(&self) -> &str {
        self.uploader.as_deref().unwrap_or("Unknown")
    }

    /// Multi-line summary for the info dialog.
    pub fn summary(&self) -> String {
        let mut text = format!("Title: {}\n", self.title);
        if let Some(duration) = self.duration_display() {
            text.push_str(&format!("Duration: {}\n", duration));
        }
        text.push_str(&format!("Uploader: {}", self.uploader_or_unknown()));
        text
    }
}

/// Status tag attached to each progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawStatus {
    Downloading,
    Finished,
    Error,
    Other,
}

impl RawStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => RawStatus::Downloading,
            "finished" => RawStatus::Finished,
            "error" => RawStatus::Error,
            _ => RawStatus::Other,
        }
    }
}

/// One progress callback from the library
#[derive(Debug, Clone, PartialEq)]
pub struct RawProgress {
    pub status: RawStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    pub speed: Option<f64>,
}

impl RawProgress {
    pub fn downloading(downloaded: u64, total: u64, speed: Option<f64>) -> Self {
        Self {
            status: RawStatus::Downloading,
            downloaded_bytes: Some(downloaded),
            total_bytes: Some(total),
            total_bytes_estimate: None,
            speed,
        }
    }

    pub fn finished() -> Self {
        Self {
            status: RawStatus::Finished,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            speed: None,
        }
    }

    /// Exact total if known, otherwise the estimate.
    pub fn total(&self) -> Option<u64> {
        self.total_bytes
            .filter(|t| *t > 0)
            .or(self.total_bytes_estimate)
    }
}
