//! Probing for external tools (ffmpeg for audio extraction and merging)

use std::io::ErrorKind;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{info, warn};

/// How long a `-version` probe may take.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Availability of the transcoding tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Available { version: String },
    NotWorking,
    NotInstalled,
    Error(String),
}

impl ToolStatus {
    /// Label for the settings tab
    pub fn label(&self) -> String {
        match self {
            ToolStatus::Available { version } => format!("FFmpeg: ✓ {}", version),
            ToolStatus::NotWorking => "FFmpeg: ✗ Not working".to_string(),
            ToolStatus::NotInstalled => "FFmpeg: ✗ Not installed".to_string(),
            ToolStatus::Error(_) => "FFmpeg: ✗ Error".to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ToolStatus::Available { .. })
    }
}

/// Pull the version out of `ffmpeg -version` output:
/// `ffmpeg version 6.1.1 Copyright (c) ...` -> `6.1.1`
pub fn parse_ffmpeg_version(stdout: &str) -> Option<String> {
    let first = stdout.lines().next()?;
    let (_, rest) = first.split_once("version ")?;
    rest.split_whitespace().next().map(str::to_string)
}

/// Run `<program> -version` and classify the result.
pub async fn probe_ffmpeg_at(program: &str) -> ToolStatus {
    let run = AsyncCommand::new(program)
        .arg("-version")
        .kill_on_drop(true)
        .output();

    let status = match tokio::time::timeout(PROBE_TIMEOUT, run).await {
        Err(_) => ToolStatus::Error("timed out".to_string()),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => ToolStatus::NotInstalled,
        Ok(Err(e)) => ToolStatus::Error(e.to_string()),
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match parse_ffmpeg_version(&stdout) {
                Some(version) => ToolStatus::Available { version },
                None => ToolStatus::Error("unrecognised version output".to_string()),
            }
        }
        Ok(Ok(_)) => ToolStatus::NotWorking,
    };

    match &status {
        ToolStatus::Available { version } => info!("ffmpeg {} available", version),
        other => warn!("ffmpeg check: {:?}", other),
    }
    status
}

pub async fn probe_ffmpeg() -> ToolStatus {
    probe_ffmpeg_at("ffmpeg").await
}
