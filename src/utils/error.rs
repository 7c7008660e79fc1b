//! Error handling for hexloader

use std::path::PathBuf;
use thiserror::Error;

/// Maximum characters of raw library text shown to the user.
pub const MAX_MESSAGE_CHARS: usize = 100;

/// Main error type for hexloader
#[derive(Debug, Error)]
pub enum HexError {
    #[error("yt-dlp not found. Please install yt-dlp")]
    YtDlpNotFound,

    #[error("Please enter a video URL")]
    EmptyUrl,

    #[error("Invalid URL: {0}. Please enter a valid URL starting with http:// or https://")]
    InvalidUrl(String),

    #[error("Cannot create directory {path:?}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Outcome of a failed call into the media-fetching library.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The progress hook asked for the operation to stop.
    #[error("Download cancelled by user")]
    Cancelled,

    /// The library ran and reported a failure in its own words.
    #[error("{0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What a failure means for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Private or login-required content.
    Access,
    /// Geo-restricted content.
    Availability,
    /// Any other failure reported by the library.
    Library,
    /// A fault outside the library's own error reporting.
    Unexpected,
}

/// A classified, user-presentable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    /// Classify the text of a library-reported failure.
    pub fn from_library_text(text: &str) -> Self {
        if text.contains("Private video") || text.contains("Sign in") {
            Self {
                kind: FailureKind::Access,
                message: "Private/age-restricted video (use cookies)".to_string(),
            }
        } else if text.to_lowercase().contains("not available") {
            Self {
                kind: FailureKind::Availability,
                message: "Geo-restricted content (use proxy)".to_string(),
            }
        } else {
            Self {
                kind: FailureKind::Library,
                message: truncate(text, MAX_MESSAGE_CHARS),
            }
        }
    }

    pub fn unexpected(text: &str) -> Self {
        Self {
            kind: FailureKind::Unexpected,
            message: truncate(text, MAX_MESSAGE_CHARS),
        }
    }

    /// Classify any extraction error other than a cancellation.
    pub fn from_extract_error(err: &ExtractError) -> Self {
        match err {
            ExtractError::Download(text) => Self::from_library_text(text),
            other => Self::unexpected(&other.to_string()),
        }
    }
}

/// Cut `text` to at most `max` characters without splitting a code point.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_video_is_access_error() {
        let failure =
            Failure::from_library_text("ERROR: [youtube] abc: Private video. Sign in if you've been granted access");
        assert_eq!(failure.kind, FailureKind::Access);
        assert!(failure.message.contains("cookies"));
    }

    #[test]
    fn test_sign_in_is_access_error() {
        let failure = Failure::from_library_text("Sign in to confirm your age");
        assert_eq!(failure.kind, FailureKind::Access);
    }

    #[test]
    fn test_not_available_is_geo_error() {
        let failure =
            Failure::from_library_text("The uploader has not made this video Not Available in your country");
        assert_eq!(failure.kind, FailureKind::Availability);
        assert!(failure.message.contains("proxy"));
    }

    #[test]
    fn test_other_text_is_truncated_raw() {
        let raw = "x".repeat(250);
        let failure = Failure::from_library_text(&raw);
        assert_eq!(failure.kind, FailureKind::Library);
        assert_eq!(failure.message.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_short_text_passes_through() {
        let failure = Failure::from_library_text("HTTP Error 500");
        assert_eq!(failure.message, "HTTP Error 500");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(150);
        let cut = truncate(&text, 100);
        assert_eq!(cut.chars().count(), 100);
    }

    #[test]
    fn test_io_error_is_unexpected() {
        let err = ExtractError::Io(std::io::Error::new(std::io::ErrorKind::Other, "pipe closed"));
        let failure = Failure::from_extract_error(&err);
        assert_eq!(failure.kind, FailureKind::Unexpected);
        assert!(failure.message.contains("pipe closed"));
    }
}
