//! Progress events for one download session

use crate::extractor::models::{RawProgress, RawStatus};

/// What the presentation layer learns about a running download
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Bytes are arriving. `percent` is within 0..=100.
    Downloading {
        percent: f64,
        speed_bytes_per_sec: Option<f64>,
    },
    /// The library finished fetching and is post-processing.
    Processing,
    Finished {
        title: String,
    },
    Cancelled,
    Failed {
        message: String,
    },
}

impl ProgressEvent {
    /// Translate one raw library callback. Ticks without a known total
    /// carry no usable percentage and are dropped.
    pub fn from_raw(raw: &RawProgress) -> Option<Self> {
        match raw.status {
            RawStatus::Downloading => {
                let total = raw.total().filter(|t| *t > 0)?;
                let downloaded = raw.downloaded_bytes.unwrap_or(0);
                let percent = (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                Some(ProgressEvent::Downloading {
                    percent,
                    speed_bytes_per_sec: raw.speed.filter(|s| *s > 0.0),
                })
            }
            RawStatus::Finished => Some(ProgressEvent::Processing),
            RawStatus::Error | RawStatus::Other => None,
        }
    }

    /// Finished, Cancelled and Failed end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Finished { .. } | ProgressEvent::Cancelled | ProgressEvent::Failed { .. }
        )
    }

    /// Status-bar text for non-terminal events.
    pub fn status_text(&self) -> String {
        match self {
            ProgressEvent::Downloading {
                percent,
                speed_bytes_per_sec,
            } => {
                let mut status = format!("Downloading: {:.0}%", percent);
                if let Some(speed) = speed_bytes_per_sec {
                    status.push_str(&format!(" ({})", format_speed(*speed)));
                }
                status
            }
            ProgressEvent::Processing => "Processing...".to_string(),
            ProgressEvent::Finished { .. } => "Download complete".to_string(),
            ProgressEvent::Cancelled => "Cancelled".to_string(),
            ProgressEvent::Failed { .. } => "Download failed".to_string(),
        }
    }
}

/// Human readable transfer rate (1024-based units).
pub fn format_speed(bytes_per_sec: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    if bytes_per_sec > MIB {
        format!("{:.1} MB/s", bytes_per_sec / MIB)
    } else if bytes_per_sec > KIB {
        format!("{:.1} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.0} B/s", bytes_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // RAW TRANSLATION
    // ============================================================

    #[test]
    fn test_downloading_computes_percent() {
        let raw = RawProgress::downloading(250, 1000, Some(512.0));
        assert_eq!(
            ProgressEvent::from_raw(&raw),
            Some(ProgressEvent::Downloading {
                percent: 25.0,
                speed_bytes_per_sec: Some(512.0)
            })
        );
    }

    #[test]
    fn test_downloading_uses_estimate() {
        let mut raw = RawProgress::downloading(50, 0, None);
        raw.total_bytes = None;
        raw.total_bytes_estimate = Some(200);

        match ProgressEvent::from_raw(&raw) {
            Some(ProgressEvent::Downloading { percent, .. }) => assert_eq!(percent, 25.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_total_is_dropped() {
        let mut raw = RawProgress::downloading(50, 0, None);
        raw.total_bytes = None;
        assert_eq!(ProgressEvent::from_raw(&raw), None);
    }

    #[test]
    fn test_percent_is_clamped() {
        let raw = RawProgress::downloading(1500, 1000, None);
        match ProgressEvent::from_raw(&raw) {
            Some(ProgressEvent::Downloading { percent, .. }) => assert_eq!(percent, 100.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_finished_tick_means_processing() {
        assert_eq!(
            ProgressEvent::from_raw(&RawProgress::finished()),
            Some(ProgressEvent::Processing)
        );
    }

    // ============================================================
    // DISPLAY
    // ============================================================

    #[test]
    fn test_format_speed_units() {
        assert_eq!(format_speed(512.0), "512 B/s");
        assert_eq!(format_speed(2048.0), "2.0 KB/s");
        assert_eq!(format_speed(3.5 * 1024.0 * 1024.0), "3.5 MB/s");
    }

    #[test]
    fn test_status_text() {
        let event = ProgressEvent::Downloading {
            percent: 42.4,
            speed_bytes_per_sec: Some(2048.0),
        };
        assert_eq!(event.status_text(), "Downloading: 42% (2.0 KB/s)");
        assert_eq!(ProgressEvent::Processing.status_text(), "Processing...");
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::Cancelled.is_terminal());
        assert!(ProgressEvent::Finished {
            title: "t".into()
        }
        .is_terminal());
        assert!(!ProgressEvent::Processing.is_terminal());
    }
}
