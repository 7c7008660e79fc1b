//! hexloader library

pub mod app;
pub mod downloader;
pub mod extractor;
pub mod relay;
pub mod utils;

// Re-export main types for easier use
pub use app::{Presenter, Surface, ViewState};
pub use downloader::{DownloadRequest, MediaFormat, Orchestrator, ProgressEvent, Quality};
pub use extractor::{Extractor, Platform, VideoInfo, YtDlpExtractor};
pub use relay::{CancelFlag, SessionId, UiEvent};
pub use utils::{AppConfig, ConfigStore, HexError};
