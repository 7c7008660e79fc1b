//! Seam to the media-fetching library

pub mod models;
pub mod platform;
pub mod traits;
pub mod ytdlp;

pub use models::{RawProgress, RawStatus, VideoInfo};
pub use platform::Platform;
pub use traits::{AbortDownload, Extractor, ProgressHook};
pub use ytdlp::YtDlpExtractor;
