use crate::downloader::options::{DownloadOptions, NetworkOptions};
use crate::extractor::models::{RawProgress, VideoInfo};
use crate::utils::error::ExtractError;
use async_trait::async_trait;

/// Returned by a progress hook to make the library abort the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortDownload;

/// Callback invoked by the library on every progress tick.
///
/// Returning `Err(AbortDownload)` stops the in-flight operation; the
/// extractor then reports `ExtractError::Cancelled`.
pub trait ProgressHook: Send {
    fn on_progress(&mut self, progress: &RawProgress) -> Result<(), AbortDownload>;
}

impl<F> ProgressHook for F
where
    F: FnMut(&RawProgress) -> Result<(), AbortDownload> + Send,
{
    fn on_progress(&mut self, progress: &RawProgress) -> Result<(), AbortDownload> {
        self(progress)
    }
}

/// Core trait for the external media-fetching library
///
/// The orchestrator only depends on this seam, so tests can script the
/// library's behaviour without spawning processes.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns a unique identifier for this extractor (e.g., "yt-dlp")
    fn id(&self) -> &'static str;

    /// Query metadata without downloading
    async fn fetch_info(&self, url: &str, network: &NetworkOptions)
        -> Result<VideoInfo, ExtractError>;

    /// Download `url` with `options`, reporting each progress tick to `hook`
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<VideoInfo, ExtractError>;
}
