//! Download request types and the request -> yt-dlp options mapping

use crate::extractor::platform::{self, Platform};
use crate::utils::error::HexError;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Network timeout passed to the library for every request.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// Bitrate used when extracting mp3 audio.
pub const MP3_BITRATE_KBPS: u32 = 192;

/// Default user agent from the settings tab.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Output container (or audio format for `Mp3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
    Mp3,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 4] = [Self::Mp4, Self::Mkv, Self::Webm, Self::Mp3];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Webm => "webm",
            MediaFormat::Mp3 => "mp3",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, MediaFormat::Mp3)
    }

    /// Preferred (video, audio) stream extensions for a container.
    /// `None` means any stream can be merged into it.
    fn preferred_streams(&self) -> Option<(&'static str, &'static str)> {
        match self {
            MediaFormat::Mp4 => Some(("mp4", "m4a")),
            MediaFormat::Webm => Some(("webm", "webm")),
            MediaFormat::Mkv | MediaFormat::Mp3 => None,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown format '{}' (expected mp4, mkv, webm or mp3)", s))
    }
}

/// Video quality choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "worst")]
    Worst,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Self::Best,
        Self::P1080,
        Self::P720,
        Self::P480,
        Self::P360,
        Self::Worst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::Worst => "worst",
        }
    }

    /// Maximum video height, for the fixed resolutions.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::Best | Quality::Worst => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown quality '{}' (expected best, 1080p, 720p, 480p, 360p or worst)",
                    s
                )
            })
    }
}

/// Network settings as the user typed them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub cookies_file: Option<PathBuf>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            cookies_file: None,
        }
    }
}

/// One download as configured by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub platform: Option<Platform>,
    pub format: MediaFormat,
    pub quality: Quality,
    pub include_subtitles: bool,
    pub include_thumbnail: bool,
    pub include_metadata: bool,
    pub output_directory: PathBuf,
    pub network: NetworkSettings,
}

impl DownloadRequest {
    /// Create a request with default choices; the platform is detected from the url.
    pub fn new(url: impl Into<String>, output_directory: impl Into<PathBuf>) -> Self {
        let url = url.into().trim().to_string();
        Self {
            platform: platform::detect(&url),
            url,
            format: MediaFormat::default(),
            quality: Quality::default(),
            include_subtitles: false,
            include_thumbnail: true,
            include_metadata: true,
            output_directory: output_directory.into(),
            network: NetworkSettings::default(),
        }
    }

    /// Check the url and make sure the output directory exists.
    ///
    /// On success the output directory is replaced by its absolute form.
    pub fn validate(&mut self) -> Result<(), HexError> {
        validate_url(&self.url)?;

        let absolute = self
            .output_directory
            .absolutize()
            .map(|p| p.into_owned())
            .map_err(|source| HexError::OutputDirectory {
                path: self.output_directory.clone(),
                source,
            })?;

        if !absolute.is_dir() {
            std::fs::create_dir_all(&absolute).map_err(|source| HexError::OutputDirectory {
                path: absolute.clone(),
                source,
            })?;
        }

        self.output_directory = absolute;
        Ok(())
    }
}

/// Reject empty urls and anything without an http/https scheme.
pub fn validate_url(url: &str) -> Result<(), HexError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(HexError::EmptyUrl);
    }

    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(HexError::InvalidUrl(url.to_string()));
    }

    Ok(())
}

/// Ordered list of yt-dlp format alternatives; the first available one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelector(Vec<String>);

impl FormatSelector {
    pub fn alternatives(&self) -> &[String] {
        &self.0
    }

    fn audio() -> Self {
        Self(vec!["bestaudio".to_string(), "best".to_string()])
    }

    fn worst() -> Self {
        Self(vec!["wv*+wa".to_string(), "w".to_string()])
    }

    fn video(container: MediaFormat, max_height: Option<u32>) -> Self {
        let height = max_height
            .map(|h| format!("[height<={}]", h))
            .unwrap_or_default();

        let mut alternatives = Vec::with_capacity(4);
        if let Some((video_ext, audio_ext)) = container.preferred_streams() {
            alternatives.push(format!(
                "bv*{}[ext={}]+ba[ext={}]",
                height, video_ext, audio_ext
            ));
            alternatives.push(format!("b{}[ext={}]", height, video_ext));
        }
        alternatives.push(format!("bv*{}+ba", height));
        alternatives.push(format!("b{}", height));

        Self(alternatives)
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Post-processing steps run by the library after the download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postprocessor {
    ExtractAudio { codec: MediaFormat, bitrate_kbps: u32 },
    EmbedMetadata,
    EmbedThumbnail,
}

/// Network options after filtering what the user typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOptions {
    pub socket_timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub cookies_file: Option<PathBuf>,
}

impl NetworkOptions {
    /// Proxy is kept only when non-empty; cookies only when the file exists.
    pub fn from_settings(settings: &NetworkSettings) -> Self {
        let proxy = settings
            .proxy
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let cookies_file = settings
            .cookies_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty() && p.exists())
            .map(Path::to_path_buf);

        Self {
            socket_timeout: SOCKET_TIMEOUT,
            user_agent: settings.user_agent.clone(),
            proxy,
            cookies_file,
        }
    }
}

/// Everything the library needs for one download. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: FormatSelector,
    pub output_template: String,
    pub merge_output_format: Option<MediaFormat>,
    pub postprocessors: Vec<Postprocessor>,
    pub write_subtitles: bool,
    pub embed_subtitles: bool,
    pub write_thumbnail: bool,
    pub embed_thumbnail: bool,
    pub add_metadata: bool,
    pub overwrites: bool,
    pub network: NetworkOptions,
}

/// Map a request onto library options. Never fails.
pub fn build(request: &DownloadRequest) -> DownloadOptions {
    let output_template = request
        .output_directory
        .join("%(title)s.%(ext)s")
        .to_string_lossy()
        .into_owned();

    let mut options = DownloadOptions {
        format: FormatSelector::audio(),
        output_template,
        merge_output_format: None,
        postprocessors: Vec::new(),
        write_subtitles: false,
        embed_subtitles: false,
        write_thumbnail: false,
        embed_thumbnail: false,
        add_metadata: false,
        overwrites: true,
        network: NetworkOptions::from_settings(&request.network),
    };

    if request.format.is_audio() {
        options.postprocessors.push(Postprocessor::ExtractAudio {
            codec: MediaFormat::Mp3,
            bitrate_kbps: MP3_BITRATE_KBPS,
        });
        if request.include_metadata {
            options.postprocessors.push(Postprocessor::EmbedMetadata);
        }
        if request.include_thumbnail {
            options.postprocessors.push(Postprocessor::EmbedThumbnail);
        }
        return options;
    }

    options.format = match request.quality {
        Quality::Worst => FormatSelector::worst(),
        quality => FormatSelector::video(request.format, quality.max_height()),
    };
    options.merge_output_format = Some(request.format);

    if request.include_subtitles {
        options.write_subtitles = true;
        options.embed_subtitles = true;
    }
    if request.include_thumbnail {
        options.write_thumbnail = true;
        options.embed_thumbnail = true;
    }
    options.add_metadata = request.include_metadata;

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(format: MediaFormat, quality: Quality) -> DownloadRequest {
        let mut req = DownloadRequest::new("https://youtu.be/dQw4w9WgXcQ", "/tmp/hexloader-out");
        req.format = format;
        req.quality = quality;
        req
    }

    #[test]
    fn test_build_is_deterministic() {
        let req = request(MediaFormat::Mkv, Quality::P480);
        assert_eq!(build(&req), build(&req));
    }

    #[test]
    fn test_mp3_extracts_audio_without_merge_format() {
        let opts = build(&request(MediaFormat::Mp3, Quality::P720));

        assert_eq!(opts.format.to_string(), "bestaudio/best");
        assert_eq!(opts.merge_output_format, None);
        assert_eq!(
            opts.postprocessors[0],
            Postprocessor::ExtractAudio {
                codec: MediaFormat::Mp3,
                bitrate_kbps: 192
            }
        );
        assert!(opts.postprocessors.contains(&Postprocessor::EmbedMetadata));
        assert!(opts.postprocessors.contains(&Postprocessor::EmbedThumbnail));
    }

    #[test]
    fn test_mp3_without_extras_has_only_extraction() {
        let mut req = request(MediaFormat::Mp3, Quality::Best);
        req.include_metadata = false;
        req.include_thumbnail = false;

        let opts = build(&req);
        assert_eq!(opts.postprocessors.len(), 1);
        assert!(!opts.write_thumbnail);
    }

    #[test]
    fn test_720p_mp4_constrains_height_and_prefers_mp4() {
        let opts = build(&request(MediaFormat::Mp4, Quality::P720));
        let alts = opts.format.alternatives();

        assert_eq!(alts[0], "bv*[height<=720][ext=mp4]+ba[ext=m4a]");
        assert_eq!(alts[1], "b[height<=720][ext=mp4]");
        assert!(alts.iter().all(|a| a.contains("[height<=720]")));
        assert_eq!(opts.merge_output_format, Some(MediaFormat::Mp4));
    }

    #[test]
    fn test_best_mp4_matches_classic_selector() {
        let opts = build(&request(MediaFormat::Mp4, Quality::Best));
        assert_eq!(
            opts.format.to_string(),
            "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b"
        );
    }

    #[test]
    fn test_best_mkv_has_no_container_filter() {
        let opts = build(&request(MediaFormat::Mkv, Quality::Best));
        assert_eq!(opts.format.to_string(), "bv*+ba/b");
        assert_eq!(opts.merge_output_format, Some(MediaFormat::Mkv));
    }

    #[test]
    fn test_worst_selects_lowest() {
        let opts = build(&request(MediaFormat::Webm, Quality::Worst));
        assert_eq!(opts.format.to_string(), "wv*+wa/w");
        assert_eq!(opts.merge_output_format, Some(MediaFormat::Webm));
    }

    #[test]
    fn test_video_extras_follow_flags() {
        let mut req = request(MediaFormat::Mp4, Quality::Best);
        req.include_subtitles = true;
        req.include_thumbnail = false;
        req.include_metadata = false;

        let opts = build(&req);
        assert!(opts.write_subtitles && opts.embed_subtitles);
        assert!(!opts.write_thumbnail && !opts.embed_thumbnail);
        assert!(!opts.add_metadata);
        assert!(opts.postprocessors.is_empty());
    }

    #[test]
    fn test_output_template_and_network_defaults() {
        let opts = build(&request(MediaFormat::Mp4, Quality::Best));

        assert!(opts.output_template.ends_with("%(title)s.%(ext)s"));
        assert!(opts.output_template.starts_with("/tmp/hexloader-out"));
        assert_eq!(opts.network.socket_timeout, Duration::from_secs(30));
        assert_eq!(opts.network.user_agent, DEFAULT_USER_AGENT);
        assert!(opts.overwrites);
    }

    #[test]
    fn test_empty_proxy_is_dropped() {
        let mut req = request(MediaFormat::Mp4, Quality::Best);
        req.network.proxy = Some("   ".to_string());
        assert_eq!(build(&req).network.proxy, None);

        req.network.proxy = Some("http://127.0.0.1:8080".to_string());
        assert_eq!(
            build(&req).network.proxy.as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn test_cookies_file_only_when_present() {
        let dir = TempDir::new().expect("temp dir");
        let cookies = dir.path().join("cookies.txt");

        let mut req = request(MediaFormat::Mp4, Quality::Best);
        req.network.cookies_file = Some(cookies.clone());
        assert_eq!(build(&req).network.cookies_file, None);

        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").expect("write cookies");
        assert_eq!(build(&req).network.cookies_file, Some(cookies));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(matches!(validate_url("   "), Err(HexError::EmptyUrl)));
        assert!(matches!(
            validate_url("ftp://example.com/a.mp4"),
            Err(HexError::InvalidUrl(_))
        ));
        assert!(validate_url("HTTPS://example.com/v").is_ok());
    }

    #[test]
    fn test_validate_creates_output_directory() {
        let dir = TempDir::new().expect("temp dir");
        let target = dir.path().join("nested").join("out");

        let mut req = DownloadRequest::new("https://vimeo.com/1", &target);
        req.validate().expect("validate");

        assert!(target.is_dir());
        assert!(req.output_directory.is_absolute());
    }

    #[test]
    fn test_validate_fails_when_directory_is_a_file() {
        let dir = TempDir::new().expect("temp dir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").expect("write");

        let mut req = DownloadRequest::new("https://vimeo.com/1", blocker.join("sub"));
        assert!(matches!(
            req.validate(),
            Err(HexError::OutputDirectory { .. })
        ));
    }

    #[test]
    fn test_quality_and_format_parse() {
        assert_eq!("720P".parse::<Quality>(), Ok(Quality::P720));
        assert_eq!("MP3".parse::<MediaFormat>(), Ok(MediaFormat::Mp3));
        assert!("4k".parse::<Quality>().is_err());
    }

    #[test]
    fn test_request_detects_platform() {
        let req = DownloadRequest::new("  https://www.tiktok.com/@a/video/1 ", "/tmp");
        assert_eq!(req.platform, Some(Platform::TikTok));
        assert_eq!(req.url, "https://www.tiktok.com/@a/video/1");
    }
}
