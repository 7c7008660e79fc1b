//! yt-dlp wrapper
//!
//! Drives the `yt-dlp` executable as a subprocess. Progress is requested via
//! `--progress-template` so every tick arrives as one machine-readable line,
//! which is handed to the caller's `ProgressHook`. When the hook asks to
//! abort, the child process is killed and `ExtractError::Cancelled` returned.
//!
//! Lookup order for the executable:
//! 1. Next to the current executable (bundled)
//! 2. System PATH
//! 3. Common installation paths (Homebrew, pip --user, ...)
//! 4. `python3 -m yt_dlp` when the module is importable

use crate::downloader::options::{DownloadOptions, NetworkOptions, Postprocessor};
use crate::extractor::models::{RawProgress, RawStatus, VideoInfo};
use crate::extractor::traits::{AbortDownload, Extractor, ProgressHook};
use crate::utils::error::{ExtractError, HexError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error, info, warn};

/// Prefix of the lines produced by our progress templates.
pub const PROGRESS_PREFIX: &str = "[hex]";

const DOWNLOAD_TEMPLATE: &str = "download:[hex] %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s";
const POSTPROCESS_TEMPLATE: &str = "postprocess:[hex] finished NA NA NA NA";

/// How to invoke yt-dlp: a program plus any leading arguments
/// (e.g. `python3 -m yt_dlp`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpCommand {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
}

impl YtDlpCommand {
    fn binary(program: PathBuf) -> Self {
        Self {
            program,
            leading_args: Vec::new(),
        }
    }
}

/// Video extractor backed by the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    command: YtDlpCommand,
}

impl YtDlpExtractor {
    /// Locate yt-dlp and build an extractor around it
    pub fn new() -> Result<Self, HexError> {
        match find_ytdlp() {
            Some(command) => {
                info!("Found yt-dlp at: {}", command.program.display());
                Ok(Self { command })
            }
            None => {
                error!("yt-dlp not found anywhere!");
                Err(HexError::YtDlpNotFound)
            }
        }
    }

    /// Use an explicit program and leading arguments
    pub fn from_command(program: impl Into<PathBuf>, leading_args: Vec<OsString>) -> Self {
        Self {
            command: YtDlpCommand {
                program: program.into(),
                leading_args,
            },
        }
    }

    pub fn command(&self) -> &YtDlpCommand {
        &self.command
    }

    /// `yt-dlp --version`, if it runs
    pub async fn version(&self) -> Option<String> {
        let output = AsyncCommand::new(&self.command.program)
            .args(&self.command.leading_args)
            .arg("--version")
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }

    async fn run(
        &self,
        args: Vec<OsString>,
        hook: &mut dyn ProgressHook,
        require_info: bool,
    ) -> Result<VideoInfo, ExtractError> {
        let mut cmd = AsyncCommand::new(&self.command.program);
        cmd.args(&self.command.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Spawning {:?} with {} args", self.command.program, args.len());
        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        let mut out = BufReader::new(stdout);
        let mut err = BufReader::new(stderr);
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());

        let mut collected = CollectedOutput::default();
        let (mut out_open, mut err_open) = (true, true);

        while out_open || err_open {
            // yt-dlp writes in the console code page, which need not be UTF-8
            let (line, from_stderr) = tokio::select! {
                read = out.read_until(b'\n', &mut out_buf), if out_open => {
                    if read? == 0 {
                        out_open = false;
                        if out_buf.is_empty() {
                            continue;
                        }
                    }
                    (take_line(&mut out_buf), false)
                }
                read = err.read_until(b'\n', &mut err_buf), if err_open => {
                    if read? == 0 {
                        err_open = false;
                        if err_buf.is_empty() {
                            continue;
                        }
                    }
                    (take_line(&mut err_buf), true)
                }
            };

            if let Some(progress) = parse_progress_line(&line) {
                if hook.on_progress(&progress).is_err() {
                    info!("Progress hook requested abort, stopping yt-dlp");
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill yt-dlp: {}", e);
                    }
                    return Err(ExtractError::Cancelled);
                }
                continue;
            }

            collected.absorb(&line, from_stderr);
        }

        let status = child.wait().await?;
        debug!("yt-dlp exited with: {:?}", status.code());

        if !status.success() {
            let text = collected.error_text(status);
            error!("yt-dlp failed: {}", text);
            return Err(ExtractError::Download(text));
        }

        match collected.info {
            Some(info) => Ok(info),
            None if require_info => Err(ExtractError::Download(
                "Could not fetch video information".to_string(),
            )),
            None => Ok(VideoInfo {
                title: "Unknown".to_string(),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn id(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_info(
        &self,
        url: &str,
        network: &NetworkOptions,
    ) -> Result<VideoInfo, ExtractError> {
        debug!("Extracting video info for URL: {}", url);
        let mut ignore = |_: &RawProgress| Ok::<(), AbortDownload>(());
        self.run(info_args(url, network), &mut ignore, true).await
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<VideoInfo, ExtractError> {
        debug!("Downloading {} with format {}", url, options.format);
        self.run(download_args(url, options), hook, false).await
    }
}

fn missing_pipe(name: &str) -> ExtractError {
    ExtractError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("yt-dlp {} unavailable", name),
    ))
}

/// Decode and clear one line read from a pipe.
fn take_line(buf: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    line
}

/// Non-progress output kept while the process runs
#[derive(Debug, Default)]
struct CollectedOutput {
    info: Option<VideoInfo>,
    errors: Vec<String>,
    last_stderr: Option<String>,
}

impl CollectedOutput {
    fn absorb(&mut self, line: &str, from_stderr: bool) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if trimmed.starts_with('{') {
            match serde_json::from_str::<VideoInfo>(trimmed) {
                Ok(info) => self.info = Some(info),
                Err(e) => warn!("Failed to parse yt-dlp JSON: {}", e),
            }
            return;
        }

        if trimmed.contains("ERROR:") {
            self.errors.push(trimmed.to_string());
        } else if from_stderr {
            self.last_stderr = Some(trimmed.to_string());
        }
    }

    fn error_text(&self, status: ExitStatus) -> String {
        if !self.errors.is_empty() {
            return self.errors.join("\n");
        }
        self.last_stderr
            .clone()
            .unwrap_or_else(|| format!("yt-dlp exited with {}", status))
    }
}

fn push_network(args: &mut Vec<OsString>, network: &NetworkOptions) {
    args.push("--socket-timeout".into());
    args.push(network.socket_timeout.as_secs().to_string().into());
    if !network.user_agent.is_empty() {
        args.push("--user-agent".into());
        args.push(network.user_agent.clone().into());
    }
    if let Some(proxy) = &network.proxy {
        args.push("--proxy".into());
        args.push(proxy.clone().into());
    }
    if let Some(cookies) = &network.cookies_file {
        args.push("--cookies".into());
        args.push(cookies.clone().into_os_string());
    }
}

/// Arguments for a metadata-only query
pub fn info_args(url: &str, network: &NetworkOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--dump-single-json".into(),
        "--no-warnings".into(),
        "--no-playlist".into(),
    ];
    push_network(&mut args, network);
    args.push("--".into());
    args.push(url.into());
    args
}

/// Arguments for a full download with progress reporting
pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--newline".into(),
        "--quiet".into(),
        "--no-warnings".into(),
        "--progress".into(),
        "--progress-template".into(),
        DOWNLOAD_TEMPLATE.into(),
        "--progress-template".into(),
        POSTPROCESS_TEMPLATE.into(),
        "--dump-single-json".into(),
        "--no-simulate".into(),
        "-f".into(),
        options.format.to_string().into(),
        "-o".into(),
        options.output_template.clone().into(),
    ];

    if options.overwrites {
        args.push("--force-overwrites".into());
    }
    if let Some(container) = options.merge_output_format {
        args.push("--merge-output-format".into());
        args.push(container.as_str().into());
    }
    if options.write_subtitles {
        args.push("--write-subs".into());
    }
    if options.embed_subtitles {
        args.push("--embed-subs".into());
    }
    if options.write_thumbnail {
        args.push("--write-thumbnail".into());
    }
    if options.embed_thumbnail {
        args.push("--embed-thumbnail".into());
    }
    if options.add_metadata {
        args.push("--embed-metadata".into());
    }

    for pp in &options.postprocessors {
        match pp {
            Postprocessor::ExtractAudio {
                codec,
                bitrate_kbps,
            } => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push(codec.as_str().into());
                args.push("--audio-quality".into());
                args.push(format!("{}K", bitrate_kbps).into());
            }
            Postprocessor::EmbedMetadata => args.push("--embed-metadata".into()),
            Postprocessor::EmbedThumbnail => args.push("--embed-thumbnail".into()),
        }
    }

    push_network(&mut args, &options.network);
    args.push("--".into());
    args.push(url.into());
    args
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Parse one `[hex] <status> <downloaded> <total> <estimate> <speed>` line.
/// Missing values are printed by yt-dlp as `NA`.
pub fn parse_progress_line(line: &str) -> Option<RawProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split_whitespace();

    let status = RawStatus::parse(fields.next()?);
    let downloaded_bytes = fields.next().and_then(parse_number).map(|n| n as u64);
    let total_bytes = fields.next().and_then(parse_number).map(|n| n as u64);
    let total_bytes_estimate = fields.next().and_then(parse_number).map(|n| n as u64);
    let speed = fields.next().and_then(parse_number);

    Some(RawProgress {
        status,
        downloaded_bytes,
        total_bytes,
        total_bytes_estimate,
        speed,
    })
}

// ============================================================
// yt-dlp Detection Functions
// ============================================================

/// Find yt-dlp with priority:
/// 1. Bundled (next to the executable)
/// 2. System PATH
/// 3. Common installation paths
/// 4. Python module
pub fn find_ytdlp() -> Option<YtDlpCommand> {
    if let Some(bundled) = find_bundled_ytdlp() {
        info!("✓ Using bundled yt-dlp: {:?}", bundled);
        return Some(YtDlpCommand::binary(bundled));
    }

    if let Ok(path) = which::which("yt-dlp") {
        info!("✓ Using system yt-dlp: {:?}", path);
        return Some(YtDlpCommand::binary(path));
    }

    if let Some(common) = find_in_common_paths() {
        info!("✓ Using yt-dlp from common path: {:?}", common);
        return Some(YtDlpCommand::binary(common));
    }

    if let Some(python) = find_python_module() {
        info!("✓ Using yt-dlp python module via {:?}", python.program);
        return Some(python);
    }

    warn!("✗ yt-dlp not found anywhere!");
    None
}

fn find_bundled_ytdlp() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;

    let binary_name = if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    };
    let adjacent = exe_dir.join(binary_name);
    if adjacent.is_file() && is_executable(&adjacent) {
        return Some(adjacent);
    }

    // App.app/Contents/MacOS/hexloader -> App.app/Contents/Resources/bin/yt-dlp
    if exe_dir.ends_with("MacOS") {
        let bundled = exe_dir
            .parent()?
            .join("Resources")
            .join("bin")
            .join("yt-dlp");
        if bundled.is_file() && is_executable(&bundled) {
            return Some(bundled);
        }
    }

    None
}

fn find_in_common_paths() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("/opt/homebrew/bin/yt-dlp"),
        PathBuf::from("/usr/local/bin/yt-dlp"),
        PathBuf::from("/usr/bin/yt-dlp"),
        PathBuf::from("/Library/Frameworks/Python.framework/Versions/Current/bin/yt-dlp"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local/bin/yt-dlp"));
    }

    candidates
        .into_iter()
        .find(|path| path.exists() && is_executable(path))
}

fn find_python_module() -> Option<YtDlpCommand> {
    ["python3", "python"].into_iter().find_map(|name| {
        let python = which::which(name).ok()?;
        let status = std::process::Command::new(&python)
            .args(["-c", "import yt_dlp"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .ok()?;
        status.success().then(|| YtDlpCommand {
            program: python,
            leading_args: vec!["-m".into(), "yt_dlp".into()],
        })
    })
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::options::{build, DownloadRequest, MediaFormat, Quality};

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_downloading_line() {
        let raw = parse_progress_line("[hex] downloading 512 1024 NA 2048.5").expect("parse");
        assert_eq!(raw.status, RawStatus::Downloading);
        assert_eq!(raw.downloaded_bytes, Some(512));
        assert_eq!(raw.total_bytes, Some(1024));
        assert_eq!(raw.total_bytes_estimate, None);
        assert_eq!(raw.speed, Some(2048.5));
    }

    #[test]
    fn test_parse_estimate_only_line() {
        let raw = parse_progress_line("  [hex] downloading 10 NA 400.0 NA").expect("parse");
        assert_eq!(raw.total(), Some(400));
        assert_eq!(raw.speed, None);
    }

    #[test]
    fn test_parse_finished_line() {
        let raw = parse_progress_line("[hex] finished NA NA NA NA").expect("parse");
        assert_eq!(raw.status, RawStatus::Finished);
    }

    #[test]
    fn test_other_lines_are_not_progress() {
        assert!(parse_progress_line("[download] 42.5% of 10MiB").is_none());
        assert!(parse_progress_line("{\"title\":\"x\"}").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn test_download_args_for_video() {
        let mut req = DownloadRequest::new("https://youtu.be/abc", "/tmp/out");
        req.quality = Quality::P720;
        req.include_subtitles = true;
        req.network.proxy = Some("socks5://127.0.0.1:1080".to_string());

        let args = strings(&download_args(&req.url, &build(&req)));

        let f = args.iter().position(|a| a == "-f").expect("format flag");
        assert!(args[f + 1].starts_with("bv*[height<=720][ext=mp4]"));
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.contains(&"--embed-subs".to_string()));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
        assert!(args.contains(&"--proxy".to_string()));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_download_args_for_mp3() {
        let mut req = DownloadRequest::new("https://youtu.be/abc", "/tmp/out");
        req.format = MediaFormat::Mp3;

        let args = strings(&download_args(&req.url, &build(&req)));

        assert!(args.contains(&"--extract-audio".to_string()));
        let q = args.iter().position(|a| a == "--audio-quality").expect("quality flag");
        assert_eq!(args[q + 1], "192K");
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn test_info_args_skip_download() {
        let network = NetworkOptions::from_settings(&Default::default());
        let args = strings(&info_args("https://vimeo.com/1", &network));

        assert!(args.contains(&"--dump-single-json".to_string()));
        assert!(!args.contains(&"--no-simulate".to_string()));
        assert!(args.contains(&"--user-agent".to_string()));
    }

    #[test]
    fn test_error_text_prefers_error_lines() {
        let mut collected = CollectedOutput::default();
        collected.absorb("WARNING: something", true);
        collected.absorb("ERROR: [youtube] abc: Private video", true);
        assert_eq!(
            collected.error_text(exit_status_failure()),
            "ERROR: [youtube] abc: Private video"
        );
    }

    #[cfg(unix)]
    fn exit_status_failure() -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(1 << 8)
    }

    #[cfg(windows)]
    fn exit_status_failure() -> ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(1)
    }

    #[test]
    fn test_find_ytdlp_returns_runnable_command() {
        // yt-dlp may be missing on the test machine; only check what is found
        if let Some(command) = find_ytdlp() {
            assert!(command.program.is_file(), "{:?}", command.program);
            assert!(is_executable(&command.program));
            let module: Vec<OsString> = vec!["-m".into(), "yt_dlp".into()];
            assert!(command.leading_args.is_empty() || command.leading_args == module);
        }
    }

    #[test]
    fn test_is_executable() {
        let path = PathBuf::from("/bin/sh");
        if path.exists() {
            assert!(is_executable(&path));
        }
    }
}
