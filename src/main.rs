//! hexloader - paste a media URL, pick quality and format, download it
//!
//! Console front end over the hexloader library. yt-dlp does the fetching;
//! this binary wires the settings, the orchestrator and the presentation
//! loop together.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use hexloader::app::{Acknowledgment, Presenter, Severity, Surface};
use hexloader::downloader::{MediaFormat, Quality, SessionOutcome};
use hexloader::extractor::{platform, ytdlp, YtDlpExtractor};
use hexloader::utils::{logging, AppConfig, ConfigStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hexloader", version, about)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a video or its audio
    Download(DownloadArgs),
    /// Show title, duration and uploader without downloading
    Info { url: String },
    /// Show which platform a URL belongs to
    Detect { url: String },
    /// Check that yt-dlp and ffmpeg are usable
    CheckTools,
    /// Print the effective settings
    Config,
}

#[derive(Args)]
struct DownloadArgs {
    url: String,

    /// mp4, mkv, webm or mp3
    #[arg(short, long)]
    format: Option<MediaFormat>,

    /// best, 1080p, 720p, 480p, 360p or worst
    #[arg(short, long)]
    quality: Option<Quality>,

    #[arg(long)]
    subtitles: Option<bool>,

    #[arg(long)]
    thumbnail: Option<bool>,

    #[arg(long)]
    metadata: Option<bool>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    user_agent: Option<String>,

    #[arg(long)]
    proxy: Option<String>,

    /// Netscape-format cookies file
    #[arg(long)]
    cookies: Option<PathBuf>,
}

impl DownloadArgs {
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(subtitles) = self.subtitles {
            config.subtitle = subtitles;
        }
        if let Some(thumbnail) = self.thumbnail {
            config.thumbnail = thumbnail;
        }
        if let Some(metadata) = self.metadata {
            config.metadata = metadata;
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if let Some(cookies) = &self.cookies {
            config.cookies_file = Some(cookies.clone());
        }
    }
}

/// Prints view output to the terminal
#[derive(Default)]
struct Console {
    last_percent: Option<u32>,
}

impl Surface for Console {
    fn log_line(&mut self, line: &str) {
        println!("{}", line);
    }

    fn acknowledge(&mut self, ack: &Acknowledgment) {
        let text = format!("\n== {} ==\n{}\n", ack.title, ack.body);
        match ack.severity {
            Severity::Info => println!("{}", text),
            Severity::Warning | Severity::Error => eprintln!("{}", text),
        }
    }

    fn status(&mut self, progress: f64, status: &str) {
        if status.starts_with("Downloading") {
            let percent = progress as u32;
            if self.last_percent == Some(percent) {
                return;
            }
            self.last_percent = Some(percent);
        } else {
            self.last_percent = None;
        }
        println!("  {}", status);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = logging::init(cli.verbose) {
        tracing::debug!("Logging to {:?}", path);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command))
}

async fn run(command: Command) -> Result<()> {
    if matches!(command, Command::Download(_) | Command::Info { .. }) {
        check_ytdlp_installed();
    }

    match command {
        Command::Download(args) => download(args).await,
        Command::Info { url } => info(&url).await,
        Command::Detect { url } => {
            println!("{}", platform::platform_label(&url));
            if let Some(platform) = platform::detect(&url) {
                println!("Containers: {}", platform.native_containers().join(", "));
            }
            Ok(())
        }
        Command::CheckTools => check_tools().await,
        Command::Config => {
            let store = ConfigStore::default_location();
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&store.load())?);
            Ok(())
        }
    }
}

fn extractor() -> Result<Arc<YtDlpExtractor>> {
    Ok(Arc::new(YtDlpExtractor::new()?))
}

/// Warn, without failing, when yt-dlp can't be found.
fn check_ytdlp_installed() {
    if ytdlp::find_ytdlp().is_some() {
        return;
    }
    eprintln!("WARNING: yt-dlp not found in common locations");
    eprintln!("Downloads and info queries will fail until it is installed:");
    eprintln!("  pip install yt-dlp");
    eprintln!("  or: brew install yt-dlp");
    eprintln!("  or visit: https://github.com/yt-dlp/yt-dlp");
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn download(args: DownloadArgs) -> Result<()> {
    let extractor = extractor()?;
    let store = ConfigStore::default_location();
    let mut config = store.load();
    args.apply_to(&mut config);

    println!("{}", platform::platform_label(&args.url));

    let mut presenter = Presenter::new(config, store, extractor, Console::default());
    presenter.check_tools();

    if presenter.start_download(&args.url)?.is_none() {
        bail!("a download is already running");
    }

    presenter.run_until_settled(interrupted()).await;

    match presenter.orchestrator().last_outcome() {
        Some((_, SessionOutcome::Finished { .. })) => Ok(()),
        Some((_, SessionOutcome::Cancelled)) => bail!("download cancelled"),
        Some((_, SessionOutcome::Failed(failure))) => bail!(failure.message),
        None => bail!("download did not finish"),
    }
}

async fn info(url: &str) -> Result<()> {
    let extractor = extractor()?;
    let store = ConfigStore::default_location();
    let config = store.load();

    let mut presenter = Presenter::new(config, store, extractor, Console::default());
    presenter.fetch_info(url)?;
    presenter.run_until_settled(interrupted()).await;

    if presenter.view().last_info().is_none() {
        bail!("could not fetch video information");
    }
    Ok(())
}

async fn check_tools() -> Result<()> {
    match ytdlp::find_ytdlp() {
        Some(command) => {
            let version = YtDlpExtractor::from_command(command.program.clone(), command.leading_args)
                .version()
                .await;
            match version {
                Some(version) => println!("yt-dlp: ✓ {} ({})", version, command.program.display()),
                None => println!("yt-dlp: ✗ Not working ({})", command.program.display()),
            }
        }
        None => println!("yt-dlp: ✗ Not installed"),
    }

    let store = ConfigStore::default_location();
    let extractor: Arc<dyn hexloader::Extractor> = match YtDlpExtractor::new() {
        Ok(extractor) => Arc::new(extractor),
        Err(_) => Arc::new(YtDlpExtractor::from_command("yt-dlp", Vec::new())),
    };
    let mut presenter = Presenter::new(store.load(), store, extractor, Console::default());
    presenter.check_tools();
    presenter.run_until_settled(interrupted()).await;
    println!("{}", presenter.view().tool_label());
    Ok(())
}
