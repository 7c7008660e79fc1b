//! Presentation loop and view model
//!
//! `Presenter` owns the settings, the orchestrator and the receiving end of
//! the relay. Every `POLL_INTERVAL` it drains whatever background work has
//! queued and applies it to `ViewState`, then pushes new output to the
//! `Surface`. Background tasks never touch `ViewState` directly.

use crate::downloader::orchestrator::Orchestrator;
use crate::downloader::progress::ProgressEvent;
use crate::extractor::models::VideoInfo;
use crate::extractor::traits::Extractor;
use crate::relay::{relay, RelayReceiver, RelaySender, SessionId, UiEvent};
use crate::utils::config::{AppConfig, ConfigStore};
use crate::utils::error::{Failure, FailureKind, HexError};
use crate::utils::tools::{self, ToolStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Drain cadence of the presentation loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message the user has to acknowledge (a dialog in a windowed front end)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

/// Everything the user can see
#[derive(Debug)]
pub struct ViewState {
    progress: f64,
    status: String,
    log: Vec<String>,
    acknowledgments: Vec<Acknowledgment>,
    controls_enabled: bool,
    tool_label: String,
    session: Option<SessionId>,
    last_info: Option<VideoInfo>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            progress: 0.0,
            status: "Ready".to_string(),
            log: Vec::new(),
            acknowledgments: Vec::new(),
            controls_enabled: true,
            tool_label: "FFmpeg: Checking...".to_string(),
            session: None,
            last_info: None,
        }
    }
}

impl ViewState {
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }

    /// Timestamped log lines, oldest first
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn acknowledgments(&self) -> &[Acknowledgment] {
        &self.acknowledgments
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn tool_label(&self) -> &str {
        &self.tool_label
    }

    /// The session whose events are currently shown
    pub fn active_session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn last_info(&self) -> Option<&VideoInfo> {
        self.last_info.as_ref()
    }

    /// Append `[HH:MM:SS] message` to the log.
    pub fn push_log(&mut self, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push(format!("[{}] {}", timestamp, message));
    }

    pub fn acknowledge(&mut self, severity: Severity, title: &str, body: &str) {
        self.acknowledgments.push(Acknowledgment {
            severity,
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    /// Show events from `id` from now on and lock the download controls.
    pub fn begin_session(&mut self, id: SessionId) {
        self.session = Some(id);
        self.controls_enabled = false;
        self.progress = 0.0;
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Session { id, event } => {
                if self.session == Some(id) {
                    self.apply_progress(event);
                } else {
                    debug!("Dropping event for inactive session {}", id);
                }
            }
            UiEvent::Log(line) => self.push_log(&line),
            UiEvent::Status(status) => self.status = status,
            UiEvent::ControlsEnabled(id) => match self.session {
                Some(active) if active != id => {
                    debug!("Ignoring controls release from ended session {}", id)
                }
                _ => self.controls_enabled = true,
            },
            UiEvent::InfoReady { info, .. } => {
                self.push_log("✓ Info fetched successfully");
                self.acknowledge(Severity::Info, "Video Information", &info.summary());
                self.last_info = Some(info);
            }
            UiEvent::InfoFailed { failure, .. } => self.push_log(&failure_line(&failure)),
            UiEvent::ToolChecked(status) => {
                self.tool_label = status.label();
                if status == ToolStatus::NotInstalled {
                    self.push_log("⚠ FFmpeg not found - some features may not work");
                    self.acknowledge(
                        Severity::Warning,
                        "FFmpeg Required",
                        "FFmpeg is required for audio extraction and format conversion.\n\nPlease install FFmpeg from: https://ffmpeg.org",
                    );
                }
            }
            UiEvent::Deferred(action) => action.apply(self),
        }
    }

    fn apply_progress(&mut self, event: ProgressEvent) {
        self.status = event.status_text();
        match event {
            ProgressEvent::Downloading { percent, .. } => self.progress = percent,
            ProgressEvent::Processing => {}
            ProgressEvent::Finished { title } => {
                self.progress = 100.0;
                self.push_log(&format!("✓ Download complete: {}", title));
                self.acknowledge(
                    Severity::Info,
                    "Success",
                    &format!("Downloaded successfully!\n\n{}", title),
                );
                self.session = None;
            }
            ProgressEvent::Cancelled => {
                self.push_log("✗ Download cancelled");
                self.session = None;
            }
            ProgressEvent::Failed { message } => {
                self.push_log(&format!("✗ Download failed: {}", message));
                self.acknowledge(
                    Severity::Error,
                    "Error",
                    &format!("Download failed:\n\n{}", message),
                );
                self.session = None;
            }
        }
    }
}

fn failure_line(failure: &Failure) -> String {
    match failure.kind {
        FailureKind::Access | FailureKind::Availability => format!("✗ {}", failure.message),
        FailureKind::Library | FailureKind::Unexpected => format!("✗ Error: {}", failure.message),
    }
}

/// Where new view output is shown
pub trait Surface {
    fn log_line(&mut self, line: &str);

    fn acknowledge(&mut self, ack: &Acknowledgment);

    /// Called when the status text changes.
    fn status(&mut self, _progress: f64, _status: &str) {}
}

/// Surface that shows nothing; the view state still records everything.
#[derive(Debug, Default)]
pub struct Headless;

impl Surface for Headless {
    fn log_line(&mut self, _line: &str) {}

    fn acknowledge(&mut self, _ack: &Acknowledgment) {}
}

/// The presentation loop
pub struct Presenter<S: Surface> {
    config: AppConfig,
    store: ConfigStore,
    orchestrator: Orchestrator,
    inbox: RelayReceiver<UiEvent>,
    outbox: RelaySender<UiEvent>,
    view: ViewState,
    surface: S,
    pending_queries: usize,
    shown_log: usize,
    shown_acks: usize,
    shown_status: String,
}

impl<S: Surface> Presenter<S> {
    pub fn new(
        config: AppConfig,
        store: ConfigStore,
        extractor: Arc<dyn Extractor>,
        surface: S,
    ) -> Self {
        let (outbox, inbox) = relay();
        let orchestrator = Orchestrator::new(extractor, outbox.clone());
        let view = ViewState::default();
        let shown_status = view.status().to_string();

        Self {
            config,
            store,
            orchestrator,
            inbox,
            outbox,
            view,
            surface,
            pending_queries: 0,
            shown_log: 0,
            shown_acks: 0,
            shown_status,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Sender for code that wants to queue its own `UiEvent`s.
    pub fn sender(&self) -> RelaySender<UiEvent> {
        self.outbox.clone()
    }

    /// Start downloading `url` with the current settings.
    ///
    /// Settings are saved before the session starts. Returns `Ok(None)`
    /// when a download is already running.
    pub fn start_download(&mut self, url: &str) -> Result<Option<SessionId>, HexError> {
        // The previous session lasts until its terminal event is shown
        if self.orchestrator.is_running() || self.view.active_session().is_some() {
            debug!("Download already running, ignoring start");
            return Ok(None);
        }

        let mut request = self.config.request(url);
        if let Err(e) = request.validate() {
            self.report_rejection(&e);
            return Err(e);
        }

        self.save_settings();

        let started = match self.orchestrator.start(request) {
            Ok(started) => started,
            Err(e) => {
                self.report_rejection(&e);
                return Err(e);
            }
        };

        let id = started.map(|handle| {
            let id = handle.id();
            self.view.begin_session(id);
            id
        });
        self.flush();
        Ok(id)
    }

    pub fn cancel_download(&mut self) -> bool {
        self.orchestrator.cancel()
    }

    /// Query metadata for `url` in the background.
    pub fn fetch_info(&mut self, url: &str) -> Result<(), HexError> {
        let network = self.config.network();
        match self.orchestrator.get_info(url, &network) {
            Ok(_) => {
                self.pending_queries += 1;
                self.flush();
                Ok(())
            }
            Err(e) => {
                self.report_rejection(&e);
                Err(e)
            }
        }
    }

    /// Probe ffmpeg in the background.
    pub fn check_tools(&mut self) {
        self.pending_queries += 1;
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            let status = tools::probe_ffmpeg().await;
            outbox.send(UiEvent::ToolChecked(status));
        });
    }

    /// Persist the current settings. Failures are logged, never shown.
    pub fn save_settings(&mut self) {
        match self.store.save(&self.config) {
            Ok(()) => {
                info!("Settings saved to {:?}", self.store.path());
                self.view.push_log("Settings saved");
            }
            Err(e) => error!("Failed to save settings: {}", e),
        }
    }

    /// Apply everything queued so far. Returns the number of events applied.
    pub fn tick(&mut self) -> usize {
        let events = self.inbox.drain();
        let count = events.len();

        for event in events {
            if matches!(
                event,
                UiEvent::InfoReady { .. } | UiEvent::InfoFailed { .. } | UiEvent::ToolChecked(_)
            ) {
                self.pending_queries = self.pending_queries.saturating_sub(1);
            }
            self.view.apply(event);
        }

        self.flush();
        count
    }

    /// No download, query or queued event is outstanding.
    pub fn is_settled(&self) -> bool {
        !self.orchestrator.is_running()
            && self.view.active_session().is_none()
            && self.pending_queries == 0
            && self.inbox.is_empty()
    }

    /// Tick every `POLL_INTERVAL` until settled.
    ///
    /// When `interrupt` completes the running download is cancelled and the
    /// loop keeps going until the session reports its end. With no download
    /// running, an interrupt stops the loop right away.
    pub async fn run_until_settled<F>(&mut self, interrupt: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(interrupt);
        let mut interrupted = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                    if self.is_settled() {
                        break;
                    }
                }
                _ = &mut interrupt, if !interrupted => {
                    interrupted = true;
                    if !self.cancel_download() {
                        warn!("Interrupted with no download running");
                        self.tick();
                        break;
                    }
                }
            }
        }
    }

    fn report_rejection(&mut self, err: &HexError) {
        warn!("Request rejected: {}", err);
        match err {
            HexError::EmptyUrl => {
                self.view
                    .acknowledge(Severity::Warning, "Warning", &err.to_string())
            }
            HexError::InvalidUrl(_) => {
                self.view
                    .acknowledge(Severity::Warning, "Invalid URL", &err.to_string())
            }
            _ => self.view.acknowledge(Severity::Error, "Error", &err.to_string()),
        }
        self.flush();
    }

    fn flush(&mut self) {
        for line in &self.view.log()[self.shown_log..] {
            self.surface.log_line(line);
        }
        self.shown_log = self.view.log().len();

        for ack in &self.view.acknowledgments()[self.shown_acks..] {
            self.surface.acknowledge(ack);
        }
        self.shown_acks = self.view.acknowledgments().len();

        if self.view.status() != self.shown_status {
            self.shown_status = self.view.status().to_string();
            self.surface.status(self.view.progress(), self.view.status());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_event(id: SessionId, event: ProgressEvent) -> UiEvent {
        UiEvent::Session { id, event }
    }

    #[test]
    fn test_log_lines_are_timestamped() {
        let mut view = ViewState::default();
        view.push_log("hello");
        let line = &view.log()[0];
        assert!(line.starts_with('['));
        assert_eq!(&line[10..], " hello");
        assert_eq!(line.as_bytes()[3], b':');
    }

    #[test]
    fn test_progress_updates_status() {
        let mut view = ViewState::default();
        let id = SessionId::new();
        view.begin_session(id);
        assert!(!view.controls_enabled());

        view.apply(session_event(
            id,
            ProgressEvent::Downloading {
                percent: 50.0,
                speed_bytes_per_sec: Some(2.0 * 1024.0 * 1024.0),
            },
        ));
        assert_eq!(view.progress(), 50.0);
        assert_eq!(view.status(), "Downloading: 50% (2.0 MB/s)");

        view.apply(session_event(id, ProgressEvent::Processing));
        assert_eq!(view.status(), "Processing...");
    }

    #[test]
    fn test_finished_logs_once_and_acknowledges() {
        let mut view = ViewState::default();
        let id = SessionId::new();
        view.begin_session(id);
        view.apply(session_event(id, ProgressEvent::Finished { title: "Clip".into() }));
        view.apply(UiEvent::ControlsEnabled(id));

        assert_eq!(view.log().len(), 1);
        assert!(view.log()[0].ends_with("✓ Download complete: Clip"));
        assert_eq!(view.acknowledgments().len(), 1);
        assert_eq!(view.acknowledgments()[0].title, "Success");
        assert_eq!(view.progress(), 100.0);
        assert!(view.controls_enabled());
        assert_eq!(view.active_session(), None);
    }

    #[test]
    fn test_cancelled_has_no_acknowledgment() {
        let mut view = ViewState::default();
        let id = SessionId::new();
        view.begin_session(id);
        view.apply(session_event(id, ProgressEvent::Cancelled));

        assert_eq!(view.log().len(), 1);
        assert!(view.log()[0].ends_with("✗ Download cancelled"));
        assert!(view.acknowledgments().is_empty());
    }

    #[test]
    fn test_failed_acknowledges_error() {
        let mut view = ViewState::default();
        let id = SessionId::new();
        view.begin_session(id);
        view.apply(session_event(
            id,
            ProgressEvent::Failed {
                message: "boom".into(),
            },
        ));

        assert!(view.log()[0].ends_with("✗ Download failed: boom"));
        let ack = &view.acknowledgments()[0];
        assert_eq!(ack.severity, Severity::Error);
        assert_eq!(ack.body, "Download failed:\n\nboom");
    }

    #[test]
    fn test_events_from_other_sessions_are_ignored() {
        let mut view = ViewState::default();
        view.begin_session(SessionId::new());
        view.apply(session_event(SessionId::new(), ProgressEvent::Cancelled));
        assert!(view.log().is_empty());
        assert!(view.active_session().is_some());
    }

    #[test]
    fn test_stale_controls_release_keeps_controls_locked() {
        let mut view = ViewState::default();
        let first = SessionId::new();
        view.begin_session(first);
        view.apply(session_event(first, ProgressEvent::Cancelled));

        let second = SessionId::new();
        view.begin_session(second);
        view.apply(UiEvent::ControlsEnabled(first));
        assert!(!view.controls_enabled());

        view.apply(session_event(second, ProgressEvent::Cancelled));
        view.apply(UiEvent::ControlsEnabled(second));
        assert!(view.controls_enabled());
    }

    #[test]
    fn test_info_results() {
        let mut view = ViewState::default();
        let info = VideoInfo {
            title: "Talk".into(),
            duration: Some(3725.0),
            ..Default::default()
        };
        view.apply(UiEvent::InfoReady {
            url: "https://youtu.be/x".into(),
            info,
        });
        assert!(view.log()[0].ends_with("✓ Info fetched successfully"));
        assert_eq!(
            view.acknowledgments()[0].body,
            "Title: Talk\nDuration: 1:02:05\nUploader: Unknown"
        );

        view.apply(UiEvent::InfoFailed {
            url: "https://youtu.be/y".into(),
            failure: Failure::from_library_text("ERROR: Private video"),
        });
        assert!(view.log()[1].ends_with("✗ Private/age-restricted video (use cookies)"));

        view.apply(UiEvent::InfoFailed {
            url: "https://youtu.be/z".into(),
            failure: Failure::from_library_text("HTTP Error 500"),
        });
        assert!(view.log()[2].ends_with("✗ Error: HTTP Error 500"));
    }

    #[test]
    fn test_missing_ffmpeg_warns() {
        let mut view = ViewState::default();
        view.apply(UiEvent::ToolChecked(ToolStatus::NotInstalled));
        assert_eq!(view.tool_label(), "FFmpeg: ✗ Not installed");
        assert_eq!(view.acknowledgments()[0].title, "FFmpeg Required");

        let mut view = ViewState::default();
        view.apply(UiEvent::ToolChecked(ToolStatus::Available {
            version: "6.0".into(),
        }));
        assert_eq!(view.tool_label(), "FFmpeg: ✓ 6.0");
        assert!(view.acknowledgments().is_empty());
    }
}
