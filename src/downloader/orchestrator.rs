//! Runs one download at a time on a background task
//!
//! State machine: `Idle -> Running -> {Finished, Cancelled, Failed} -> Idle`.
//! Terminal states are transient: the background task records the outcome,
//! flips back to `Idle`, then reports the terminal event and re-enables the
//! download controls through the relay.
//!
//! Precedence when cancellation races with completion: if the library has
//! already returned a result the session is `Finished`; a library failure
//! that surfaces while the cancel flag is set is reported as `Cancelled`.

use crate::downloader::options::{self, DownloadOptions, DownloadRequest, NetworkOptions, NetworkSettings};
use crate::downloader::progress::ProgressEvent;
use crate::extractor::models::RawProgress;
use crate::extractor::traits::{AbortDownload, Extractor};
use crate::relay::{CancelFlag, RelaySender, SessionEmitter, SessionId, UiEvent};
use crate::utils::error::{truncate, ExtractError, Failure, HexError};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Whether a download is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running(SessionId),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Finished { title: String },
    Cancelled,
    Failed(Failure),
}

impl SessionOutcome {
    fn to_event(&self) -> ProgressEvent {
        match self {
            SessionOutcome::Finished { title } => ProgressEvent::Finished {
                title: title.clone(),
            },
            SessionOutcome::Cancelled => ProgressEvent::Cancelled,
            SessionOutcome::Failed(failure) => ProgressEvent::Failed {
                message: failure.message.clone(),
            },
        }
    }
}

#[derive(Debug)]
struct SessionSlot {
    state: SessionState,
    last_outcome: Option<(SessionId, SessionOutcome)>,
}

/// Handle to a started session
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait until the session has reported its terminal event.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!("Session {} task ended abnormally: {}", self.id, e);
        }
    }
}

/// Download orchestrator
pub struct Orchestrator {
    extractor: Arc<dyn Extractor>,
    events: RelaySender<UiEvent>,
    cancel: CancelFlag,
    slot: Arc<Mutex<SessionSlot>>,
}

fn lock(slot: &Mutex<SessionSlot>) -> MutexGuard<'_, SessionSlot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

impl Orchestrator {
    pub fn new(extractor: Arc<dyn Extractor>, events: RelaySender<UiEvent>) -> Self {
        Self {
            extractor,
            events,
            cancel: CancelFlag::new(),
            slot: Arc::new(Mutex::new(SessionSlot {
                state: SessionState::Idle,
                last_outcome: None,
            })),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.slot).state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), SessionState::Running(_))
    }

    /// Outcome of the most recently finished session
    pub fn last_outcome(&self) -> Option<(SessionId, SessionOutcome)> {
        lock(&self.slot).last_outcome.clone()
    }

    /// Start a download in the background.
    ///
    /// Returns `Ok(None)` without doing anything if a session is already
    /// running. Validation failures are returned before any work is spawned.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, mut request: DownloadRequest) -> Result<Option<SessionHandle>, HexError> {
        if let SessionState::Running(id) = self.state() {
            debug!("Ignoring start request, session {} is running", id);
            return Ok(None);
        }

        request.validate()?;
        let options = options::build(&request);

        let id = {
            let mut slot = lock(&self.slot);
            if let SessionState::Running(id) = slot.state {
                debug!("Ignoring start request, session {} is running", id);
                return Ok(None);
            }
            let id = SessionId::new();
            self.cancel.reset();
            slot.state = SessionState::Running(id);
            id
        };

        info!(
            "Session {} started: {} ({} / {})",
            id, request.url, request.format, request.quality
        );

        let emitter = SessionEmitter::new(id, self.events.clone());
        self.events.send(UiEvent::Log("Starting download...".to_string()));
        emitter.emit(ProgressEvent::Downloading {
            percent: 0.0,
            speed_bytes_per_sec: None,
        });

        let task = tokio::spawn(run_session(
            Arc::clone(&self.extractor),
            request.url,
            options,
            self.cancel.clone(),
            emitter,
            Arc::clone(&self.slot),
            self.events.clone(),
        ));

        Ok(Some(SessionHandle { id, task }))
    }

    /// Ask the running session to stop at its next progress checkpoint.
    ///
    /// Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        let slot = lock(&self.slot);
        match slot.state {
            SessionState::Running(id) => {
                self.cancel.cancel();
                info!("Cancellation requested for session {}", id);
                self.events.send(UiEvent::Status("Cancelling...".to_string()));
                self.events
                    .send(UiEvent::Log("Cancelling download...".to_string()));
                true
            }
            SessionState::Idle => false,
        }
    }

    /// Query metadata without downloading. Runs independently of any
    /// download session and reports through the relay.
    pub fn get_info(
        &self,
        url: &str,
        network: &NetworkSettings,
    ) -> Result<JoinHandle<()>, HexError> {
        let url = url.trim().to_string();
        options::validate_url(&url)?;

        self.events.send(UiEvent::Log(format!(
            "Fetching info for: {}...",
            truncate(&url, 50)
        )));

        let extractor = Arc::clone(&self.extractor);
        let events = self.events.clone();
        let network = NetworkOptions::from_settings(network);

        Ok(tokio::spawn(async move {
            match extractor.fetch_info(&url, &network).await {
                Ok(info) => {
                    debug!("Fetched info for {}: {}", url, info.title);
                    events.send(UiEvent::InfoReady { url, info });
                }
                Err(e) => {
                    warn!("Info query for {} failed: {}", url, e);
                    let failure = Failure::from_extract_error(&e);
                    events.send(UiEvent::InfoFailed { url, failure });
                }
            }
        }))
    }
}

async fn run_session(
    extractor: Arc<dyn Extractor>,
    url: String,
    options: DownloadOptions,
    cancel: CancelFlag,
    emitter: SessionEmitter,
    slot: Arc<Mutex<SessionSlot>>,
    events: RelaySender<UiEvent>,
) {
    let id = emitter.id();

    let hook_cancel = cancel.clone();
    let hook_emitter = emitter.clone();
    let mut hook = move |raw: &RawProgress| -> Result<(), AbortDownload> {
        if hook_cancel.is_cancelled() {
            return Err(AbortDownload);
        }
        if let Some(event) = ProgressEvent::from_raw(raw) {
            hook_emitter.emit(event);
        }
        Ok(())
    };

    // Run the library call in its own task so a panic inside it still
    // produces a terminal event.
    let call = tokio::spawn(async move { extractor.download(&url, &options, &mut hook).await });

    let outcome = match call.await {
        Ok(Ok(info)) => SessionOutcome::Finished { title: info.title },
        Ok(Err(ExtractError::Cancelled)) => SessionOutcome::Cancelled,
        Ok(Err(e)) if cancel.is_cancelled() => {
            debug!("Session {} failed after cancellation request: {}", id, e);
            SessionOutcome::Cancelled
        }
        Ok(Err(e)) => SessionOutcome::Failed(Failure::from_extract_error(&e)),
        Err(e) => SessionOutcome::Failed(Failure::unexpected(&e.to_string())),
    };

    match &outcome {
        SessionOutcome::Finished { title } => info!("Session {} finished: {}", id, title),
        SessionOutcome::Cancelled => info!("Session {} cancelled", id),
        SessionOutcome::Failed(failure) => {
            error!("Session {} failed ({:?}): {}", id, failure.kind, failure.message)
        }
    }

    {
        let mut slot = lock(&slot);
        slot.state = SessionState::Idle;
        slot.last_outcome = Some((id, outcome.clone()));
    }

    emitter.emit(outcome.to_event());
    events.send(UiEvent::ControlsEnabled(id));
}
