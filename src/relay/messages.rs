//! Events relayed from background work to the presentation loop.

use crate::app::ViewState;
use crate::downloader::progress::ProgressEvent;
use crate::extractor::models::VideoInfo;
use crate::relay::channel::RelaySender;
use crate::utils::error::Failure;
use crate::utils::tools::ToolStatus;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Identifies one download session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}

/// A UI mutation produced off the presentation loop and run on it.
pub struct DeferredAction(Box<dyn FnOnce(&mut ViewState) + Send>);

impl DeferredAction {
    pub fn new(action: impl FnOnce(&mut ViewState) + Send + 'static) -> Self {
        Self(Box::new(action))
    }

    pub fn apply(self, view: &mut ViewState) {
        (self.0)(view)
    }
}

impl fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredAction(..)")
    }
}

/// Events sent from background work to the presentation loop
#[derive(Debug)]
pub enum UiEvent {
    /// Progress or outcome of a download session
    Session { id: SessionId, event: ProgressEvent },
    /// A line for the log pane
    Log(String),
    /// Status bar text
    Status(String),
    /// Download controls may be used again once `id` has ended
    ControlsEnabled(SessionId),
    /// Result of an info query
    InfoReady { url: String, info: VideoInfo },
    InfoFailed { url: String, failure: Failure },
    /// Result of the external tool check
    ToolChecked(ToolStatus),
    /// Anything else the presentation side must do on its own loop
    Deferred(DeferredAction),
}

/// Session-bound sender. Closes itself on the first terminal event so
/// nothing for the session can be delivered after it.
#[derive(Debug, Clone)]
pub struct SessionEmitter {
    id: SessionId,
    sender: RelaySender<UiEvent>,
    closed: Arc<Mutex<bool>>,
}

impl SessionEmitter {
    pub fn new(id: SessionId, sender: RelaySender<UiEvent>) -> Self {
        Self {
            id,
            sender,
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Enqueue `event` for this session. Returns `false` if the session
    /// already ended or the consumer is gone.
    pub fn emit(&self, event: ProgressEvent) -> bool {
        let mut closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
        if *closed {
            return false;
        }
        if event.is_terminal() {
            *closed = true;
        }
        self.sender.send(UiEvent::Session { id: self.id, event })
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }
}
