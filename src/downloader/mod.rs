//! Download requests, progress events and the session orchestrator

pub mod options;
pub mod orchestrator;
pub mod progress;

pub use options::{DownloadOptions, DownloadRequest, MediaFormat, NetworkSettings, Quality};
pub use orchestrator::{Orchestrator, SessionHandle, SessionOutcome, SessionState};
pub use progress::ProgressEvent;
