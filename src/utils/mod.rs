//! Utility modules for error handling, configuration and the host system

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod tools;

pub use config::{AppConfig, ConfigStore};
pub use error::{ExtractError, Failure, FailureKind, HexError};
pub use tools::ToolStatus;
