//! Daemon error types.

use reposync_core::CoreError;
use reposync_git::SchedulerError;

/// Errors raised while configuring or running the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Settings could not be loaded or deserialized.
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    /// Settings were loaded but are not usable.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The repository store could not be opened.
    #[error("failed to open repository store: {0}")]
    Store(#[from] CoreError),

    /// The scheduler failed to start.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl DaemonError {
    /// Creates an invalid-settings error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }
}
