//! Error types for working copies and the sync scheduler.

use std::path::PathBuf;

use reposync_core::{CoreError, RepositoryId};

/// Errors raised by the Git working-copy client.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// No working copy exists at the expected path.
    #[error("repository not found at {}", path.display())]
    RepositoryNotFound { path: PathBuf },

    /// The clone target already exists.
    #[error("a repository already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// Cloning failed. The message is the underlying git output.
    #[error("git clone failed: {0}")]
    CloneFailed(String),

    /// Pulling failed. The message is the underlying git output.
    #[error("git pull failed: {0}")]
    PullFailed(String),

    /// A filesystem operation on the working copy failed.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local repository could not be opened or inspected.
    #[error("failed to open repository: {0}")]
    Open(String),

    /// Credentials could not be resolved.
    #[error(transparent)]
    Credentials(#[from] CoreError),

    /// A read-only git command (ls-remote, rev-parse) failed.
    #[error("git command failed: {0}")]
    Command(String),
}

impl GitError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::RepositoryNotFound { path: path.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Creates a clone error.
    pub fn clone_failed(msg: impl Into<String>) -> Self {
        Self::CloneFailed(msg.into())
    }

    /// Creates a pull error.
    pub fn pull_failed(msg: impl Into<String>) -> Self {
        Self::PullFailed(msg.into())
    }

    /// Creates a storage error.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the working copy is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RepositoryNotFound { .. })
    }

    /// Returns true if this error might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CloneFailed(_) | Self::PullFailed(_) | Self::Command(_)
        )
    }
}

/// Errors raised by the sync scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The repository store failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// No record matches the given id or name.
    #[error("repository not found in store: {0}")]
    UnknownRepository(String),

    /// The blocking worker running a sync panicked or was cancelled.
    #[error("sync worker for {id} failed: {reason}")]
    Worker { id: RepositoryId, reason: String },
}

impl SchedulerError {
    /// Creates an unknown-repository error.
    pub fn unknown(what: impl ToString) -> Self {
        Self::UnknownRepository(what.to_string())
    }
}
