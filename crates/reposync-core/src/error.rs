//! Error types for RepoSync core.
//!
//! This module defines the errors raised by the collaborators the
//! synchronization core depends on: the repository store and the
//! credential provider. All errors implement the standard
//! `std::error::Error` trait via `thiserror`.
//!
//! # Example
//!
//! ```
//! use reposync_core::{CoreError, Result};
//!
//! fn load(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(CoreError::store("repository name cannot be empty"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(load("").unwrap_err().is_store_error());
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for RepoSync core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The repository store failed to read or persist a record.
    #[error("Store error: {message}")]
    Store {
        /// Description of what went wrong
        message: String,
        /// Underlying error, if any
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Credentials could not be resolved for a reference.
    #[error("Credentials not available for '{reference}': {reason}")]
    Credentials {
        /// The credential reference that was requested
        reference: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// A store file could not be (de)serialized.
    #[error("Failed to (de)serialize '{}': {cause}", path.display())]
    Serialization {
        /// File being read or written
        path: PathBuf,
        /// Underlying serde error
        #[source]
        cause: serde_json::Error,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a Store error without a cause.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a Store error with a cause.
    pub fn store_with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Creates a Credentials error.
    pub fn credentials(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Credentials {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Serialization error.
    pub fn serialization(path: impl Into<PathBuf>, cause: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            cause,
        }
    }

    /// Returns true if this is a store error.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Returns true if this is a credentials error.
    pub fn is_credentials_error(&self) -> bool {
        matches!(self, Self::Credentials { .. })
    }
}

/// Type alias for Results with CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_store_error_display() {
        let error = CoreError::store("connection refused");
        assert_eq!(error.to_string(), "Store error: connection refused");
        assert!(error.is_store_error());
        assert!(error.source().is_none());
    }

    #[test]
    fn test_store_error_with_cause() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error = CoreError::store_with_cause("could not write store", io_error);

        assert!(error.source().is_some());
        assert!(error.is_store_error());
    }

    #[test]
    fn test_credentials_error() {
        let error = CoreError::credentials("bitbucket", "unknown reference");
        let msg = error.to_string();

        assert!(msg.contains("bitbucket"));
        assert!(msg.contains("unknown reference"));
        assert!(error.is_credentials_error());
        assert!(!error.is_store_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: CoreError = io_error.into();

        assert!(matches!(error, CoreError::Io(_)));
    }
}
