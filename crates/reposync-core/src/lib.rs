//! RepoSync Core - Domain types and traits
//!
//! This crate provides the foundational types shared by the RepoSync
//! synchronization engine: repository records, credentials, and the store
//! abstraction records are read from and written to.

pub mod credentials;
pub mod error;
pub mod record;
pub mod store;

pub use credentials::{CredentialProvider, Credentials, NoCredentials, StaticCredentials};
pub use error::{CoreError, Result};
pub use record::{
    DEFAULT_BRANCH, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, DEFAULT_SYNC_INTERVAL,
    Ineligibility, RepoStatus, RepositoryId, RepositoryRecord, SyncStatus, is_ssh_url,
};
pub use store::{FileStore, InMemoryStore, RepositoryStore};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
