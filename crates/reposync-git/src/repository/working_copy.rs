//! Working-copy trait definitions.

use std::sync::Arc;

use reposync_core::{CredentialProvider, RepositoryRecord};

use super::{GitClient, GitClientConfig, PullOutcome};
use crate::error::GitError;

/// A local mirror of a remote repository, as seen by the sync scheduler.
///
/// Every method blocks and is called from a blocking worker.
///
/// # Implementors
///
/// - `GitClient` - backed by the git executable and gix
pub trait WorkingCopy: Send + Sync {
    /// Returns true if the working copy has been materialized.
    fn exists(&self) -> bool;

    /// Clones `url` at `branch` into the working copy.
    fn clone_repo(&self, url: &str, branch: &str) -> Result<(), GitError>;

    /// Pulls the latest changes, refreshing `origin` from `url` if given.
    fn pull(&self, url: Option<&str>) -> Result<PullOutcome, GitError>;

    /// Removes the working copy.
    fn delete(&self) -> Result<(), GitError>;

    /// Returns the local `HEAD` commit id.
    fn head(&self) -> Result<String, GitError>;

    /// Returns true if the working copy already matches the remote.
    ///
    /// The default never claims to be up to date, so every sync pulls.
    fn relevance(&self, url: Option<&str>) -> Result<bool, GitError> {
        let _ = url;
        Ok(false)
    }
}

impl WorkingCopy for GitClient {
    fn exists(&self) -> bool {
        GitClient::exists(self)
    }

    fn clone_repo(&self, url: &str, branch: &str) -> Result<(), GitError> {
        GitClient::clone_repo(self, url, branch)
    }

    fn pull(&self, url: Option<&str>) -> Result<PullOutcome, GitError> {
        GitClient::pull(self, url)
    }

    fn delete(&self) -> Result<(), GitError> {
        GitClient::delete(self)
    }

    fn head(&self) -> Result<String, GitError> {
        GitClient::head(self)
    }

    fn relevance(&self, url: Option<&str>) -> Result<bool, GitError> {
        GitClient::relevance(self, url)
    }
}

/// Builds the working copy for a repository record.
pub trait WorkingCopyFactory: Send + Sync {
    /// Returns a working copy bound to `record`'s folder, branch and credentials.
    fn working_copy(&self, record: &RepositoryRecord) -> Arc<dyn WorkingCopy>;
}

/// Factory producing [`GitClient`]s under one storage root.
#[derive(Clone)]
pub struct GitClientFactory {
    config: Arc<GitClientConfig>,
    credentials: Arc<dyn CredentialProvider>,
}

impl GitClientFactory {
    /// Creates a new factory.
    pub fn new(config: GitClientConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            config: Arc::new(config),
            credentials,
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &GitClientConfig {
        &self.config
    }

    /// Builds a concrete client for `record`.
    pub fn client(&self, record: &RepositoryRecord) -> GitClient {
        GitClient::new(
            Arc::clone(&self.config),
            &record.name,
            Arc::clone(&self.credentials),
        )
        .with_branch(record.branch.clone())
        .with_credential_ref(record.credential_ref.clone())
    }
}

impl WorkingCopyFactory for GitClientFactory {
    fn working_copy(&self, record: &RepositoryRecord) -> Arc<dyn WorkingCopy> {
        Arc::new(self.client(record))
    }
}

impl std::fmt::Debug for GitClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitClientFactory")
            .field("storage_root", &self.config.storage_root())
            .finish()
    }
}
