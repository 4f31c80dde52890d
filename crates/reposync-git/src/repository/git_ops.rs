//! Working-copy operations.
//!
//! Clones and pulls go through the system `git` executable, which handles
//! shallow single-branch clones and fast-forward merges of the worktree. Local
//! inspection (reading `HEAD`) goes through a cached gix repository handle.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use parking_lot::Mutex;
use reposync_core::{CredentialProvider, Credentials, DEFAULT_BRANCH, is_ssh_url};
use tracing::{debug, info, warn};

use super::GitClientConfig;
use super::auth::{auth_config_args, authenticated_url, display_url};
use crate::error::GitError;

/// Result of a successful pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    /// `HEAD` after the pull.
    pub head: String,
    /// Whether `HEAD` moved.
    pub updated: bool,
}

/// A local mirror of one remote repository.
///
/// All methods block; callers on an async runtime run them on a blocking
/// worker.
pub struct GitClient {
    config: Arc<GitClientConfig>,
    path: PathBuf,
    branch: String,
    credential_ref: Option<String>,
    credentials: Arc<dyn CredentialProvider>,
    repository: Mutex<Option<gix::ThreadSafeRepository>>,
}

impl GitClient {
    /// Creates a client for the working copy `root/folder`.
    pub fn new(
        config: Arc<GitClientConfig>,
        folder: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            path: config.working_copy_path(folder),
            config,
            branch: DEFAULT_BRANCH.to_string(),
            credential_ref: None,
            credentials,
            repository: Mutex::new(None),
        }
    }

    /// Sets the branch tracked by staleness checks.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the reference handed to the credential provider.
    pub fn with_credential_ref(mut self, reference: Option<String>) -> Self {
        self.credential_ref = reference;
        self
    }

    /// Returns the working copy path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the working copy directory exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Clones `url` at `branch` into the working copy path.
    ///
    /// The clone is shallow and single-branch. On failure nothing is left
    /// behind at the target path.
    ///
    /// # Errors
    ///
    /// - `GitError::AlreadyExists` if the target path exists (nothing is touched)
    /// - `GitError::CloneFailed` if git fails, with git's output
    pub fn clone_repo(&self, url: &str, branch: &str) -> Result<(), GitError> {
        if self.path.exists() {
            return Err(GitError::already_exists(&self.path));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GitError::clone_failed(format!(
                    "Failed to create parent directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let credentials = self.resolve_credentials()?;
        let remote = authenticated_url(url, &credentials);
        let depth = self.config.depth().to_string();

        info!(
            "Cloning {} ({}) into {:?}",
            display_url(url),
            branch,
            self.path
        );

        let mut cmd = self.git_command(url, &credentials);
        cmd.args([
            "clone",
            "--depth",
            depth.as_str(),
            "--single-branch",
            "--branch",
            branch,
            "--",
            remote.as_str(),
        ])
        .arg(&self.path);

        let output = cmd
            .output()
            .map_err(|e| GitError::clone_failed(format!("Unexpected clone error: {}", e)))?;

        if !output.status.success() {
            if self.path.exists()
                && let Err(e) = std::fs::remove_dir_all(&self.path)
            {
                warn!("Failed to remove partial clone at {:?}: {}", self.path, e);
            }
            return Err(GitError::clone_failed(
                credentials.redact(&format_git_error(&output)),
            ));
        }

        *self.repository.lock() = None;
        debug!("Clone finished at {:?}", self.path);
        Ok(())
    }

    /// Pulls the tracked branch, fast-forward only.
    ///
    /// When `url` is given for an HTTP(S) remote, `origin` is first rewritten
    /// with freshly resolved credentials, so rotated secrets apply without a
    /// reclone.
    ///
    /// # Errors
    ///
    /// - `GitError::RepositoryNotFound` if there is no working copy
    /// - `GitError::PullFailed` if git fails, with git's output
    pub fn pull(&self, url: Option<&str>) -> Result<PullOutcome, GitError> {
        if !self.path.exists() {
            return Err(GitError::not_found(&self.path));
        }

        let before = self.head()?;
        let credentials = self.resolve_credentials()?;
        let auth_url = url.unwrap_or("origin");

        if let Some(url) = url
            && !is_ssh_url(url)
        {
            let remote = authenticated_url(url, &credentials);
            let output = self
                .git_command(url, &credentials)
                .current_dir(&self.path)
                .args(["remote", "set-url", "origin", remote.as_str()])
                .output()
                .map_err(|e| GitError::pull_failed(format!("Unexpected pull error: {}", e)))?;

            if !output.status.success() {
                return Err(GitError::pull_failed(
                    credentials.redact(&format_git_error(&output)),
                ));
            }
        }

        debug!("Pulling {:?}", self.path);

        let output = self
            .git_command(auth_url, &credentials)
            .current_dir(&self.path)
            .args(["pull", "--ff-only", "origin", self.branch.as_str()])
            .output()
            .map_err(|e| GitError::pull_failed(format!("Unexpected pull error: {}", e)))?;

        if !output.status.success() {
            return Err(GitError::pull_failed(
                credentials.redact(&format_git_error(&output)),
            ));
        }

        let head = self.head()?;
        let updated = head != before;
        if updated {
            info!("Pulled {:?}: {} -> {}", self.path, short(&before), short(&head));
        }

        Ok(PullOutcome { head, updated })
    }

    /// Removes the working copy.
    ///
    /// # Errors
    ///
    /// - `GitError::RepositoryNotFound` if there is no working copy
    /// - `GitError::Storage` if the directory cannot be removed
    pub fn delete(&self) -> Result<(), GitError> {
        if !self.path.exists() {
            return Err(GitError::not_found(&self.path));
        }

        // Release the handle before the files go away
        self.repository.lock().take();

        std::fs::remove_dir_all(&self.path).map_err(|e| GitError::storage(&self.path, e))?;
        info!("Deleted working copy at {:?}", self.path);
        Ok(())
    }

    /// Returns true if the local `HEAD` matches the remote branch tip.
    ///
    /// Only queries the remote; the working copy is not modified.
    pub fn relevance(&self, url: Option<&str>) -> Result<bool, GitError> {
        let local = self.head()?;
        let credentials = self.resolve_credentials()?;

        let remote = match url {
            Some(url) => authenticated_url(url, &credentials),
            None => "origin".to_string(),
        };
        let refname = format!("refs/heads/{}", self.branch);

        let output = self
            .git_command(url.unwrap_or("origin"), &credentials)
            .current_dir(&self.path)
            .args(["ls-remote", remote.as_str(), refname.as_str()])
            .output()
            .map_err(|e| GitError::Command(e.to_string()))?;

        if !output.status.success() {
            return Err(GitError::Command(
                credentials.redact(&format_git_error(&output)),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let remote_tip = parse_ls_remote(&stdout, &refname).ok_or_else(|| {
            GitError::Command(format!("branch '{}' not found on remote", self.branch))
        })?;

        Ok(remote_tip == local)
    }

    /// Returns the local `HEAD` commit id.
    pub fn head(&self) -> Result<String, GitError> {
        let repo = self.load()?;
        let id = repo
            .head_id()
            .map_err(|e| GitError::Open(format!("Failed to read HEAD: {}", e)))?;
        Ok(id.detach().to_string())
    }

    /// Opens the repository once and hands out thread-local handles.
    fn load(&self) -> Result<gix::Repository, GitError> {
        let mut cached = self.repository.lock();

        if let Some(repo) = cached.as_ref() {
            return Ok(repo.to_thread_local());
        }

        if !self.path.exists() {
            return Err(GitError::not_found(&self.path));
        }

        let repo = gix::open(&self.path).map_err(|e| GitError::Open(e.to_string()))?;
        *cached = Some(repo.clone().into_sync());
        Ok(repo)
    }

    fn resolve_credentials(&self) -> Result<Credentials, GitError> {
        Ok(self.credentials.resolve(self.credential_ref.as_deref())?)
    }

    /// A git command with non-interactive auth settings for `url`.
    fn git_command(&self, url: &str, credentials: &Credentials) -> Command {
        let mut cmd = Command::new(self.config.git_program());
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        if self.config.skip_ssl_verification() {
            cmd.args(["-c", "http.sslVerify=false"]);
        }
        if let Some(ssh) = self.config.ssh_command() {
            cmd.env("GIT_SSH_COMMAND", ssh);
        }
        cmd.args(auth_config_args(url, credentials));
        cmd
    }
}

impl std::fmt::Debug for GitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitClient")
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("credential_ref", &self.credential_ref)
            .finish()
    }
}

/// Formats a git failure with both stderr and stdout.
fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Finds the object id advertised for `refname` in `git ls-remote` output.
fn parse_ls_remote(stdout: &str, refname: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let sha = parts.next()?;
        (parts.next()? == refname).then(|| sha.to_string())
    })
}

fn short(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reposync_core::NoCredentials;
    use tempfile::TempDir;

    fn client(root: &Path, folder: &str) -> GitClient {
        let config = GitClientConfig::builder()
            .storage_root(root)
            .build()
            .unwrap();
        GitClient::new(Arc::new(config), folder, Arc::new(NoCredentials))
    }

    #[test]
    fn test_path_is_root_plus_folder() {
        let client = client(Path::new("/srv/repos"), "svc-a");
        assert_eq!(client.path(), Path::new("/srv/repos/svc-a"));
        assert!(!client.exists());
    }

    #[test]
    fn test_pull_missing_repository() {
        let dir = TempDir::new().unwrap();
        let client = client(dir.path(), "missing");

        let err = client.pull(None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_head_missing_repository() {
        let dir = TempDir::new().unwrap();
        let client = client(dir.path(), "missing");

        assert!(client.head().unwrap_err().is_not_found());
        assert!(client.relevance(None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_parse_ls_remote() {
        let out = "1111111111111111111111111111111111111111\trefs/heads/main\n\
                   2222222222222222222222222222222222222222\trefs/heads/main-old\n";

        assert_eq!(
            parse_ls_remote(out, "refs/heads/main").as_deref(),
            Some("1111111111111111111111111111111111111111")
        );
        assert_eq!(
            parse_ls_remote(out, "refs/heads/main-old").as_deref(),
            Some("2222222222222222222222222222222222222222")
        );
        assert!(parse_ls_remote(out, "refs/heads/dev").is_none());
        assert!(parse_ls_remote("", "refs/heads/main").is_none());
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
    }
}
