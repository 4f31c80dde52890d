//! Working-copy client configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration shared by every working copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitClientConfig {
    /// Directory under which each repository is materialized as `root/<name>`.
    storage_root: PathBuf,

    /// History depth of clones.
    #[serde(default = "default_depth")]
    depth: u32,

    /// The git executable.
    #[serde(default = "default_git_program")]
    git_program: String,

    /// Value for `GIT_SSH_COMMAND` on SSH remotes (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ssh_command: Option<String>,

    /// Whether to skip SSL verification (not recommended).
    #[serde(default)]
    skip_ssl_verification: bool,
}

fn default_depth() -> u32 {
    1
}

fn default_git_program() -> String {
    "git".to_string()
}

impl GitClientConfig {
    /// Creates a new builder for GitClientConfig.
    pub fn builder() -> GitClientConfigBuilder {
        GitClientConfigBuilder::default()
    }

    /// Returns the storage root.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Returns the path of the working copy for `folder`.
    pub fn working_copy_path(&self, folder: &str) -> PathBuf {
        self.storage_root.join(folder)
    }

    /// Returns the clone depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the git executable.
    pub fn git_program(&self) -> &str {
        &self.git_program
    }

    /// Returns the SSH command override.
    pub fn ssh_command(&self) -> Option<&str> {
        self.ssh_command.as_deref()
    }

    /// Returns whether to skip SSL verification.
    pub fn skip_ssl_verification(&self) -> bool {
        self.skip_ssl_verification
    }
}

/// Builder for GitClientConfig.
#[derive(Debug, Default)]
pub struct GitClientConfigBuilder {
    storage_root: Option<PathBuf>,
    depth: Option<u32>,
    git_program: Option<String>,
    ssh_command: Option<String>,
    skip_ssl_verification: bool,
}

impl GitClientConfigBuilder {
    /// Sets the storage root.
    pub fn storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(path.into());
        self
    }

    /// Sets the clone depth.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Sets the git executable.
    pub fn git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = Some(program.into());
        self
    }

    /// Sets the SSH command used for SSH remotes.
    pub fn ssh_command(mut self, command: impl Into<String>) -> Self {
        self.ssh_command = Some(command.into());
        self
    }

    /// Sets whether to skip SSL verification.
    pub fn skip_ssl_verification(mut self, skip: bool) -> Self {
        self.skip_ssl_verification = skip;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage root is missing or the depth is zero.
    pub fn build(self) -> Result<GitClientConfig, &'static str> {
        let storage_root = self.storage_root.ok_or("storage_root is required")?;
        let depth = self.depth.unwrap_or_else(default_depth);
        if depth == 0 {
            return Err("depth must be at least 1");
        }

        Ok(GitClientConfig {
            storage_root,
            depth,
            git_program: self.git_program.unwrap_or_else(default_git_program),
            ssh_command: self.ssh_command,
            skip_ssl_verification: self.skip_ssl_verification,
        })
    }
}
