//! Layered daemon settings.
//!
//! Values come from built-in defaults, then an optional settings file, then
//! `REPOSYNC_*` environment variables. Nested keys use `__` in the
//! environment, e.g. `REPOSYNC_SCHEDULER__MAX_CONCURRENT_SYNCS=8`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use reposync_core::StaticCredentials;
use reposync_git::{GitClientConfig, SchedulerConfig};
use serde::Deserialize;

use crate::error::DaemonError;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "REPOSYNC_CONFIG";

/// Settings file used when `REPOSYNC_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "reposync.toml";

const ENV_PREFIX: &str = "REPOSYNC";

/// Daemon settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory holding one working copy per repository.
    pub storage_root: PathBuf,
    /// JSON file holding the repository records.
    pub store_path: PathBuf,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Git client settings.
    pub git: GitSettings,
    /// Scheduler settings.
    pub scheduler: SchedulerSettings,
    /// Credentials by reference.
    pub credentials: StaticCredentials,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/var/lib/reposync/repositories"),
            store_path: PathBuf::from("/var/lib/reposync/repositories.json"),
            log_level: "info".to_string(),
            git: GitSettings::default(),
            scheduler: SchedulerSettings::default(),
            credentials: StaticCredentials::default(),
        }
    }
}

/// Git client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub depth: u32,
    pub program: String,
    pub ssh_command: Option<String>,
    pub skip_ssl_verification: bool,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            depth: 1,
            program: "git".to_string(),
            ssh_command: None,
            skip_ssl_verification: false,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Interval for records without a usable `syncInterval`.
    pub default_interval_secs: u64,
    /// Maximum number of repositories synchronizing at once.
    pub max_concurrent_syncs: usize,
    /// Skip pulls when the working copy already matches the remote.
    pub skip_unchanged: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            default_interval_secs: defaults.default_interval.as_secs(),
            max_concurrent_syncs: defaults.max_concurrent_syncs,
            skip_unchanged: defaults.skip_unchanged,
        }
    }
}

impl Settings {
    /// Loads settings from the file named by `REPOSYNC_CONFIG` (or
    /// `reposync.toml`) and the process environment.
    pub fn load() -> Result<Self, DaemonError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::from_sources(Some(Path::new(&path)), environment())
    }

    /// Loads settings from an optional file and an environment source.
    ///
    /// A missing file is not an error.
    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, DaemonError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values the type system cannot.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(DaemonError::invalid("storage_root cannot be empty"));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(DaemonError::invalid("store_path cannot be empty"));
        }
        if self.scheduler.default_interval_secs == 0 {
            return Err(DaemonError::invalid(
                "scheduler.default_interval_secs must be at least 1",
            ));
        }
        if self.scheduler.max_concurrent_syncs == 0 {
            return Err(DaemonError::invalid(
                "scheduler.max_concurrent_syncs must be at least 1",
            ));
        }
        Ok(())
    }

    /// Builds the git client configuration.
    pub fn git_config(&self) -> Result<GitClientConfig, DaemonError> {
        let mut builder = GitClientConfig::builder()
            .storage_root(&self.storage_root)
            .depth(self.git.depth)
            .git_program(&self.git.program)
            .skip_ssl_verification(self.git.skip_ssl_verification);
        if let Some(ssh) = &self.git.ssh_command {
            builder = builder.ssh_command(ssh);
        }
        builder.build().map_err(DaemonError::invalid)
    }

    /// Builds the scheduler configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_default_interval(Duration::from_secs(self.scheduler.default_interval_secs))
            .with_max_concurrent_syncs(self.scheduler.max_concurrent_syncs)
            .with_skip_unchanged(self.scheduler.skip_unchanged)
    }
}

/// The `REPOSYNC_*` environment source.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
