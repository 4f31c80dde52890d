//! Repository records and their status enums.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default branch used when a record does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Default raw sync interval (interpreted as milliseconds, i.e. 3 seconds).
pub const DEFAULT_SYNC_INTERVAL: u64 = 3000;

/// Default number of pull attempts per sync.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between pull attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Repository identifier.
///
/// # Example
///
/// ```
/// use reposync_core::RepositoryId;
///
/// let id = RepositoryId::new();
/// let parsed: RepositoryId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(Uuid);

impl RepositoryId {
    /// Creates a new time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RepositoryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for RepositoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Administrative status of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    /// The repository is tracked and may be polled.
    #[default]
    Active,
    /// The repository is tracked but switched off.
    Inactive,
    /// The repository is in an error state.
    Error,
    /// The repository is being synchronized.
    Syncing,
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
            Self::Syncing => "syncing",
        };
        f.write_str(s)
    }
}

/// Outcome of the most recent synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never synchronized.
    #[default]
    Pending,
    /// A synchronization is running.
    InProgress,
    /// The last synchronization pulled successfully.
    Success,
    /// The last synchronization exhausted its retries.
    Failed,
    /// The last synchronization found nothing to pull.
    Skipped,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Reason a repository must not be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// `status` is not `active`.
    NotActiveStatus(RepoStatus),
    /// The `active` flag is off.
    Deactivated,
    /// Polling is disabled.
    PollingDisabled,
    /// Auto-sync is disabled.
    AutoSyncDisabled,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotActiveStatus(status) => write!(f, "repository status is '{}'", status),
            Self::Deactivated => f.write_str("repository is not active"),
            Self::PollingDisabled => f.write_str("polling is disabled"),
            Self::AutoSyncDisabled => f.write_str("auto-sync is disabled"),
        }
    }
}

/// A tracked remote repository and its synchronization bookkeeping.
///
/// Records are owned by a [`RepositoryStore`](crate::RepositoryStore); the
/// synchronization core only reads them and writes back sync results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    #[serde(default)]
    pub id: RepositoryId,
    /// Display name; also the folder name of the working copy.
    pub name: String,
    #[serde(default)]
    pub status: RepoStatus,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_url: String,
    pub clone_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub auto_sync: bool,
    #[serde(default = "default_true")]
    pub enable_polling: bool,
    #[serde(default)]
    pub enable_webhooks: bool,

    /// Raw interval; `reposync_git::sync::normalize_interval` applies the unit rule.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: Option<u64>,
    #[serde(default = "default_max_retries")]
    pub max_retries: Option<u32>,
    /// Delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Option<u64>,

    #[serde(default)]
    pub last_sync_status: SyncStatus,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_successful_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_commit_hash: Option<String>,
    #[serde(default)]
    pub sync_count: u64,
    #[serde(default)]
    pub failed_sync_count: u64,

    /// Key handed to the credential provider. `None` means no credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> Option<u64> {
    Some(DEFAULT_SYNC_INTERVAL)
}

fn default_max_retries() -> Option<u32> {
    Some(DEFAULT_MAX_RETRIES)
}

fn default_retry_delay() -> Option<u64> {
    Some(DEFAULT_RETRY_DELAY_MS)
}

impl RepositoryRecord {
    /// Creates an active, pollable record with default sync settings.
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RepositoryId::new(),
            name: name.into(),
            status: RepoStatus::Active,
            provider: String::new(),
            api_url: String::new(),
            clone_url: clone_url.into().trim().to_string(),
            description: None,
            branch: default_branch(),
            active: true,
            auto_sync: true,
            enable_polling: true,
            enable_webhooks: false,
            sync_interval: default_sync_interval(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            last_sync_status: SyncStatus::Pending,
            last_sync_at: None,
            last_successful_sync_at: None,
            last_commit_hash: None,
            sync_count: 0,
            failed_sync_count: 0,
            credential_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the raw sync interval.
    pub fn with_sync_interval(mut self, raw: u64) -> Self {
        self.sync_interval = Some(raw);
        self
    }

    /// Sets the retry settings.
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = Some(max_retries);
        self.retry_delay = Some(retry_delay_ms);
        self
    }

    /// Sets the credential reference.
    pub fn with_credential_ref(mut self, reference: impl Into<String>) -> Self {
        self.credential_ref = Some(reference.into());
        self
    }

    /// Returns the first reason this record must not be polled, if any.
    pub fn ineligibility(&self) -> Option<Ineligibility> {
        if self.status != RepoStatus::Active {
            return Some(Ineligibility::NotActiveStatus(self.status));
        }
        if !self.active {
            return Some(Ineligibility::Deactivated);
        }
        if !self.enable_polling {
            return Some(Ineligibility::PollingDisabled);
        }
        if !self.auto_sync {
            return Some(Ineligibility::AutoSyncDisabled);
        }
        None
    }

    /// Returns true if every polling flag allows this record to be polled.
    pub fn is_eligible(&self) -> bool {
        self.ineligibility().is_none()
    }

    /// Number of pull attempts per sync, never less than one.
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES).max(1)
    }

    /// Delay between pull attempts in milliseconds.
    pub fn effective_retry_delay_ms(&self) -> u64 {
        self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY_MS)
    }

    /// Returns true if the clone URL uses SSH transport.
    pub fn uses_ssh(&self) -> bool {
        is_ssh_url(&self.clone_url)
    }

    /// Marks the start of a synchronization.
    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) {
        self.last_sync_status = SyncStatus::InProgress;
        self.last_sync_at = Some(now);
        self.updated_at = now;
    }

    /// Records a successful pull.
    pub fn mark_success(&mut self, commit: Option<String>, now: DateTime<Utc>) {
        self.last_sync_status = SyncStatus::Success;
        self.last_successful_sync_at = Some(now);
        if commit.is_some() {
            self.last_commit_hash = commit;
        }
        self.sync_count += 1;
        self.updated_at = now;
    }

    /// Records a synchronization whose retries were exhausted.
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.last_sync_status = SyncStatus::Failed;
        self.failed_sync_count += 1;
        self.updated_at = now;
    }

    /// Records a synchronization that found the working copy up to date.
    pub fn mark_skipped(&mut self, now: DateTime<Utc>) {
        self.last_sync_status = SyncStatus::Skipped;
        self.last_sync_at = Some(now);
        self.updated_at = now;
    }
}

/// Returns true for `ssh://` and scp-like `git@host:path` URLs.
pub fn is_ssh_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("ssh://") || url.starts_with("git@")
}
