//! # RepoSync Git
//!
//! Git working copies and the scheduler that keeps them synchronized.
//!
//! This crate clones and pulls local mirrors of remote repositories and runs
//! one poll loop per tracked repository, on the repository's own interval.
//!
//! ## Features
//!
//! - Git operations via system `git` CLI for maximum compatibility
//! - Shallow, single-branch clones with credentials injected per remote
//! - Bounded retries with a fixed or exponential delay
//! - Per-repository locking so a repository never pulls twice at once
//! - Cooperative start, stop and restart of poll loops
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reposync_git::{GitClientConfig, GitClientFactory, SchedulerConfig, SyncScheduler};
//!
//! let config = GitClientConfig::builder()
//!     .storage_root("/var/lib/reposync")
//!     .build()?;
//! let factory = GitClientFactory::new(config, credentials);
//!
//! let scheduler = SyncScheduler::new(store, Arc::new(factory), SchedulerConfig::default());
//! scheduler.start_all().await?;
//! ```

pub mod error;
pub mod repository;
pub mod retry;
pub mod sync;

// Re-exports
pub use error::{GitError, SchedulerError};
pub use repository::{
    GitClient, GitClientConfig, GitClientFactory, PullOutcome, WorkingCopy, WorkingCopyFactory,
};
pub use retry::{Backoff, RetryOutcome, RetryPolicy};
pub use sync::{LoopExit, SchedulerConfig, SyncReport, SyncScheduler, normalize_interval};

// Re-export reposync_core for consumers
pub use reposync_core;
