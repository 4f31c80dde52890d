//! Git working-copy management.
//!
//! This module provides functionality for cloning, pulling and deleting local
//! mirrors of remote repositories.

mod auth;
mod config;
mod git_ops;
mod working_copy;

pub use auth::{auth_config_args, authenticated_url, display_url};
pub use config::{GitClientConfig, GitClientConfigBuilder};
pub use git_ops::{GitClient, PullOutcome};
pub use working_copy::{GitClientFactory, WorkingCopy, WorkingCopyFactory};
