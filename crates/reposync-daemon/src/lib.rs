//! RepoSync Daemon
//!
//! Wires the repository store, credentials and git client into a
//! [`SyncScheduler`](reposync_git::SyncScheduler) and runs it until the
//! process is asked to stop.

pub mod daemon;
pub mod error;
pub mod settings;
pub mod signal;
pub mod telemetry;

pub use daemon::Daemon;
pub use error::DaemonError;
pub use settings::Settings;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
