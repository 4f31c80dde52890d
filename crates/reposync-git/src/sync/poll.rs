//! Per-repository poll loop.

use std::fmt;
use std::sync::Weak;

use reposync_core::{Ineligibility, RepositoryId};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::interval::normalize_interval;
use super::operation::{self, SyncReport};
use super::scheduler::Shared;
use super::state::RepoLock;

/// Why a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The record disappeared from the store.
    RecordMissing,
    /// The record is no longer eligible for polling.
    Ineligible(Ineligibility),
    /// The scheduler stopped the loop.
    Cancelled,
    /// The store or a sync worker failed.
    Failed(String),
}

impl LoopExit {
    /// Returns true for exits that are not failures.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordMissing => f.write_str("record missing"),
            Self::Ineligible(reason) => write!(f, "ineligible: {}", reason),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Runs the loop for `id` until it is cancelled or has nothing left to do.
///
/// The scheduler is held weakly so a dropped scheduler ends its loops.
/// Exits other than `Cancelled` remove the loop's own registry entry.
pub(crate) async fn run(
    shared: Weak<Shared>,
    id: RepositoryId,
    generation: u64,
    lock: RepoLock,
    mut shutdown_rx: watch::Receiver<bool>,
) -> LoopExit {
    debug!(repository_id = %id, generation, "Poll loop started");

    let mut lock = Some(lock);
    let exit = loop {
        if *shutdown_rx.borrow() {
            break LoopExit::Cancelled;
        }
        let Some(ctx) = shared.upgrade() else {
            break LoopExit::Cancelled;
        };
        let Some(repo_lock) = lock.as_ref() else {
            break LoopExit::Cancelled;
        };

        let interval = match check_and_sync(&ctx, &id, repo_lock).await {
            Ok(interval) => interval,
            Err(exit) => {
                // The registry entry can only go once nothing holds its lock
                lock = None;
                ctx.deregister(&id, generation).await;
                break exit;
            },
        };
        drop(ctx);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break LoopExit::Cancelled;
                }
            }
        }
    };

    match &exit {
        LoopExit::Failed(reason) => {
            error!(repository_id = %id, "Poll loop failed: {}", reason)
        },
        other => info!(repository_id = %id, "Poll loop stopped: {}", other),
    }
    exit
}

/// One Checking + Syncing pass. Returns the interval to sleep.
async fn check_and_sync(
    shared: &Shared,
    id: &RepositoryId,
    lock: &RepoLock,
) -> Result<std::time::Duration, LoopExit> {
    let record = match shared.store.get_by_id(id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err(LoopExit::RecordMissing),
        Err(e) => return Err(LoopExit::Failed(e.to_string())),
    };

    if let Some(reason) = record.ineligibility() {
        info!(repository = %record.name, "Stopping poll loop: {}", reason);
        return Err(LoopExit::Ineligible(reason));
    }

    let interval = normalize_interval(record.sync_interval, shared.config.default_interval);
    let name = record.name.clone();

    match operation::run(shared, lock, record).await {
        Ok(SyncReport::Failed { attempts, .. }) => {
            warn!(repository = %name, attempts, "Sync exhausted, will retry next interval");
        },
        Ok(report) => debug!(repository = %name, ?report, "Sync finished"),
        Err(e) => return Err(LoopExit::Failed(e.to_string())),
    }

    debug!(repository = %name, ?interval, "Sleeping");
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reposync_core::RepoStatus;

    #[test]
    fn test_exit_display() {
        assert_eq!(LoopExit::RecordMissing.to_string(), "record missing");
        assert_eq!(
            LoopExit::Ineligible(Ineligibility::PollingDisabled).to_string(),
            "ineligible: polling is disabled"
        );
        assert_eq!(
            LoopExit::Ineligible(Ineligibility::NotActiveStatus(RepoStatus::Inactive)).to_string(),
            "ineligible: repository status is 'inactive'"
        );
    }

    #[test]
    fn test_exit_is_clean() {
        assert!(LoopExit::Cancelled.is_clean());
        assert!(LoopExit::RecordMissing.is_clean());
        assert!(!LoopExit::Failed("store down".into()).is_clean());
    }
}
