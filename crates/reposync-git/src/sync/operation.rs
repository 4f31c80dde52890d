//! One synchronization of one repository.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reposync_core::{RepositoryId, RepositoryRecord, RepositoryStore};
use tracing::{debug, info, warn};

use super::scheduler::Shared;
use super::state::RepoLock;
use crate::error::{GitError, SchedulerError};
use crate::repository::PullOutcome;
use crate::retry::{RetryOutcome, RetryPolicy};

/// What a synchronization did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// The working copy was pulled (or cloned on first sync).
    Synced {
        head: String,
        attempts: u32,
        updated: bool,
    },
    /// The working copy already matched the remote.
    Skipped { head: String },
    /// Every attempt failed.
    Failed { attempts: u32, error: String },
}

impl SyncReport {
    /// Returns true unless the retries were exhausted.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Synchronizes `record` while holding its repository lock.
///
/// Only store failures and worker panics are errors. A pull that keeps
/// failing is recorded as `failed` on the record and reported as
/// [`SyncReport::Failed`].
pub(crate) async fn run(
    shared: &Shared,
    lock: &RepoLock,
    record: RepositoryRecord,
) -> Result<SyncReport, SchedulerError> {
    let mut guard = lock.lock().await;
    let copy = guard.working_copy(&record, shared.factory.as_ref());

    let _permit = Arc::clone(&shared.permits)
        .acquire_owned()
        .await
        .map_err(|e| worker_error(record.id, e))?;

    let id = record.id;
    let url = record.clone_url.clone();

    if shared.config.skip_unchanged {
        let check = Arc::clone(&copy);
        let check_url = url.clone();
        let unchanged = tokio::task::spawn_blocking(move || -> Result<Option<String>, GitError> {
            if !check.exists() || !check.relevance(Some(&check_url))? {
                return Ok(None);
            }
            check.head().map(Some)
        })
        .await
        .map_err(|e| worker_error(id, e))?;

        match unchanged {
            Ok(Some(head)) => {
                debug!(repository = %record.name, "Working copy up to date, skipping pull");
                persist(shared.store.as_ref(), &id, |r| r.mark_skipped(Utc::now())).await?;
                return Ok(SyncReport::Skipped { head });
            },
            Ok(None) => {},
            Err(e) => {
                warn!(repository = %record.name, "Staleness check failed, pulling anyway: {}", e);
            },
        }
    }

    persist(shared.store.as_ref(), &id, |r| r.mark_in_progress(Utc::now())).await?;

    let policy = RetryPolicy::new(
        record.effective_max_retries(),
        Duration::from_millis(record.effective_retry_delay_ms()),
    );
    let branch = record.branch.clone();
    let name = record.name.clone();

    info!(
        repository = %record.name,
        max_attempts = policy.max_attempts(),
        "Synchronizing"
    );

    let worker = tokio::task::spawn_blocking(move || {
        policy.run(|attempt| -> Result<PullOutcome, GitError> {
            debug!(repository = %name, attempt, "Sync attempt");
            if copy.exists() {
                copy.pull(Some(&url))
            } else {
                copy.clone_repo(&url, &branch)?;
                Ok(PullOutcome {
                    head: copy.head()?,
                    updated: true,
                })
            }
        })
    })
    .await;

    let outcome = match worker {
        Ok(outcome) => outcome,
        Err(e) => {
            // Leave no record stuck in progress
            persist(shared.store.as_ref(), &id, |r| r.mark_failed(Utc::now())).await?;
            return Err(worker_error(id, e));
        },
    };

    let report = match outcome {
        RetryOutcome::Succeeded { value, attempts } => {
            let head = value.head.clone();
            persist(shared.store.as_ref(), &id, move |r| {
                r.mark_success(Some(head), Utc::now())
            })
            .await?;
            info!(
                repository = %record.name,
                attempts,
                head = %value.head,
                updated = value.updated,
                "Sync succeeded"
            );
            SyncReport::Synced {
                head: value.head,
                attempts,
                updated: value.updated,
            }
        },
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            persist(shared.store.as_ref(), &id, |r| r.mark_failed(Utc::now())).await?;
            warn!(
                repository = %record.name,
                attempts,
                "Sync failed after all attempts: {}",
                last_error
            );
            SyncReport::Failed {
                attempts,
                error: last_error.to_string(),
            }
        },
    };

    drop(guard);
    Ok(report)
}

/// Reloads the record, applies `f` and writes it back.
///
/// Returns false if the record no longer exists.
async fn persist(
    store: &dyn RepositoryStore,
    id: &RepositoryId,
    f: impl FnOnce(&mut RepositoryRecord),
) -> Result<bool, SchedulerError> {
    let Some(mut record) = store.get_by_id(id).await? else {
        debug!(repository_id = %id, "Record vanished during sync");
        return Ok(false);
    };
    f(&mut record);
    store.update(&record).await?;
    Ok(true)
}

fn worker_error(id: RepositoryId, e: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::Worker {
        id,
        reason: e.to_string(),
    }
}
