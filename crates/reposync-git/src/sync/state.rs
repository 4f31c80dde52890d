//! Per-repository scheduler state.

use std::sync::Arc;

use reposync_core::RepositoryRecord;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinError, JoinHandle};

use super::poll::LoopExit;
use crate::repository::{WorkingCopy, WorkingCopyFactory};

/// Serializes synchronizations of one repository.
pub(crate) type RepoLock = Arc<Mutex<LockState>>;

/// Data guarded by a repository's lock.
///
/// The working copy is cached so its repository handle survives across syncs.
/// It is rebuilt when any field that shapes it changes.
#[derive(Default)]
pub(crate) struct LockState {
    cached: Option<(CopyKey, Arc<dyn WorkingCopy>)>,
}

#[derive(PartialEq, Eq)]
struct CopyKey {
    name: String,
    clone_url: String,
    branch: String,
    credential_ref: Option<String>,
}

impl CopyKey {
    fn of(record: &RepositoryRecord) -> Self {
        Self {
            name: record.name.clone(),
            clone_url: record.clone_url.clone(),
            branch: record.branch.clone(),
            credential_ref: record.credential_ref.clone(),
        }
    }
}

impl LockState {
    /// Returns the working copy for `record`, building it if needed.
    pub(crate) fn working_copy(
        &mut self,
        record: &RepositoryRecord,
        factory: &dyn WorkingCopyFactory,
    ) -> Arc<dyn WorkingCopy> {
        let key = CopyKey::of(record);
        if let Some((cached_key, copy)) = &self.cached
            && *cached_key == key
        {
            return Arc::clone(copy);
        }

        let copy = factory.working_copy(record);
        self.cached = Some((key, Arc::clone(&copy)));
        copy
    }
}

/// A running poll loop.
///
/// Dropping the handle signals the loop to stop.
pub(crate) struct TaskHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<LoopExit>,
    generation: u64,
}

impl TaskHandle {
    pub(crate) fn new(
        shutdown_tx: watch::Sender<bool>,
        join: JoinHandle<LoopExit>,
        generation: u64,
    ) -> Self {
        Self {
            shutdown_tx,
            join,
            generation,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true while the loop task has not finished.
    pub(crate) fn is_live(&self) -> bool {
        !self.join.is_finished()
    }

    /// Signals the loop to stop at its next checkpoint.
    pub(crate) fn signal(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signals the loop and waits until it has exited.
    pub(crate) async fn finish(mut self) -> Result<LoopExit, JoinError> {
        self.signal();
        (&mut self.join).await
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.signal();
    }
}

/// Registry entry for one repository.
pub(crate) struct RepoSlot {
    pub(crate) task: Option<TaskHandle>,
    pub(crate) lock: RepoLock,
}

impl RepoSlot {
    pub(crate) fn new() -> Self {
        Self {
            task: None,
            lock: Arc::new(Mutex::new(LockState::default())),
        }
    }

    /// Returns true if a loop task is registered and still running.
    pub(crate) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(TaskHandle::is_live)
    }

    /// Returns true if nothing references this slot anymore.
    pub(crate) fn is_idle(&self) -> bool {
        self.task.is_none() && Arc::strong_count(&self.lock) == 1
    }
}
