//! Per-repository sync scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reposync_core::{RepositoryId, RepositoryStore};
use tokio::sync::{Mutex, Semaphore, watch};
use tracing::{debug, info, warn};

use super::operation::{self, SyncReport};
use super::poll::{self, LoopExit};
use super::state::{RepoSlot, TaskHandle};
use crate::error::SchedulerError;
use crate::repository::WorkingCopyFactory;

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval used when a record has no usable `sync_interval`.
    pub default_interval: Duration,
    /// Maximum number of repositories synchronizing at once.
    pub max_concurrent_syncs: usize,
    /// Skip the pull when the working copy already matches the remote.
    pub skip_unchanged: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(30),
            max_concurrent_syncs: 4,
            skip_unchanged: true,
        }
    }
}

impl SchedulerConfig {
    /// Sets the fallback interval.
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    /// Sets the concurrency bound. Clamped to at least 1.
    pub fn with_max_concurrent_syncs(mut self, max: usize) -> Self {
        self.max_concurrent_syncs = max.max(1);
        self
    }

    /// Enables or disables the staleness check before pulling.
    pub fn with_skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }
}

/// State shared between the scheduler and its loops.
pub(crate) struct Shared {
    pub(crate) store: Arc<dyn RepositoryStore>,
    pub(crate) factory: Arc<dyn WorkingCopyFactory>,
    pub(crate) config: SchedulerConfig,
    pub(crate) permits: Arc<Semaphore>,
    slots: Mutex<HashMap<RepositoryId, RepoSlot>>,
    next_generation: AtomicU64,
}

impl Shared {
    /// Removes the loop's own registration after it ended by itself.
    pub(crate) async fn deregister(&self, id: &RepositoryId, generation: u64) {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(id) else {
            return;
        };
        if slot.task.as_ref().map(TaskHandle::generation) != Some(generation) {
            return;
        }

        // Dropping our own handle detaches the task
        let own = slot.task.take();
        if slot.is_idle() {
            slots.remove(id);
        }
        drop(slots);
        drop(own);
        debug!(repository_id = %id, generation, "Poll loop deregistered");
    }

    async fn release_if_idle(&self, id: &RepositoryId) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(id)
            && slot.is_idle()
        {
            slots.remove(id);
        }
    }
}

/// Runs one poll loop per repository.
///
/// The registry is guarded by a single coordination lock. Each repository
/// additionally has its own lock that serializes its synchronizations, so a
/// scheduled tick and a [`sync_now`](Self::sync_now) never pull at the same
/// time.
///
/// Stopping is cooperative: the loop observes the signal while sleeping, and
/// [`stop`](Self::stop) waits for an in-flight sync to finish before
/// returning.
///
/// # Example
///
/// ```ignore
/// let scheduler = SyncScheduler::new(store, factory, SchedulerConfig::default());
/// scheduler.start_all().await?;
/// // ...
/// scheduler.shutdown().await;
/// ```
#[derive(Clone)]
pub struct SyncScheduler {
    shared: Arc<Shared>,
}

impl SyncScheduler {
    /// Creates a scheduler. No loop runs until one is started.
    pub fn new(
        store: Arc<dyn RepositoryStore>,
        factory: Arc<dyn WorkingCopyFactory>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_syncs.max(1)));
        Self {
            shared: Arc::new(Shared {
                store,
                factory,
                config,
                permits,
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Starts a loop for every eligible record. Returns how many were started.
    pub async fn start_all(&self) -> Result<usize, SchedulerError> {
        let records = self.shared.store.list_eligible().await?;
        info!("Starting poll loops for {} eligible repositories", records.len());

        let mut started = 0;
        for record in records {
            if self.start(record.id).await {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Starts the loop for `id`.
    ///
    /// Returns false if a live loop already exists.
    pub async fn start(&self, id: RepositoryId) -> bool {
        let mut slots = self.shared.slots.lock().await;
        let slot = slots.entry(id).or_insert_with(RepoSlot::new);

        if slot.is_running() {
            debug!(repository_id = %id, "Poll loop already running");
            return false;
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(poll::run(
            Arc::downgrade(&self.shared),
            id,
            generation,
            Arc::clone(&slot.lock),
            shutdown_rx,
        ));

        // A finished handle left behind is replaced here
        slot.task = Some(TaskHandle::new(shutdown_tx, join, generation));
        info!(repository_id = %id, generation, "Poll loop started");
        true
    }

    /// Looks up a repository by name and starts its loop.
    pub async fn start_by_name(&self, name: &str) -> Result<bool, SchedulerError> {
        let record = self
            .shared
            .store
            .get_by_name(name)
            .await?
            .ok_or_else(|| SchedulerError::unknown(name))?;
        Ok(self.start(record.id).await)
    }

    /// Stops the loop for `id` and waits for it to finish.
    ///
    /// An in-flight sync completes before this returns. Returns false if no
    /// loop was registered.
    pub async fn stop(&self, id: RepositoryId) -> bool {
        let task = {
            let mut slots = self.shared.slots.lock().await;
            let task = slots.get_mut(&id).and_then(|slot| slot.task.take());
            if let Some(task) = &task {
                task.signal();
            }
            task
        };

        let Some(task) = task else {
            return false;
        };

        match task.finish().await {
            Ok(exit) => debug!(repository_id = %id, "Poll loop drained: {}", exit),
            Err(e) => warn!(repository_id = %id, "Poll loop ended abnormally: {}", e),
        }

        self.shared.release_if_idle(&id).await;
        info!(repository_id = %id, "Poll loop stopped");
        true
    }

    /// Stops then starts the loop for `id`.
    ///
    /// The old loop has fully exited before the new one is launched.
    pub async fn restart(&self, id: RepositoryId) -> bool {
        self.stop(id).await;
        self.start(id).await
    }

    /// Synchronizes `id` now, whether or not its loop is running.
    ///
    /// Waits for any sync already in progress for the same repository.
    pub async fn sync_now(&self, id: RepositoryId) -> Result<SyncReport, SchedulerError> {
        let lock = {
            let mut slots = self.shared.slots.lock().await;
            Arc::clone(&slots.entry(id).or_insert_with(RepoSlot::new).lock)
        };

        let result = match self.shared.store.get_by_id(&id).await {
            Ok(Some(record)) => operation::run(&self.shared, &lock, record).await,
            Ok(None) => Err(SchedulerError::unknown(id)),
            Err(e) => Err(e.into()),
        };

        drop(lock);
        self.shared.release_if_idle(&id).await;
        result
    }

    /// Returns true if a live loop exists for `id`.
    pub async fn is_running(&self, id: RepositoryId) -> bool {
        self.shared
            .slots
            .lock()
            .await
            .get(&id)
            .is_some_and(RepoSlot::is_running)
    }

    /// Returns the ids of all live loops.
    pub async fn running(&self) -> Vec<RepositoryId> {
        let slots = self.shared.slots.lock().await;
        let mut ids: Vec<_> = slots
            .iter()
            .filter(|(_, slot)| slot.is_running())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Stops every loop, waiting for in-flight syncs.
    pub async fn shutdown(&self) {
        let tasks: Vec<(RepositoryId, TaskHandle)> = {
            let mut slots = self.shared.slots.lock().await;
            slots
                .iter_mut()
                .filter_map(|(id, slot)| slot.task.take().map(|task| (*id, task)))
                .collect()
        };

        info!("Shutting down {} poll loops", tasks.len());
        for (_, task) in &tasks {
            task.signal();
        }

        for (id, task) in tasks {
            let exit: Result<LoopExit, _> = task.finish().await;
            if let Err(e) = exit {
                warn!(repository_id = %id, "Poll loop ended abnormally: {}", e);
            }
        }

        let mut slots = self.shared.slots.lock().await;
        slots.retain(|_, slot| !slot.is_idle());
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.shared.config)
            .finish()
    }
}
