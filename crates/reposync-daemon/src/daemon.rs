//! Daemon wiring: store, credentials, git client and scheduler.

use std::future::Future;
use std::sync::Arc;

use reposync_core::FileStore;
use reposync_git::{GitClientFactory, SyncScheduler};
use tracing::info;

use crate::error::DaemonError;
use crate::settings::Settings;

/// A configured daemon, ready to run.
#[derive(Debug)]
pub struct Daemon {
    scheduler: SyncScheduler,
    store: Arc<FileStore>,
}

impl Daemon {
    /// Opens the store and builds the scheduler from `settings`.
    pub fn new(settings: &Settings) -> Result<Self, DaemonError> {
        settings.validate()?;
        let store = Arc::new(FileStore::open(&settings.store_path)?);
        let factory = GitClientFactory::new(
            settings.git_config()?,
            Arc::new(settings.credentials.clone()),
        );

        info!(
            store = %settings.store_path.display(),
            storage_root = %settings.storage_root.display(),
            repositories = store.len(),
            "Daemon configured"
        );

        let scheduler = SyncScheduler::new(
            store.clone(),
            Arc::new(factory),
            settings.scheduler_config(),
        );

        Ok(Self { scheduler, store })
    }

    /// Returns the scheduler.
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Returns the repository store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Starts every eligible poll loop, waits for `shutdown`, then stops them.
    ///
    /// Returns how many loops were started.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<usize, DaemonError> {
        let started = self.scheduler.start_all().await?;
        info!("Started {} poll loops", started);

        shutdown.await;

        info!("Shutdown requested, draining poll loops");
        self.scheduler.shutdown().await;
        info!("All poll loops stopped");
        Ok(started)
    }
}
