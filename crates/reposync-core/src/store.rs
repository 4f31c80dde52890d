//! Repository store abstraction.
//!
//! The store owns repository records durably. The synchronization core reads
//! records on every poll tick and writes back sync bookkeeping, so the trait
//! is deliberately small.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::record::{RepositoryId, RepositoryRecord};

/// Durable storage of repository records.
///
/// # Implementors
///
/// - `InMemoryStore` - records held in memory, for tests and embedding
/// - `FileStore` - records persisted to a JSON file
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Returns the record with the given id, if any.
    async fn get_by_id(&self, id: &RepositoryId) -> Result<Option<RepositoryRecord>>;

    /// Returns the record with the given name, if any.
    async fn get_by_name(&self, name: &str) -> Result<Option<RepositoryRecord>>;

    /// Returns every record that may be polled, least recently synced first.
    async fn list_eligible(&self) -> Result<Vec<RepositoryRecord>>;

    /// Persists an existing record.
    ///
    /// # Errors
    ///
    /// - `CoreError::Store` if no record with that id exists
    async fn update(&self, record: &RepositoryRecord) -> Result<()>;
}

/// In-memory repository store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<RepositoryId, RepositoryRecord>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records.
    pub fn with_records(records: impl IntoIterator<Item = RepositoryRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: RepositoryRecord) {
        self.records.write().insert(record.id, record);
    }

    /// Removes a record, returning it.
    pub fn remove(&self, id: &RepositoryId) -> Option<RepositoryRecord> {
        self.records.write().remove(id)
    }

    /// Returns a copy of a record without going through the async trait.
    pub fn get(&self, id: &RepositoryId) -> Option<RepositoryRecord> {
        self.records.read().get(id).cloned()
    }

    /// Applies `f` to a stored record in place.
    pub fn modify(&self, id: &RepositoryId, f: impl FnOnce(&mut RepositoryRecord)) -> bool {
        match self.records.write().get_mut(id) {
            Some(record) => {
                f(record);
                true
            },
            None => false,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// All records, ordered by name.
    pub fn snapshot(&self) -> Vec<RepositoryRecord> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    fn replace(&self, record: &RepositoryRecord) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            },
            None => Err(CoreError::store(format!(
                "repository {} ({}) does not exist",
                record.id, record.name
            ))),
        }
    }
}

#[async_trait]
impl RepositoryStore for InMemoryStore {
    async fn get_by_id(&self, id: &RepositoryId) -> Result<Option<RepositoryRecord>> {
        Ok(self.get(id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<RepositoryRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list_eligible(&self) -> Result<Vec<RepositoryRecord>> {
        let mut eligible: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.is_eligible())
            .cloned()
            .collect();

        // Never-synced first, then oldest sync first
        eligible.sort_by(|a, b| a.last_sync_at.cmp(&b.last_sync_at));
        Ok(eligible)
    }

    async fn update(&self, record: &RepositoryRecord) -> Result<()> {
        self.replace(record)
    }
}

/// Repository store persisted as a JSON array in a single file.
///
/// The file is read once on open and rewritten (via a temporary file and a
/// rename) after every update. Writes from `update` run on the blocking pool.
#[derive(Debug, Clone)]
pub struct FileStore {
    shared: Arc<FileShared>,
}

#[derive(Debug)]
struct FileShared {
    path: PathBuf,
    records: InMemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records: Vec<RepositoryRecord> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| CoreError::serialization(&path, e))?
            }
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), records = records.len(), "Opened file store");

        Ok(Self {
            shared: Arc::new(FileShared {
                path,
                records: InMemoryStore::with_records(records),
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Inserts or replaces a record and persists the file.
    pub fn insert(&self, record: RepositoryRecord) -> Result<()> {
        self.shared.records.insert(record);
        self.shared.flush()
    }

    /// Removes a record and persists the file.
    pub fn remove(&self, id: &RepositoryId) -> Result<Option<RepositoryRecord>> {
        let removed = self.shared.records.remove(id);
        self.shared.flush()?;
        Ok(removed)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.shared.records.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.shared.records.is_empty()
    }
}

impl FileShared {
    // The snapshot is taken under the write lock, so the last writer always
    // persists the newest state.
    fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let snapshot = self.records.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CoreError::serialization(&self.path, e))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl RepositoryStore for FileStore {
    async fn get_by_id(&self, id: &RepositoryId) -> Result<Option<RepositoryRecord>> {
        self.shared.records.get_by_id(id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<RepositoryRecord>> {
        self.shared.records.get_by_name(name).await
    }

    async fn list_eligible(&self) -> Result<Vec<RepositoryRecord>> {
        self.shared.records.list_eligible().await
    }

    async fn update(&self, record: &RepositoryRecord) -> Result<()> {
        self.shared.records.replace(record)?;

        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.flush())
            .await
            .map_err(|e| CoreError::store_with_cause("file store writer failed", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_unknown_record_fails() {
        let store = InMemoryStore::new();
        let record = RepositoryRecord::new("ghost", "https://example.com/ghost.git");

        let err = store.update(&record).await.unwrap_err();
        assert!(err.is_store_error());
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let record = RepositoryRecord::new("svc-a", "https://example.com/a.git");
        let store = InMemoryStore::with_records([record.clone()]);

        let found = store.get_by_name("svc-a").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));
        assert!(store.get_by_name("svc-b").await.unwrap().is_none());
    }

    #[test]
    fn test_modify() {
        let record = RepositoryRecord::new("svc-a", "https://example.com/a.git");
        let id = record.id;
        let store = InMemoryStore::with_records([record]);

        assert!(store.modify(&id, |r| r.active = false));
        assert!(!store.get(&id).unwrap().active);
        assert!(!store.modify(&RepositoryId::new(), |r| r.active = false));
    }
}
