mod common;

use chrono::{Duration, Utc};
use reposync_core::{FileStore, InMemoryStore, RepoStatus, RepositoryStore, SyncStatus};
use tempfile::TempDir;

use common::{disabled_record, record};

#[tokio::test]
async fn test_list_eligible_filters_and_orders() {
    let now = Utc::now();

    let mut old = record("old");
    old.last_sync_at = Some(now - Duration::hours(2));
    let mut recent = record("recent");
    recent.last_sync_at = Some(now - Duration::minutes(1));
    let never = record("never");
    let mut errored = record("errored");
    errored.status = RepoStatus::Error;

    let store = InMemoryStore::with_records([
        recent.clone(),
        old.clone(),
        never.clone(),
        errored,
        disabled_record("off"),
    ]);

    let names: Vec<String> = store
        .list_eligible()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();

    assert_eq!(names, vec!["never", "old", "recent"]);
}

#[tokio::test]
async fn test_file_store_persists_updates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("repositories.json");

    let mut rec = record("svc-a");
    {
        let store = FileStore::open(&path).unwrap();
        assert!(store.is_empty());
        store.insert(rec.clone()).unwrap();

        rec.mark_in_progress(Utc::now());
        store.update(&rec).await.unwrap();
    }

    // Reabrir y verificar que el estado sobrevivió
    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);

    let loaded = reopened.get_by_id(&rec.id).await.unwrap().unwrap();
    assert_eq!(loaded.last_sync_status, SyncStatus::InProgress);
    assert_eq!(loaded.name, "svc-a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_concurrent_updates_keep_latest_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repositories.json");

    let records: Vec<_> = (0..8).map(|i| record(&format!("svc-{}", i))).collect();
    let store = FileStore::open(&path).unwrap();
    for rec in &records {
        store.insert(rec.clone()).unwrap();
    }

    let mut tasks = Vec::new();
    for mut rec in records.clone() {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            rec.mark_success(Some("abc123".into()), Utc::now());
            store.update(&rec).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let reopened = FileStore::open(&path).unwrap();
    for rec in &records {
        let loaded = reopened.get_by_id(&rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_sync_status, SyncStatus::Success);
        assert_eq!(loaded.sync_count, 1);
    }
    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn test_file_store_remove() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repositories.json");

    let rec = record("svc-a");
    let store = FileStore::open(&path).unwrap();
    store.insert(rec.clone()).unwrap();

    let removed = store.remove(&rec.id).unwrap();
    assert_eq!(removed.map(|r| r.id), Some(rec.id));
    assert!(store.get_by_id(&rec.id).await.unwrap().is_none());
    assert!(FileStore::open(&path).unwrap().is_empty());
}

#[test]
fn test_file_store_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repositories.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = FileStore::open(&path).unwrap_err();
    assert!(err.to_string().contains("repositories.json"));
}

#[test]
fn test_file_store_accepts_minimal_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repositories.json");
    std::fs::write(
        &path,
        r#"[{"name": "svc-a", "cloneUrl": "git@bitbucket.org:team/svc-a.git", "syncInterval": 500}]"#,
    )
    .unwrap();

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.len(), 1);
}
