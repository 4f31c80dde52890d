#![allow(dead_code)]
use std::collections::HashMap;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reposync_core::{InMemoryStore, RepositoryRecord};
use reposync_git::{
    GitError, PullOutcome, SchedulerConfig, SyncScheduler, WorkingCopy, WorkingCopyFactory,
};

pub const FAKE_HEAD: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Working copy that records every call instead of touching git.
///
/// Re-entrant calls are counted in `overlaps` rather than panicking, because
/// they run on blocking workers where a panic would only surface indirectly.
#[derive(Default)]
pub struct FakeCopy {
    pub exists: AtomicBool,
    pub up_to_date: AtomicBool,
    pub panic_on_pull: AtomicBool,
    /// Remaining attempts that fail before attempts start succeeding.
    pub fail_next: AtomicU32,
    pub attempts: AtomicU32,
    pub completed: AtomicU32,
    pub clones: AtomicU32,
    pub in_pull: AtomicBool,
    pub overlaps: AtomicU32,
    pub attempt_times: Mutex<Vec<Instant>>,
    pull_delay: Duration,
}

impl FakeCopy {
    /// A working copy that already exists and pulls successfully.
    pub fn cloned() -> Self {
        let copy = Self::default();
        copy.exists.store(true, Ordering::SeqCst);
        copy
    }

    /// A working copy that has not been cloned yet.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    pub fn failing_first(self, n: u32) -> Self {
        self.fail_next.store(n, Ordering::SeqCst);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn times(&self) -> Vec<Instant> {
        self.attempt_times.lock().clone()
    }

    fn attempt(&self) -> Result<(), GitError> {
        if self.in_pull.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().push(Instant::now());

        if self.panic_on_pull.load(Ordering::SeqCst) {
            panic!("injected panic");
        }
        std::thread::sleep(self.pull_delay);

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.completed.fetch_add(1, Ordering::SeqCst);
        self.in_pull.store(false, Ordering::SeqCst);

        if failing {
            Err(GitError::pull_failed("injected failure"))
        } else {
            Ok(())
        }
    }
}

impl WorkingCopy for FakeCopy {
    fn exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }

    fn clone_repo(&self, _url: &str, _branch: &str) -> Result<(), GitError> {
        if self.exists() {
            return Err(GitError::already_exists("/fake"));
        }
        self.attempt()?;
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pull(&self, _url: Option<&str>) -> Result<PullOutcome, GitError> {
        if !self.exists() {
            return Err(GitError::not_found("/fake"));
        }
        self.attempt()?;
        Ok(PullOutcome {
            head: FAKE_HEAD.to_string(),
            updated: false,
        })
    }

    fn delete(&self) -> Result<(), GitError> {
        if !self.exists.swap(false, Ordering::SeqCst) {
            return Err(GitError::not_found("/fake"));
        }
        Ok(())
    }

    fn head(&self) -> Result<String, GitError> {
        if !self.exists() {
            return Err(GitError::not_found("/fake"));
        }
        Ok(FAKE_HEAD.to_string())
    }

    fn relevance(&self, _url: Option<&str>) -> Result<bool, GitError> {
        Ok(self.up_to_date.load(Ordering::SeqCst))
    }
}

/// Hands out one [`FakeCopy`] per repository name.
#[derive(Default)]
pub struct FakeFactory {
    copies: Mutex<HashMap<String, Arc<FakeCopy>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the copy used for `name`.
    pub fn with(self, name: &str, copy: FakeCopy) -> Self {
        self.copies.lock().insert(name.to_string(), Arc::new(copy));
        self
    }

    /// Returns the copy for `name`, creating an existing one if unknown.
    pub fn copy(&self, name: &str) -> Arc<FakeCopy> {
        Arc::clone(
            self.copies
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(FakeCopy::cloned())),
        )
    }
}

impl WorkingCopyFactory for FakeFactory {
    fn working_copy(&self, record: &RepositoryRecord) -> Arc<dyn WorkingCopy> {
        self.copy(&record.name)
    }
}

/// Returns an eligible record with a long interval and fast retries.
pub fn record(name: &str) -> RepositoryRecord {
    RepositoryRecord::new(name, format!("https://git.example.com/scm/team/{}.git", name))
        .with_sync_interval(500)
        .with_retries(3, 10)
}

/// Config without staleness checks, so every sync pulls.
pub fn config() -> SchedulerConfig {
    SchedulerConfig::default().with_skip_unchanged(false)
}

pub fn scheduler(
    store: &Arc<InMemoryStore>,
    factory: &Arc<FakeFactory>,
    config: SchedulerConfig,
) -> SyncScheduler {
    SyncScheduler::new(store.clone(), factory.clone(), config)
}

/// Polls `cond` every 10ms until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Returns true if the `git` executable is available.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Runs git in `dir`, panicking on failure.
pub fn git(dir: &std::path::Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["-c", "user.name=reposync", "-c", "user.email=reposync@example.com"])
        .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .expect("git should run");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Creates a bare remote with one commit on `main`, returning its file URL.
pub fn seed_remote(root: &std::path::Path) -> String {
    let remote = root.join("remote.git");
    let work = root.join("seed");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    git(&remote, &["init", "--bare"]);
    git(&work, &["init"]);
    std::fs::write(work.join("README.md"), "hello\n").unwrap();
    git(&work, &["add", "README.md"]);
    git(&work, &["commit", "-m", "initial"]);
    git(&work, &["branch", "-M", "main"]);
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&work, &["push", "origin", "main"]);

    format!("file://{}", remote.display())
}

/// Adds a commit to the seed clone and pushes it. Returns the new commit id.
pub fn push_commit(root: &std::path::Path, file: &str) -> String {
    let work = root.join("seed");
    std::fs::write(work.join(file), file).unwrap();
    git(&work, &["add", file]);
    git(&work, &["commit", "-m", file]);
    git(&work, &["push", "origin", "main"]);
    git(&work, &["rev-parse", "HEAD"])
}
