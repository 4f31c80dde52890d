#![allow(dead_code)]
use reposync_core::RepositoryRecord;

/// Returns an eligible record pointing at a fake HTTPS remote.
pub fn record(name: &str) -> RepositoryRecord {
    RepositoryRecord::new(name, format!("https://git.example.com/scm/team/{}.git", name))
}

/// Returns a record with every polling flag switched off.
pub fn disabled_record(name: &str) -> RepositoryRecord {
    let mut r = record(name);
    r.active = false;
    r.enable_polling = false;
    r
}
