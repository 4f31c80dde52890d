//! Background synchronization scheduling.
//!
//! This module runs one poll loop per repository, keeping each working copy
//! in step with its remote on the repository's own interval.

mod interval;
mod operation;
mod poll;
mod scheduler;
mod state;

pub use interval::{MILLIS_THRESHOLD, normalize_interval};
pub use operation::SyncReport;
pub use poll::LoopExit;
pub use scheduler::{SchedulerConfig, SyncScheduler};
