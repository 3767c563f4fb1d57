//! Background scheduler for feed change detection.
//!
//! Two independent periodic tasks share one cancellation token:
//! - `FollowedFeeds` first runs one interval after start.
//! - `StarredFeeds` first runs after a short initial delay, then every interval.
//!
//! A scan runs inside its task's loop, so the same task never overlaps itself.
//! Ticks that fall due during a long scan are skipped, not queued. On
//! cancellation an in-flight scan finishes before its task exits.

mod service;
mod task;

pub use service::{BackgroundScheduler, SchedulerConfig, SchedulerHandles, join_tasks};
pub use task::{ScanTask, TaskState};
