//! Scan task definitions.

use std::sync::atomic::{AtomicU8, Ordering};

/// A periodic scan owned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ScanTask {
    /// New posts in followed feeds.
    FollowedFeeds,
    /// New posts in starred feeds.
    StarredFeeds,
}

/// Lifecycle state of a scan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    /// Waiting for the next tick.
    Idle = 0,
    /// A scan is in progress.
    Running = 1,
    /// The task loop has exited.
    Stopped = 2,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Lock-free holder for a [`TaskState`].
#[derive(Debug)]
pub(crate) struct TaskStateCell(AtomicU8);

impl TaskStateCell {
    pub(crate) fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
