use serde::{Deserialize, Serialize};
use std::fmt;

/// Formal lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Registered with the manager, waiting for a concurrency slot
    InQueue,
    /// Acquiring and validating input
    Preparing,
    /// Performing network or file I/O
    Working,
    /// Cancellation requested, pipeline winding down
    Stopping,
    Stopped,
    Failed,
    Completed,
    /// Rebuilt from a persisted history record
    History,
}

impl TaskStatus {
    /// No further transition is possible from a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Stopped | TaskStatus::Failed | TaskStatus::Completed | TaskStatus::History
        )
    }

    /// Statuses that occupy a concurrency slot
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TaskStatus::Preparing | TaskStatus::Working | TaskStatus::Stopping
        )
    }

    /// Statuses that keep the manager busy (queued or active)
    pub fn is_busy(self) -> bool {
        self == TaskStatus::InQueue || self.is_active()
    }

    pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
        use TaskStatus::*;

        match (from, to) {
            (InQueue, Preparing) | (InQueue, Stopped) => true,
            (Preparing, Working) | (Preparing, Stopping) | (Preparing, Failed) => true,
            (Preparing, Completed) => true,
            (Working, Stopping) | (Working, Completed) | (Working, Failed) => true,
            (Stopping, Stopped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::InQueue => "in queue",
            TaskStatus::Preparing => "preparing",
            TaskStatus::Working => "working",
            TaskStatus::Stopping => "stopping",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Failed => "failed",
            TaskStatus::Completed => "completed",
            TaskStatus::History => "history",
        };
        f.write_str(label)
    }
}
