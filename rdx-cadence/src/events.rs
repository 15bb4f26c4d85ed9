//! Event types broadcast by running tasks.
//!
//! Every task owns a broadcast channel; [`Task::subscribe`](crate::task::Task::subscribe)
//! hands out receivers for it. Sends never block and are dropped when no
//! receiver is listening.

use chrono::{DateTime, Utc};

/// State transitions of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Fired each time the task's actions run, whether from the timer or
    /// from a manual trigger.
    Fired {
        /// The moment the fire was recorded.
        at: DateTime<Utc>,
        /// Total executions including this one.
        executions: u64,
    },
    /// The task entered the suspended state (outermost suspend only).
    Suspended,
    /// The task left the suspended state (last matching resume).
    Resumed,
    /// The task's schedule was replaced.
    Rescheduled,
    /// The schedule yielded no further offset; the task is inert.
    Exhausted,
    /// The task was cancelled and will never fire again.
    Cancelled,
}
