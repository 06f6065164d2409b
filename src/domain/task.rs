//! The `Task` aggregate and its lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduling priority a task was created with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Foreground,
    Normal,
    Background,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// The task's position in the state machine.
///
/// `done`, `failed`, and `canceled` are terminal: once reached (and not
/// re-activated via the `done`/`failed` → `in_progress` transitions the
/// table allows), the Runtime Manager disposes of the task's runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    AwaitingUser,
    Paused,
    Done,
    Failed,
    Canceled,
}

impl TaskStatus {
    /// `true` for `done`, `failed`, `canceled` — the three terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Canceled)
    }
}

/// A single to-do item tracked alongside a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: String,
    pub label: String,
    pub done: bool,
}

/// The read model for one task, reduced from the event log by
/// [`TaskProjection`](crate::projection::TaskProjection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub title: String,
    pub intent: Option<String>,
    pub priority: Priority,
    pub agent_id: String,
    pub status: TaskStatus,
    pub parent_task_id: Option<String>,
    pub child_task_ids: Vec<String>,
    pub pending_interaction_id: Option<String>,
    pub summary: Option<String>,
    pub failure_reason: Option<String>,
    pub todos: Vec<TodoItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of domain events folded into this view so far. Purely
    /// diagnostic — not required by any invariant, useful for debugging
    /// projection cursors.
    pub event_count: u64,
}

impl Task {
    /// `true` if this task has no `parentTaskId`.
    pub fn is_top_level(&self) -> bool {
        self.parent_task_id.is_none()
    }
}
