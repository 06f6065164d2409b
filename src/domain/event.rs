//! Domain events: the append-only vocabulary that the Task Projection folds
//! into a [`Task`](crate::domain::Task).

use crate::domain::task::{Priority, TodoItem};
use crate::domain::interaction::Interaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One domain event payload, tagged by variant.
///
/// Every variant carries `author_actor_id`. The event's `taskId` is carried by the
/// envelope ([`StoredEvent::stream_id`]), not repeated per-variant, since
/// `streamId == taskId` for every domain event (glossary: "Stream").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum DomainEvent {
    TaskCreated {
        author_actor_id: String,
        title: String,
        intent: Option<String>,
        priority: Priority,
        agent_id: String,
        parent_task_id: Option<String>,
    },
    TaskStarted {
        author_actor_id: String,
    },
    TaskCompleted {
        author_actor_id: String,
        summary: Option<String>,
    },
    TaskFailed {
        author_actor_id: String,
        failure_reason: String,
    },
    TaskCanceled {
        author_actor_id: String,
        reason: Option<String>,
    },
    TaskPaused {
        author_actor_id: String,
    },
    TaskResumed {
        author_actor_id: String,
    },
    TaskInstructionAdded {
        author_actor_id: String,
        instruction: String,
    },
    TaskTodoUpdated {
        author_actor_id: String,
        todos: Vec<TodoItem>,
    },
    UserInteractionRequested {
        author_actor_id: String,
        interaction: Interaction,
    },
    UserInteractionResponded {
        author_actor_id: String,
        interaction_id: String,
        selected_option_id: Option<String>,
        input_value: Option<String>,
        comment: Option<String>,
    },
    /// Recorded when a child task is created under this stream's parent, so
    /// the parent's `childTaskIds` can be folded purely from its own stream
    /// The parent link is the single source of truth for child membership. Appended by
    /// [`TaskService::create_task`](crate::task_service::TaskService::create_task)
    /// to the *parent's* stream in addition to `TaskCreated` on the child's
    /// own stream.
    ChildTaskLinked {
        author_actor_id: String,
        child_task_id: String,
    },
}

impl DomainEvent {
    /// Short event-kind name, used for transition-guard lookups and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::TaskCreated { .. } => "TaskCreated",
            DomainEvent::TaskStarted { .. } => "TaskStarted",
            DomainEvent::TaskCompleted { .. } => "TaskCompleted",
            DomainEvent::TaskFailed { .. } => "TaskFailed",
            DomainEvent::TaskCanceled { .. } => "TaskCanceled",
            DomainEvent::TaskPaused { .. } => "TaskPaused",
            DomainEvent::TaskResumed { .. } => "TaskResumed",
            DomainEvent::TaskInstructionAdded { .. } => "TaskInstructionAdded",
            DomainEvent::TaskTodoUpdated { .. } => "TaskTodoUpdated",
            DomainEvent::UserInteractionRequested { .. } => "UserInteractionRequested",
            DomainEvent::UserInteractionResponded { .. } => "UserInteractionResponded",
            DomainEvent::ChildTaskLinked { .. } => "ChildTaskLinked",
        }
    }

    /// The actor who authored this event, regardless of variant.
    pub fn author_actor_id(&self) -> &str {
        match self {
            DomainEvent::TaskCreated { author_actor_id, .. }
            | DomainEvent::TaskStarted { author_actor_id }
            | DomainEvent::TaskCompleted { author_actor_id, .. }
            | DomainEvent::TaskFailed { author_actor_id, .. }
            | DomainEvent::TaskCanceled { author_actor_id, .. }
            | DomainEvent::TaskPaused { author_actor_id }
            | DomainEvent::TaskResumed { author_actor_id }
            | DomainEvent::TaskInstructionAdded { author_actor_id, .. }
            | DomainEvent::TaskTodoUpdated { author_actor_id, .. }
            | DomainEvent::UserInteractionRequested { author_actor_id, .. }
            | DomainEvent::UserInteractionResponded { author_actor_id, .. }
            | DomainEvent::ChildTaskLinked { author_actor_id, .. } => author_actor_id,
        }
    }
}

/// A [`DomainEvent`] as persisted by the Event Store: the envelope adds
/// `id` (global monotonic), `streamId` (== taskId), `seq` (per-stream
/// monotonic), and `createdAt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: u64,
    pub stream_id: String,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub event: DomainEvent,
}

/// A named, cursor-tracked read model persisted separately from the event
/// log itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionRecord {
    pub name: String,
    pub cursor_event_id: u64,
    pub state: serde_json::Value,
}
