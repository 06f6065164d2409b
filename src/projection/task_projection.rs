//! Pure reducer: folds [`DomainEvent`]s into a [`Task`] view, enforcing the
//! state-transition guard table.

use crate::domain::event::{DomainEvent, StoredEvent};
use crate::domain::task::{Task, TaskStatus};
use crate::error::TransitionError;

/// `true` iff an event of kind `event_kind` may be applied while a task is
/// in `status`. Encodes the full state-transition guard table: terminal
/// states only accept `InstructionAdded`/`TodoUpdated` (with `done`/`failed`
/// re-activating to `in_progress`), `canceled` accepts nothing further, and
/// `paused` rejects instructions outright (a paused task must be resumed, or
/// a new task created, before it can be steered).
pub fn can_transition(status: TaskStatus, event_kind: &str) -> bool {
    use TaskStatus::*;
    match (status, event_kind) {
        (Open, "TaskStarted") => true,
        (Open, "TaskCanceled") => true,
        (Open, "TaskInstructionAdded") => true,
        (Open, "TaskTodoUpdated") => true,

        (InProgress, "TaskStarted") => true,
        (InProgress, "UserInteractionRequested") => true,
        (InProgress, "TaskCompleted") => true,
        (InProgress, "TaskFailed") => true,
        (InProgress, "TaskCanceled") => true,
        (InProgress, "TaskPaused") => true,
        (InProgress, "TaskInstructionAdded") => true,
        (InProgress, "TaskTodoUpdated") => true,

        (AwaitingUser, "UserInteractionResponded") => true,
        (AwaitingUser, "TaskCanceled") => true,
        (AwaitingUser, "TaskInstructionAdded") => true,
        (AwaitingUser, "TaskTodoUpdated") => true,

        (Paused, "TaskFailed") => true,
        (Paused, "TaskCanceled") => true,
        (Paused, "TaskResumed") => true,
        (Paused, "TaskTodoUpdated") => true,

        (Done, "TaskStarted") => true,
        (Done, "TaskInstructionAdded") => true,
        (Done, "TaskTodoUpdated") => true,

        (Failed, "TaskInstructionAdded") => true,
        (Failed, "TaskTodoUpdated") => true,

        // A child task can be linked onto its parent's stream at any point
        // in the parent's lifecycle short of cancellation — it carries no
        // status change of its own, same as `TaskTodoUpdated`.
        (_, "ChildTaskLinked") if status != Canceled => true,

        (Canceled, _) => false,

        _ => false,
    }
}

/// The status a successful transition lands on. Most events carry their own
/// target status implicitly (e.g. `TaskPaused` always lands on `Paused`),
/// but two events are state-dependent: `TaskStarted` from `done` and
/// `TaskInstructionAdded` from `done`/`failed` both re-activate to
/// `in_progress`, while the same events elsewhere are no-ops on status.
fn next_status(current: TaskStatus, event: &DomainEvent) -> TaskStatus {
    use TaskStatus::*;
    match event {
        DomainEvent::TaskStarted { .. } => InProgress,
        DomainEvent::TaskCompleted { .. } => Done,
        DomainEvent::TaskFailed { .. } => Failed,
        DomainEvent::TaskCanceled { .. } => Canceled,
        DomainEvent::TaskPaused { .. } => Paused,
        DomainEvent::TaskResumed { .. } => InProgress,
        DomainEvent::UserInteractionRequested { .. } => AwaitingUser,
        DomainEvent::UserInteractionResponded { .. } => {
            if current == AwaitingUser {
                InProgress
            } else {
                current
            }
        }
        DomainEvent::TaskInstructionAdded { .. } => match current {
            Done | Failed => InProgress,
            other => other,
        },
        DomainEvent::TaskTodoUpdated { .. } | DomainEvent::ChildTaskLinked { .. } => current,
        DomainEvent::TaskCreated { .. } => Open,
    }
}

/// Fold one [`StoredEvent`] into `task`, a fresh [`Task`] aggregate (the
/// first event for a stream must be `TaskCreated`, constructed by
/// [`fold_stream`] rather than this function).
///
/// Returns `Err` without mutating status if the guard table rejects the
/// event; non-status fields (todos, summary, etc.) are only written when the
/// transition is admissible.
pub fn apply(mut task: Task, stored: &StoredEvent) -> Result<Task, TransitionError> {
    let kind = stored.event.kind();
    if !can_transition(task.status, kind) {
        return Err(TransitionError::Invalid {
            from: format!("{:?}", task.status),
            event: kind.to_string(),
        });
    }

    task.status = next_status(task.status, &stored.event);
    task.updated_at = stored.created_at;
    task.event_count += 1;

    match &stored.event {
        DomainEvent::TaskCompleted { summary, .. } => {
            task.summary = summary.clone();
        }
        DomainEvent::TaskFailed { failure_reason, .. } => {
            task.failure_reason = Some(failure_reason.clone());
        }
        DomainEvent::TaskTodoUpdated { todos, .. } => {
            task.todos = todos.clone();
        }
        DomainEvent::UserInteractionRequested { interaction, .. } => {
            task.pending_interaction_id = Some(interaction.interaction_id.clone());
        }
        DomainEvent::UserInteractionResponded { interaction_id, .. } => {
            if task.pending_interaction_id.as_deref() == Some(interaction_id.as_str()) {
                task.pending_interaction_id = None;
            }
        }
        DomainEvent::ChildTaskLinked { child_task_id, .. } => {
            if !task.child_task_ids.iter().any(|id| id == child_task_id) {
                task.child_task_ids.push(child_task_id.clone());
            }
        }
        _ => {}
    }

    Ok(task)
}

/// Fold an entire ordered stream (as returned by `EventStore::read_stream`)
/// into a [`Task`]. The first event must be `TaskCreated`; every later event
/// is folded via [`apply`].
pub fn fold_stream(events: &[StoredEvent]) -> Result<Task, TransitionError> {
    let (first, rest) = events
        .split_first()
        .ok_or_else(|| TransitionError::UnknownTask("empty stream".to_string()))?;

    let task = match &first.event {
        DomainEvent::TaskCreated {
            title,
            intent,
            priority,
            agent_id,
            parent_task_id,
            ..
        } => Task {
            task_id: first.stream_id.clone(),
            title: title.clone(),
            intent: intent.clone(),
            priority: *priority,
            agent_id: agent_id.clone(),
            status: TaskStatus::Open,
            parent_task_id: parent_task_id.clone(),
            child_task_ids: Vec::new(),
            pending_interaction_id: None,
            summary: None,
            failure_reason: None,
            todos: Vec::new(),
            created_at: first.created_at,
            updated_at: first.created_at,
            event_count: 1,
        },
        other => {
            return Err(TransitionError::Invalid {
                from: "<none>".to_string(),
                event: other.kind().to_string(),
            })
        }
    };

    rest.iter().try_fold(task, apply)
}
