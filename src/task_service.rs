//! The Task Service: the command façade every caller (transport,
//! tools, CLI) goes through to mutate a task. Each command validates the
//! current transition and appends exactly one event.

use crate::domain::event::DomainEvent;
use crate::domain::interaction::{Interaction, InteractionResponse};
use crate::domain::task::{Priority, Task, TodoItem};
use crate::error::{InteractionError, TransitionError};
use crate::projection::TaskProjection;
use crate::store::EventStore;
use std::sync::Arc;
use uuid::Uuid;

/// Command façade over the Event Store and Task Projection.
///
/// Every method here validates the requested transition against the
/// current task state before appending, so an invalid command is rejected
/// to the caller with no event appended.
pub struct TaskService {
    event_store: Arc<EventStore>,
    projection: TaskProjection,
}

impl TaskService {
    pub fn new(event_store: Arc<EventStore>) -> Self {
        let projection = TaskProjection::new(event_store.clone());
        Self {
            event_store,
            projection,
        }
    }

    async fn guarded_append(
        &self,
        task_id: &str,
        event: DomainEvent,
    ) -> Result<Task, TransitionError> {
        let current = self.projection.get_task(task_id).await?;
        if !crate::projection::can_transition(current.status, event.kind()) {
            return Err(TransitionError::Invalid {
                from: format!("{:?}", current.status),
                event: event.kind().to_string(),
            });
        }
        self.event_store
            .append(task_id, vec![event])
            .await
            .map_err(|e| TransitionError::Invalid {
                from: format!("{:?}", current.status),
                event: e.to_string(),
            })?;
        self.projection.get_task(task_id).await
    }

    /// Create a new top-level or child task. Returns the new task's id.
    pub async fn create_task(
        &self,
        author_actor_id: &str,
        title: &str,
        intent: Option<String>,
        priority: Priority,
        agent_id: &str,
        parent_task_id: Option<String>,
    ) -> Result<Task, TransitionError> {
        let task_id = Uuid::new_v4().to_string();
        self.event_store
            .append(
                &task_id,
                vec![DomainEvent::TaskCreated {
                    author_actor_id: author_actor_id.to_string(),
                    title: title.to_string(),
                    intent,
                    priority,
                    agent_id: agent_id.to_string(),
                    parent_task_id: parent_task_id.clone(),
                }],
            )
            .await
            .map_err(|e| TransitionError::Invalid {
                from: "<none>".to_string(),
                event: e.to_string(),
            })?;

        // The parent link is folded purely from the parent's own stream
        // (see ChildTaskLinked), so the child's creation also appends a
        // linking event on the parent's stream.
        if let Some(parent_id) = &parent_task_id {
            self.event_store
                .append(
                    parent_id,
                    vec![DomainEvent::ChildTaskLinked {
                        author_actor_id: author_actor_id.to_string(),
                        child_task_id: task_id.clone(),
                    }],
                )
                .await
                .map_err(|e| TransitionError::Invalid {
                    from: "<n/a>".to_string(),
                    event: e.to_string(),
                })?;
        }

        self.projection.get_task(&task_id).await
    }

    pub async fn cancel_task(&self, task_id: &str, author_actor_id: &str, reason: Option<String>) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskCanceled {
                author_actor_id: author_actor_id.to_string(),
                reason,
            },
        )
        .await
    }

    pub async fn pause_task(&self, task_id: &str, author_actor_id: &str) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskPaused {
                author_actor_id: author_actor_id.to_string(),
            },
        )
        .await
    }

    pub async fn resume_task(&self, task_id: &str, author_actor_id: &str) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskResumed {
                author_actor_id: author_actor_id.to_string(),
            },
        )
        .await
    }

    /// Instructions on `paused` or `canceled` tasks are rejected — the user
    /// must resume or create a new task.
    pub async fn add_instruction(
        &self,
        task_id: &str,
        author_actor_id: &str,
        instruction: &str,
    ) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskInstructionAdded {
                author_actor_id: author_actor_id.to_string(),
                instruction: instruction.to_string(),
            },
        )
        .await
    }

    pub async fn update_todo_list(
        &self,
        task_id: &str,
        author_actor_id: &str,
        todos: Vec<TodoItem>,
    ) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskTodoUpdated {
                author_actor_id: author_actor_id.to_string(),
                todos,
            },
        )
        .await
    }

    pub async fn start_task(&self, task_id: &str, author_actor_id: &str) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskStarted {
                author_actor_id: author_actor_id.to_string(),
            },
        )
        .await
    }

    pub async fn complete_task(
        &self,
        task_id: &str,
        author_actor_id: &str,
        summary: Option<String>,
    ) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskCompleted {
                author_actor_id: author_actor_id.to_string(),
                summary,
            },
        )
        .await
    }

    pub async fn fail_task(
        &self,
        task_id: &str,
        author_actor_id: &str,
        failure_reason: &str,
    ) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::TaskFailed {
                author_actor_id: author_actor_id.to_string(),
                failure_reason: failure_reason.to_string(),
            },
        )
        .await
    }

    /// Request a user interaction (confirmation or input), moving the task
    /// to `awaiting_user`.
    pub async fn request_interaction(
        &self,
        task_id: &str,
        author_actor_id: &str,
        interaction: Interaction,
    ) -> Result<Task, TransitionError> {
        self.guarded_append(
            task_id,
            DomainEvent::UserInteractionRequested {
                author_actor_id: author_actor_id.to_string(),
                interaction,
            },
        )
        .await
    }

    /// Current task view.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, TransitionError> {
        self.projection.get_task(task_id).await
    }

    /// The currently pending interaction, if any — the returned id matches
    /// `task.pending_interaction_id`.
    pub async fn get_pending_interaction(&self, task_id: &str) -> Result<Option<String>, TransitionError> {
        Ok(self.projection.get_task(task_id).await?.pending_interaction_id)
    }

    /// Respond to a pending interaction. The response must reference the
    /// currently pending `interactionId`; a stale or duplicate response
    /// (one that doesn't match, or arrives after the interaction already
    /// resolved) is rejected with no event appended.
    pub async fn respond_to_interaction(
        &self,
        task_id: &str,
        author_actor_id: &str,
        response: InteractionResponse,
    ) -> Result<Task, InteractionError> {
        let task = self
            .projection
            .get_task(task_id)
            .await
            .map_err(|_| InteractionError::NoPendingInteraction(task_id.to_string()))?;

        match &task.pending_interaction_id {
            None => Err(InteractionError::NoPendingInteraction(task_id.to_string())),
            Some(pending) if *pending != response.interaction_id => Err(InteractionError::StaleResponse {
                supplied: response.interaction_id.clone(),
                pending: Some(pending.clone()),
            }),
            Some(_) => self
                .guarded_append(
                    task_id,
                    DomainEvent::UserInteractionResponded {
                        author_actor_id: author_actor_id.to_string(),
                        interaction_id: response.interaction_id,
                        selected_option_id: response.selected_option_id,
                        input_value: response.input_value,
                        comment: response.comment,
                    },
                )
                .await
                .map_err(|e| InteractionError::StaleResponse {
                    supplied: "<transition-rejected>".to_string(),
                    pending: Some(e.to_string()),
                }),
        }
    }
}
