//! Error types for the runtime.
//!
//! Each subsystem gets a small hand-rolled `Display + Error` enum rather than
//! a derive-macro error crate. Fallible public APIs return
//! `Result<T, Box<dyn Error + Send + Sync>>` at the boundary so callers can
//! use `?` freely regardless of which subsystem produced the failure.

use std::error::Error;
use std::fmt;

/// Errors from the Event Store, Conversation Store, and Audit Log (C1–C3).
#[derive(Debug, Clone)]
pub enum StoreError {
    /// The durable write failed; the in-memory state was not mutated.
    Io(String),
    /// A record on disk could not be deserialized.
    Corrupt(String),
    /// A read referenced an id/seq that does not exist.
    NotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "store I/O error: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "corrupt store record: {}", msg),
            StoreError::NotFound(msg) => write!(f, "not found: {}", msg),
        }
    }
}

impl Error for StoreError {}

/// Errors from the Task State Machine / Task Service (C4, C11).
#[derive(Debug, Clone)]
pub enum TransitionError {
    /// The transition guard table rejected this event for the task's current status.
    Invalid {
        /// The task's current status.
        from: String,
        /// The event kind that was rejected.
        event: String,
    },
    /// The task referenced by the command does not exist.
    UnknownTask(String),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::Invalid { from, event } => {
                write!(f, "cannot apply {} while task is {}", event, from)
            }
            TransitionError::UnknownTask(id) => write!(f, "unknown task: {}", id),
        }
    }
}

impl Error for TransitionError {}

/// Errors from the Tool Executor.
#[derive(Debug, Clone)]
pub enum ToolExecutionError {
    /// No tool with this name is registered.
    NotFound(String),
    /// The tool's `can_execute` precheck failed.
    PrecheckFailed(String),
    /// A risky tool was invoked without a matching confirmation binding.
    ConfirmationRequired {
        /// The tool call id that required confirmation.
        tool_call_id: String,
    },
    /// The tool itself returned an application-level failure.
    ExecutionFailed(String),
}

impl fmt::Display for ToolExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolExecutionError::NotFound(name) => write!(f, "tool not found: {}", name),
            ToolExecutionError::PrecheckFailed(msg) => write!(f, "tool precheck failed: {}", msg),
            ToolExecutionError::ConfirmationRequired { tool_call_id } => write!(
                f,
                "confirmation required for tool call {}",
                tool_call_id
            ),
            ToolExecutionError::ExecutionFailed(msg) => write!(f, "tool execution failed: {}", msg),
        }
    }
}

impl Error for ToolExecutionError {}

/// Errors from the Interaction API (§6).
#[derive(Debug, Clone)]
pub enum InteractionError {
    /// No interaction is currently pending for this task (P4).
    NoPendingInteraction(String),
    /// The response's `interactionId` does not match the pending one.
    StaleResponse {
        /// The id the caller supplied.
        supplied: String,
        /// The id actually pending, if any.
        pending: Option<String>,
    },
}

impl fmt::Display for InteractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionError::NoPendingInteraction(task_id) => {
                write!(f, "no pending interaction for task {}", task_id)
            }
            InteractionError::StaleResponse { supplied, pending } => write!(
                f,
                "stale interaction response {} (currently pending: {:?})",
                supplied, pending
            ),
        }
    }
}

impl Error for InteractionError {}

/// Errors from the Subtask Tool.
#[derive(Debug, Clone)]
pub enum SubtaskError {
    /// The caller task is not top-level (it already has a `parentTaskId`).
    NotTopLevel(String),
    /// The requested `agentId` is not registered.
    UnknownAgent(String),
    /// The child spec list was empty.
    EmptyRequest,
}

impl fmt::Display for SubtaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtaskError::NotTopLevel(task_id) => {
                write!(f, "task {} is not top-level, cannot spawn subtasks", task_id)
            }
            SubtaskError::UnknownAgent(agent_id) => write!(f, "unknown agent: {}", agent_id),
            SubtaskError::EmptyRequest => write!(f, "createSubtasks requires at least one child"),
        }
    }
}

impl Error for SubtaskError {}
