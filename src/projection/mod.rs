//! The Task Projection: a pure reducer plus a thin caching layer over
//! the Event Store's projection cursors.

mod task_projection;

pub use task_projection::{apply, can_transition, fold_stream};

use crate::domain::task::Task;
use crate::error::TransitionError;
use crate::store::EventStore;
use std::sync::Arc;

/// Materializes [`Task`] views on demand from a task's event stream.
///
/// This is deliberately not a cached/incremental projection for every
/// caller: each read folds the stream fresh, which is simple and correct
/// and fast enough at the scale this runtime targets (a handful of events
/// per task). The projection-cursor mechanism is still exposed for callers
/// that want to maintain an incremental index (e.g. a list-all-tasks view)
/// without re-folding every stream on every query.
pub struct TaskProjection {
    event_store: Arc<EventStore>,
}

impl TaskProjection {
    pub fn new(event_store: Arc<EventStore>) -> Self {
        Self { event_store }
    }

    /// Fold a task's full stream into its current view.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, TransitionError> {
        let events = self.event_store.read_stream(task_id, None).await;
        fold_stream(&events)
    }

    /// Validate (without applying) whether `event_kind` may be appended to
    /// `task_id` right now.
    pub async fn can_apply(&self, task_id: &str, event_kind: &str) -> Result<bool, TransitionError> {
        let task = self.get_task(task_id).await?;
        Ok(can_transition(task.status, event_kind))
    }
}
