//! The Runtime Manager: fans out Event Store events to per-task
//! [`AgentRuntime`]s, serialized by a per-task mutex while different tasks
//! run fully concurrently.

use crate::agent::{Agent, AgentRuntime, OutputHandler};
use crate::domain::event::{DomainEvent, StoredEvent};
use crate::domain::interaction::InteractionResponse;
use crate::store::{AuditLog, ConversationStore, EventStore};
use crate::tools::{ToolExecutor, ToolRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct RuntimeEntry {
    runtime: Arc<AgentRuntime>,
    /// Serializes work items for this task; held only while
    /// processing one item.
    lock: Arc<Mutex<()>>,
}

/// Owns one [`AgentRuntime`] per non-terminal task and dispatches Event
/// Store events to the right one. A task's runtime is disposed once its
/// task reaches a terminal state; later events for it are ignored.
pub struct RuntimeManager {
    event_store: Arc<EventStore>,
    conversation_store: Arc<ConversationStore>,
    audit_log: Arc<AuditLog>,
    tool_registry: Arc<ToolRegistry>,
    tool_executor: Arc<ToolExecutor>,
    ui_bus: Arc<dyn crate::ui_bus::UiBus>,
    agent_for: Arc<dyn Fn(&str) -> Option<Arc<dyn Agent>> + Send + Sync>,
    agent_output_channel_capacity: usize,
    /// One mutex guards the map itself; per-task locks are only held while
    /// running that task's work item (§5, "Shared-resource policy").
    runtimes: Mutex<HashMap<String, RuntimeEntry>>,
}

impl RuntimeManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_store: Arc<EventStore>,
        conversation_store: Arc<ConversationStore>,
        audit_log: Arc<AuditLog>,
        tool_registry: Arc<ToolRegistry>,
        tool_executor: Arc<ToolExecutor>,
        ui_bus: Arc<dyn crate::ui_bus::UiBus>,
        agent_for: Arc<dyn Fn(&str) -> Option<Arc<dyn Agent>> + Send + Sync>,
        agent_output_channel_capacity: usize,
    ) -> Self {
        Self {
            event_store,
            conversation_store,
            audit_log,
            tool_registry,
            tool_executor,
            ui_bus,
            agent_for,
            agent_output_channel_capacity,
            runtimes: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to the Event Store and dispatch every event forever. Meant
    /// to be spawned as its own task; returns only if the broadcast channel
    /// is closed.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self.event_store.subscribe();
        loop {
            match rx.recv().await {
                Ok(stored) => self.dispatch(stored).await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn get_or_create_runtime(&self, task_id: &str) -> Option<(Arc<AgentRuntime>, Arc<Mutex<()>>)> {
        {
            let runtimes = self.runtimes.lock().await;
            if let Some(entry) = runtimes.get(task_id) {
                return Some((entry.runtime.clone(), entry.lock.clone()));
            }
        }

        let task = match crate::projection::fold_stream(&self.event_store.read_stream(task_id, None).await) {
            Ok(task) => task,
            Err(err) => {
                log::warn!("dropping dispatch for task {task_id}: failed to fold event stream: {err}");
                return None;
            }
        };
        let Some(agent) = (self.agent_for)(&task.agent_id) else {
            log::warn!("dropping dispatch for task {task_id}: no agent registered for agent id {}", task.agent_id);
            return None;
        };

        let output_handler = Arc::new(OutputHandler::new(
            self.conversation_store.clone(),
            self.ui_bus.clone(),
            self.tool_registry.clone(),
            self.tool_executor.clone(),
        ));
        let runtime = Arc::new(AgentRuntime::new(
            task_id.to_string(),
            task.agent_id.clone(),
            agent,
            self.event_store.clone(),
            self.conversation_store.clone(),
            self.audit_log.clone(),
            output_handler,
            self.tool_registry.clone(),
            self.tool_executor.clone(),
            self.agent_output_channel_capacity,
        ));
        let lock = Arc::new(Mutex::new(()));

        let mut runtimes = self.runtimes.lock().await;
        let entry = runtimes.entry(task_id.to_string()).or_insert_with(|| RuntimeEntry {
            runtime: runtime.clone(),
            lock: lock.clone(),
        });
        Some((entry.runtime.clone(), entry.lock.clone()))
    }

    async fn dispose(&self, task_id: &str) {
        self.runtimes.lock().await.remove(task_id);
    }

    async fn dispatch(&self, stored: StoredEvent) {
        let task_id = stored.stream_id.clone();

        match &stored.event {
            DomainEvent::TaskCreated { agent_id, .. } => {
                if (self.agent_for)(agent_id).is_none() {
                    return;
                }
                let Some((runtime, lock)) = self.get_or_create_runtime(&task_id).await else {
                    return;
                };
                let _guard = lock.lock().await;
                let _ = runtime.execute().await;
            }
            DomainEvent::UserInteractionResponded {
                interaction_id,
                selected_option_id,
                input_value,
                comment,
                ..
            } => {
                let Some((runtime, lock)) = self.get_or_create_runtime(&task_id).await else {
                    return;
                };
                let _guard = lock.lock().await;
                let response = InteractionResponse {
                    interaction_id: interaction_id.clone(),
                    selected_option_id: selected_option_id.clone(),
                    input_value: input_value.clone(),
                    comment: comment.clone(),
                };
                let _ = runtime.resume(response).await;
            }
            DomainEvent::TaskPaused { .. } => {
                if let Some((runtime, lock)) = self.get_or_create_runtime(&task_id).await {
                    let _guard = lock.lock().await;
                    runtime.on_pause();
                }
            }
            DomainEvent::TaskResumed { .. } => {
                if let Some((runtime, lock)) = self.get_or_create_runtime(&task_id).await {
                    let _guard = lock.lock().await;
                    runtime.on_resume();
                    let _ = runtime.execute().await;
                }
            }
            DomainEvent::TaskCanceled { .. } => {
                if let Some((runtime, lock)) = self.get_or_create_runtime(&task_id).await {
                    let _guard = lock.lock().await;
                    runtime.on_cancel();
                }
                self.dispose(&task_id).await;
            }
            DomainEvent::TaskInstructionAdded { instruction, .. } => {
                if let Some((runtime, lock)) = self.get_or_create_runtime(&task_id).await {
                    let _guard = lock.lock().await;
                    runtime.on_instruction(instruction.clone()).await;
                }
            }
            DomainEvent::TaskCompleted { .. } | DomainEvent::TaskFailed { .. } => {
                self.dispose(&task_id).await;
            }
            _ => {}
        }
    }
}
