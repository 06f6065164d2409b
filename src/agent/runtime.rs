//! The Agent Runtime: one instance per task, driving the
//! repair-then-execute loop and holding only scalar suspension state.

use crate::agent::output_handler::{OutputHandler, Signal};
use crate::agent::traits::{Agent, AgentInput, AgentOutput};
use crate::conversation;
use crate::domain::event::DomainEvent;
use crate::domain::interaction::InteractionResponse;
use crate::domain::message::LmMessage;
use crate::error::TransitionError;
use crate::store::{AuditLog, ConversationStore, EventStore};
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

async fn guarded_append(event_store: &EventStore, task_id: &str, event: DomainEvent) -> Result<(), TransitionError> {
    let current = event_store.read_stream(task_id, None).await;
    let task = crate::projection::fold_stream(&current)?;
    if !crate::projection::can_transition(task.status, event.kind()) {
        return Err(TransitionError::Invalid {
            from: format!("{:?}", task.status),
            event: event.kind().to_string(),
        });
    }
    event_store
        .append(task_id, vec![event])
        .await
        .map_err(|e| TransitionError::Invalid {
            from: format!("{:?}", task.status),
            event: e.to_string(),
        })?;
    Ok(())
}

/// Per-task execution state. `isExecuting` ensures only one loop runs at a
/// time; concurrent `execute()` calls observe it and return immediately
/// without starting a second loop.
pub struct AgentRuntime {
    task_id: String,
    author_actor_id: String,
    agent: Arc<dyn Agent>,
    event_store: Arc<EventStore>,
    conversation_store: Arc<ConversationStore>,
    audit_log: Arc<AuditLog>,
    output_handler: Arc<OutputHandler>,
    tool_registry: Arc<ToolRegistry>,
    tool_executor: Arc<ToolExecutor>,
    agent_output_channel_capacity: usize,

    is_executing: AtomicBool,
    is_paused: AtomicBool,
    is_canceled: AtomicBool,
    pending_instructions: Mutex<Vec<String>>,
    cancellation: CancellationToken,
}

impl AgentRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: impl Into<String>,
        author_actor_id: impl Into<String>,
        agent: Arc<dyn Agent>,
        event_store: Arc<EventStore>,
        conversation_store: Arc<ConversationStore>,
        audit_log: Arc<AuditLog>,
        output_handler: Arc<OutputHandler>,
        tool_registry: Arc<ToolRegistry>,
        tool_executor: Arc<ToolExecutor>,
        agent_output_channel_capacity: usize,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            author_actor_id: author_actor_id.into(),
            agent,
            event_store,
            conversation_store,
            audit_log,
            output_handler,
            tool_registry,
            tool_executor,
            agent_output_channel_capacity,
            is_executing: AtomicBool::new(false),
            is_paused: AtomicBool::new(false),
            is_canceled: AtomicBool::new(false),
            pending_instructions: Mutex::new(Vec::new()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn on_pause(&self) {
        self.is_paused.store(true, Ordering::SeqCst);
    }

    pub fn on_resume(&self) {
        self.is_paused.store(false, Ordering::SeqCst);
    }

    pub fn on_cancel(&self) {
        self.is_canceled.store(true, Ordering::SeqCst);
        self.cancellation.cancel();
    }

    /// Instruction arrival: always queue while executing; otherwise append
    /// immediately if the history is safe, or queue until the next safe
    /// yield point.
    pub async fn on_instruction(&self, text: String) {
        if self.is_executing.load(Ordering::SeqCst) {
            self.pending_instructions.lock().await.push(text);
            return;
        }
        let history = self.load_messages().await;
        if conversation::is_safe_to_inject(&history) {
            let _ = self
                .conversation_store
                .append(&self.task_id, LmMessage::User { content: text })
                .await;
        } else {
            self.pending_instructions.lock().await.push(text);
        }
    }

    async fn load_messages(&self) -> Vec<LmMessage> {
        self.conversation_store
            .load(&self.task_id)
            .await
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    /// Start (or restart) the agent loop with no pending interaction
    /// response. Returns `Ok(())` immediately, without doing anything, if
    /// another execution is already in flight (single-flight guard).
    pub async fn execute(&self) -> Result<(), TransitionError> {
        self.run_loop(None, None).await
    }

    /// Resume after a user responded to a pending interaction. A rejection
    /// runs the Output Handler's rejection handler before the loop resumes;
    /// an approval carries the confirmation binding into the next iteration.
    pub async fn resume(&self, response: InteractionResponse) -> Result<(), TransitionError> {
        let approved = response.selected_option_id.as_deref() == Some("approve");
        let confirmed_tool_call_id = if approved {
            self.confirmed_tool_call_id_for(&response).await
        } else {
            None
        };

        if !approved {
            if let Some(call) = self.dangling_tool_call(&response).await {
                self.output_handler.handle_rejection(&self.task_id, &call).await;
            }
        }

        self.run_loop(Some(response.interaction_id), confirmed_tool_call_id).await
    }

    async fn confirmed_tool_call_id_for(&self, response: &InteractionResponse) -> Option<String> {
        let events = self.event_store.read_stream(&self.task_id, None).await;
        events.iter().rev().find_map(|e| match &e.event {
            DomainEvent::UserInteractionRequested { interaction, .. }
                if interaction.interaction_id == response.interaction_id =>
            {
                interaction.bound_tool_call_id().map(|s| s.to_string())
            }
            _ => None,
        })
    }

    async fn dangling_tool_call(&self, response: &InteractionResponse) -> Option<crate::domain::message::ToolCallRequest> {
        let tool_call_id = self.confirmed_tool_call_id_for(response).await?;
        let history = self.load_messages().await;
        history.iter().rev().find_map(|m| match m {
            LmMessage::Assistant { tool_calls, .. } => tool_calls.iter().find(|c| c.tool_call_id == tool_call_id).cloned(),
            _ => None,
        })
    }

    async fn run_loop(&self, confirmed_interaction_id: Option<String>, confirmed_tool_call_id: Option<String>) -> Result<(), TransitionError> {
        if self.is_executing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.run_loop_inner(confirmed_interaction_id, confirmed_tool_call_id).await;
        self.is_executing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_loop_inner(&self, confirmed_interaction_id: Option<String>, confirmed_tool_call_id: Option<String>) -> Result<(), TransitionError> {
        let mut history = self.load_messages().await;

        let lookup_ctx = ToolContext::new(self.task_id.clone(), self.cancellation.clone());
        let sample_args = serde_json::Value::Null;
        let lookup = conversation::lookup_from_registry(&self.tool_registry, &sample_args, &lookup_ctx);
        let injected = conversation::repair(
            &history,
            &self.task_id,
            &self.audit_log,
            &self.tool_executor,
            lookup,
            self.cancellation.clone(),
        )
        .await;
        for message in injected {
            let entry = self.conversation_store.append(&self.task_id, message).await;
            if let Ok(entry) = entry {
                history.push(entry.message);
            }
        }

        self.drain_instructions(&mut history).await;

        loop {
            if self.is_canceled.load(Ordering::SeqCst) {
                return Ok(());
            }

            let (tx, mut rx) = mpsc::channel::<AgentOutput>(self.agent_output_channel_capacity);
            let input = AgentInput {
                task_id: self.task_id.clone(),
                history: history.clone(),
                confirmed_tool_call_id: confirmed_tool_call_id.clone(),
                cancellation: self.cancellation.clone(),
                conversation_store: self.conversation_store.clone(),
            };
            let agent = self.agent.clone();
            let handle = tokio::spawn(async move {
                agent.run(input, tx).await;
            });

            let mut ctx = ToolContext::new(self.task_id.clone(), self.cancellation.clone());
            if let (Some(interaction_id), Some(tool_call_id)) = (&confirmed_interaction_id, &confirmed_tool_call_id) {
                ctx = ctx.with_confirmation(interaction_id.clone(), tool_call_id.clone());
            }

            let mut broke = false;
            while let Some(output) = rx.recv().await {
                self.drain_instructions(&mut history).await;

                if self.is_canceled.load(Ordering::SeqCst) {
                    broke = true;
                    break;
                }
                if self.is_paused.load(Ordering::SeqCst) && conversation::is_safe_to_inject(&history) {
                    broke = true;
                    break;
                }

                let outcome = self
                    .output_handler
                    .handle(&self.task_id, &self.author_actor_id, output, &ctx, false)
                    .await;

                if outcome.confirmation_consumed {
                    ctx.confirmed_interaction_id = None;
                    ctx.confirmed_tool_call_id = None;
                }

                if let Some(event) = outcome.event {
                    guarded_append(&self.event_store, &self.task_id, event).await?;
                }

                if outcome.signal != Signal::Continue {
                    broke = true;
                    break;
                }

                history = self.load_messages().await;
            }

            let _ = handle.await;
            if broke {
                return Ok(());
            }
            // Agent yielded nothing more without the handler signalling
            // pause/terminal (e.g. its channel simply closed) — treat as a
            // natural suspension point and stop this iteration.
            return Ok(());
        }
    }

    async fn drain_instructions(&self, history: &mut Vec<LmMessage>) {
        if !conversation::is_safe_to_inject(history) {
            return;
        }
        let mut queued = self.pending_instructions.lock().await;
        if queued.is_empty() {
            return;
        }
        let drained: Vec<String> = queued.drain(..).collect();
        drop(queued);
        for text in drained {
            if let Ok(entry) = self
                .conversation_store
                .append(&self.task_id, LmMessage::User { content: text })
                .await
            {
                history.push(entry.message);
            }
        }
    }
}
