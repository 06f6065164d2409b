//! The Output Handler: interprets one [`AgentOutput`] into a side
//! effect — a UI emission, a persisted conversation message, a domain event
//! to append — and tells the runtime loop whether to keep going.

use crate::agent::traits::AgentOutput;
use crate::domain::event::DomainEvent;
use crate::domain::interaction::Interaction;
use crate::domain::message::{LmMessage, ToolCallRequest};
use crate::store::ConversationStore;
use crate::tools::{RiskLevel, Tool, ToolContext, ToolExecutor, ToolRegistry};
use crate::ui_bus::{UiBus, UiEvent};
use std::sync::Arc;
use uuid::Uuid;

/// What the runtime loop should do after one output was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Pause,
    Terminal,
}

/// The result of handling one [`AgentOutput`]: an optional domain event to
/// validate and append, the loop signal, and (for a risky tool call that
/// just ran) notice that the confirmation binding was consumed.
pub struct Outcome {
    pub event: Option<DomainEvent>,
    pub signal: Signal,
    pub confirmation_consumed: bool,
}

impl Outcome {
    fn continue_with(event: Option<DomainEvent>) -> Self {
        Outcome {
            event,
            signal: Signal::Continue,
            confirmation_consumed: false,
        }
    }

    fn pause(event: DomainEvent) -> Self {
        Outcome {
            event: Some(event),
            signal: Signal::Pause,
            confirmation_consumed: false,
        }
    }

    fn terminal(event: DomainEvent) -> Self {
        Outcome {
            event: Some(event),
            signal: Signal::Terminal,
            confirmation_consumed: false,
        }
    }
}

pub struct OutputHandler {
    conversation_store: Arc<ConversationStore>,
    ui_bus: Arc<dyn UiBus>,
    tool_registry: Arc<ToolRegistry>,
    tool_executor: Arc<ToolExecutor>,
}

impl OutputHandler {
    pub fn new(
        conversation_store: Arc<ConversationStore>,
        ui_bus: Arc<dyn UiBus>,
        tool_registry: Arc<ToolRegistry>,
        tool_executor: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            conversation_store,
            ui_bus,
            tool_registry,
            tool_executor,
        }
    }

    /// Handle one `AgentOutput`. `streaming_active` suppresses a redundant
    /// `text`/`reasoning` publish when the streaming handler already
    /// forwarded the same content as deltas.
    pub async fn handle(
        &self,
        task_id: &str,
        author_actor_id: &str,
        output: AgentOutput,
        ctx: &ToolContext,
        streaming_active: bool,
    ) -> Outcome {
        match output {
            AgentOutput::Text { .. } | AgentOutput::Reasoning { .. } => {
                if !streaming_active {
                    self.ui_bus
                        .publish(UiEvent::AgentOutput {
                            task_id: task_id.to_string(),
                            output,
                        })
                        .await;
                }
                Outcome::continue_with(None)
            }
            AgentOutput::Verbose { .. } | AgentOutput::Error { .. } => {
                self.ui_bus
                    .publish(UiEvent::AgentOutput {
                        task_id: task_id.to_string(),
                        output,
                    })
                    .await;
                Outcome::continue_with(None)
            }
            AgentOutput::ToolCall { call } => self.handle_tool_call(task_id, author_actor_id, call, ctx).await,
            AgentOutput::Interaction { interaction } => Outcome::pause(DomainEvent::UserInteractionRequested {
                author_actor_id: author_actor_id.to_string(),
                interaction,
            }),
            AgentOutput::Done { summary } => Outcome::terminal(DomainEvent::TaskCompleted {
                author_actor_id: author_actor_id.to_string(),
                summary,
            }),
            AgentOutput::Failed { reason } => Outcome::terminal(DomainEvent::TaskFailed {
                author_actor_id: author_actor_id.to_string(),
                failure_reason: reason,
            }),
        }
    }

    async fn handle_tool_call(
        &self,
        task_id: &str,
        author_actor_id: &str,
        call: ToolCallRequest,
        ctx: &ToolContext,
    ) -> Outcome {
        let Some(tool) = self.tool_registry.get(&call.tool_name) else {
            self.persist_tool_error(task_id, &call, "Tool execution interrupted (Unknown tool)")
                .await;
            return Outcome::continue_with(None);
        };

        if let Err(msg) = tool.can_execute(&call.arguments, ctx).await {
            self.persist_tool_error(task_id, &call, &msg).await;
            return Outcome::continue_with(None);
        }

        // A risky tool-call runs only after an `approve` response whose
        // confirmation binding names exactly this call id.
        if tool.risk_level(&call.arguments, ctx) == RiskLevel::Risky && !ctx.confirms(&call.tool_call_id) {
            let interaction = Interaction::confirm_risky_tool(Uuid::new_v4().to_string(), &call.tool_name, &call.tool_call_id);
            return Outcome::pause(DomainEvent::UserInteractionRequested {
                author_actor_id: author_actor_id.to_string(),
                interaction,
            });
        }

        self.ui_bus
            .publish(UiEvent::ToolCallStart {
                task_id: task_id.to_string(),
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
            })
            .await;

        let was_risky = tool.risk_level(&call.arguments, ctx) == RiskLevel::Risky;
        let result = self.tool_executor.execute(&call, ctx).await;

        let (content, is_error) = match &result {
            Ok(r) => (r.content.clone(), r.is_error),
            Err(e) => (serde_json::json!({ "error": e.to_string() }), true),
        };

        self.ui_bus
            .publish(UiEvent::ToolCallEnd {
                task_id: task_id.to_string(),
                tool_call_id: call.tool_call_id.clone(),
                is_error,
            })
            .await;

        self.persist_tool_message_if_absent(task_id, &call.tool_call_id, &call.tool_name, &content.to_string())
            .await;

        Outcome {
            event: None,
            signal: Signal::Continue,
            confirmation_consumed: was_risky,
        }
    }

    async fn persist_tool_error(&self, task_id: &str, call: &ToolCallRequest, message: &str) {
        self.persist_tool_message_if_absent(
            task_id,
            &call.tool_call_id,
            &call.tool_name,
            &serde_json::json!({ "isError": true, "error": message }).to_string(),
        )
        .await;
    }

    /// Persist a tool-result message unless one for this `tool_call_id`
    /// already exists — running the handler twice over the same call (e.g.
    /// after a crash mid-persist) must not duplicate the result.
    async fn persist_tool_message_if_absent(&self, task_id: &str, tool_call_id: &str, tool_name: &str, content: &str) {
        let history = self.conversation_store.load(task_id).await;
        if history
            .iter()
            .any(|e| e.message.answered_tool_call_id() == Some(tool_call_id))
        {
            return;
        }
        let _ = self
            .conversation_store
            .append(
                task_id,
                LmMessage::Tool {
                    tool_call_id: tool_call_id.to_string(),
                    tool_name: Some(tool_name.to_string()),
                    content: content.to_string(),
                },
            )
            .await;
    }

    /// The rejection handler: given the rejected interaction's bound
    /// `toolCallId`, invoke the executor's record-rejection entry point and
    /// persist the resulting tool-result message.
    pub async fn handle_rejection(&self, task_id: &str, call: &ToolCallRequest) {
        let result = self.tool_executor.record_rejection(call, task_id).await;
        self.persist_tool_message_if_absent(task_id, &call.tool_call_id, &call.tool_name, &result.content.to_string())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AuditLog;
    use crate::ui_bus::NullUiBus;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct RunCommand;

    #[async_trait]
    impl Tool for RunCommand {
        fn name(&self) -> &str {
            "run_command"
        }
        fn description(&self) -> &str {
            "runs a shell command"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        fn risk_level(&self, _args: &serde_json::Value, _ctx: &ToolContext) -> RiskLevel {
            RiskLevel::Risky
        }
        async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> crate::tools::ToolResult {
            crate::tools::ToolResult::ok(serde_json::json!({"exitCode": 0}))
        }
    }

    async fn handler(dir: &std::path::Path) -> OutputHandler {
        let conversation_store = Arc::new(ConversationStore::open(dir).unwrap());
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(RunCommand));
        let audit = Arc::new(AuditLog::open(dir).unwrap());
        let executor = Arc::new(ToolExecutor::new(registry.clone(), audit));
        OutputHandler::new(conversation_store, Arc::new(NullUiBus), registry, executor)
    }

    #[tokio::test]
    async fn risky_tool_call_without_confirmation_pauses_with_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path()).await;
        let ctx = ToolContext::new("t1", CancellationToken::new());

        let outcome = handler
            .handle(
                "t1",
                "agent-1",
                AgentOutput::ToolCall {
                    call: ToolCallRequest {
                        tool_call_id: "c2".into(),
                        tool_name: "run_command".into(),
                        arguments: serde_json::json!({}),
                    },
                },
                &ctx,
                false,
            )
            .await;

        assert_eq!(outcome.signal, Signal::Pause);
        assert!(matches!(outcome.event, Some(DomainEvent::UserInteractionRequested { .. })));
    }

    #[tokio::test]
    async fn confirmed_risky_tool_executes_and_persists_result() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path()).await;
        let ctx = ToolContext::new("t1", CancellationToken::new()).with_confirmation("i1", "c2");

        let outcome = handler
            .handle(
                "t1",
                "agent-1",
                AgentOutput::ToolCall {
                    call: ToolCallRequest {
                        tool_call_id: "c2".into(),
                        tool_name: "run_command".into(),
                        arguments: serde_json::json!({}),
                    },
                },
                &ctx,
                false,
            )
            .await;

        assert_eq!(outcome.signal, Signal::Continue);
        assert!(outcome.confirmation_consumed);
    }

    #[tokio::test]
    async fn done_produces_terminal_completed_event() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path()).await;
        let ctx = ToolContext::new("t1", CancellationToken::new());
        let outcome = handler
            .handle(
                "t1",
                "agent-1",
                AgentOutput::Done {
                    summary: Some("done".into()),
                },
                &ctx,
                false,
            )
            .await;
        assert_eq!(outcome.signal, Signal::Terminal);
        assert!(matches!(outcome.event, Some(DomainEvent::TaskCompleted { .. })));
    }
}
