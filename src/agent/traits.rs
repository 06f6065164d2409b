//! The `Agent` trait: a strategy that, given a task's repaired conversation,
//! yields a sequence of [`AgentOutput`]s over a bounded channel.
//!
//! Outputs stream over a channel rather than an iterator future: cancellation
//! closes the channel and surfaces at the agent's own suspension points,
//! rather than the consumer polling a `next()` future directly.

use crate::domain::message::{LmMessage, ToolCallRequest};
use crate::store::ConversationStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One unit of output from a running agent loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AgentOutput {
    Text { content: String },
    Reasoning { content: String },
    Verbose { content: String },
    Error { message: String },
    ToolCall { call: ToolCallRequest },
    Interaction { interaction: crate::domain::interaction::Interaction },
    Done { summary: Option<String> },
    Failed { reason: String },
}

/// Everything an `Agent` needs to resume a task: its repaired history plus
/// any confirmation binding carried over from a just-approved interaction.
///
/// `conversation_store` is handed to the agent itself (rather than the
/// Output Handler) because persisting the LM's own assistant turn is part
/// of calling the LM, not part of interpreting one yielded output.
pub struct AgentInput {
    pub task_id: String,
    pub history: Vec<LmMessage>,
    pub confirmed_tool_call_id: Option<String>,
    pub cancellation: CancellationToken,
    pub conversation_store: Arc<ConversationStore>,
}

/// A pluggable strategy producing [`AgentOutput`]s for one task iteration.
///
/// `run` sends outputs on `tx` and returns once the agent has nothing more
/// to yield for this iteration (a suspension point, not necessarily a
/// terminal state) or the cancellation token fires.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, input: AgentInput, tx: mpsc::Sender<AgentOutput>);
}
