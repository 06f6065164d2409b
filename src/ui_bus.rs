//! The UI Bus: fire-and-forget publication of UI-facing events. An external
//! collaborator — the core only depends on this trait, never a concrete
//! transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One event published to the UI bus, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum UiEvent {
    AgentOutput {
        task_id: String,
        output: crate::agent::AgentOutput,
    },
    StreamDelta {
        task_id: String,
        delta: String,
        is_reasoning: bool,
    },
    StreamEnd {
        task_id: String,
    },
    ToolCallStart {
        task_id: String,
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallEnd {
        task_id: String,
        tool_call_id: String,
        is_error: bool,
    },
    AuditEntry {
        task_id: String,
        entry: crate::domain::AuditEntry,
    },
}

/// Fire-and-forget publication sink for UI-facing events. Implementations
/// (a WebSocket fan-out, a TUI channel, a test recorder) must never block
/// the caller for long or propagate backpressure into the runtime loop.
#[async_trait]
pub trait UiBus: Send + Sync {
    async fn publish(&self, event: UiEvent);
}

/// A `UiBus` that drops every event — useful for headless operation or as
/// a `Default` when no transport is attached.
pub struct NullUiBus;

#[async_trait]
impl UiBus for NullUiBus {
    async fn publish(&self, _event: UiEvent) {}
}
