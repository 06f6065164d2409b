//! LM conversation messages.
//!
//! A richer tagged-by-role shape than a flat struct with a role field: a
//! `tool` message carries a `toolCallId`, an `assistant` message carries
//! optional `reasoning` and `toolCalls`.

use serde::{Deserialize, Serialize};

/// One tool call requested by the LM inside an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// A single turn in a task's conversation with its LM, tagged by role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", content = "content")]
pub enum LmMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        reasoning: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        tool_name: Option<String>,
        content: String,
    },
}

impl LmMessage {
    /// The bare role tag, ignoring payload — used by repair/safe-to-inject
    /// logic which only cares about role sequencing.
    pub fn role(&self) -> Role {
        match self {
            LmMessage::System { .. } => Role::System,
            LmMessage::User { .. } => Role::User,
            LmMessage::Assistant { .. } => Role::Assistant,
            LmMessage::Tool { .. } => Role::Tool,
        }
    }

    /// Tool call ids this message answers (non-empty only for `tool` messages).
    pub fn answered_tool_call_id(&self) -> Option<&str> {
        match self {
            LmMessage::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Tool call ids this message requests (non-empty only for `assistant`
    /// messages that made tool calls).
    pub fn requested_tool_call_ids(&self) -> Vec<&str> {
        match self {
            LmMessage::Assistant { tool_calls, .. } => {
                tool_calls.iter().map(|tc| tc.tool_call_id.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Convenience constructor for a `tool` message carrying a JSON error
    /// payload, matching the shape §4.3's S2 strategy and §4.4's rejection
    /// handler both produce.
    pub fn tool_error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        LmMessage::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: None,
            content: serde_json::json!({ "isError": true, "error": error.into() }).to_string(),
        }
    }
}

/// Bare role discriminant, independent of payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// An `LmMessage` as persisted in the Conversation Store: adds the per-task
/// `index` requires for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub task_id: String,
    pub index: u64,
    pub message: LmMessage,
}
