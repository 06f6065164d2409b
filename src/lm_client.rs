//! The LM Client: an external collaborator. The core depends only on this
//! trait; concrete providers (OpenAI-compatible, Anthropic, local) live
//! outside the runtime crate.

use crate::domain::message::{LmMessage, ToolCallRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Why the LM stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Error,
}

/// One complete LM turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmResponse {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    pub stop_reason: StopReason,
}

/// One incremental piece of a streamed LM turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StreamChunk {
    TextDelta { content: String },
    ReasoningDelta { content: String },
    ToolCall { call: ToolCallRequest },
    End { stop_reason: StopReason },
}

/// A tool's advertised shape, as handed to the LM for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Completes or streams one LM turn given a named model profile, the
/// conversation so far, and the tools currently available.
#[async_trait]
pub trait LmClient: Send + Sync {
    async fn complete(
        &self,
        profile: &str,
        messages: &[LmMessage],
        tools: &[ToolSpec],
        max_tokens: Option<u32>,
    ) -> Result<LmResponse, String>;

    /// Stream a turn, invoking `on_chunk` for each delta as it arrives and
    /// returning the same aggregate response `complete` would.
    async fn stream(
        &self,
        profile: &str,
        messages: &[LmMessage],
        tools: &[ToolSpec],
        max_tokens: Option<u32>,
        on_chunk: &(dyn Fn(StreamChunk) + Send + Sync),
    ) -> Result<LmResponse, String>;
}
