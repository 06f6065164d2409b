//! The `Tool` trait and its supporting types — the contract every tool
//! (built-in or host-registered) implements.
//!
//! Adds a per-call risk classification instead of a single fixed flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Whether a tool call needs explicit user confirmation before it runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Risky,
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: serde_json::Value,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: serde_json::Value) -> Self {
        ToolResult {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult {
            content: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// Everything a running tool call needs from its environment: cancellation,
/// the task it runs under, and (for risky tools) the confirmation binding
/// that authorized it.
#[derive(Clone)]
pub struct ToolContext {
    pub task_id: String,
    pub cancellation: CancellationToken,
    /// Set only when the call being executed matches a just-approved
    /// confirmation (the `{interactionId, toolCallId}` pairing).
    pub confirmed_interaction_id: Option<String>,
    pub confirmed_tool_call_id: Option<String>,
}

impl ToolContext {
    pub fn new(task_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        ToolContext {
            task_id: task_id.into(),
            cancellation,
            confirmed_interaction_id: None,
            confirmed_tool_call_id: None,
        }
    }

    pub fn with_confirmation(mut self, interaction_id: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        self.confirmed_interaction_id = Some(interaction_id.into());
        self.confirmed_tool_call_id = Some(tool_call_id.into());
        self
    }

    /// `true` iff a confirmation is bound and it names exactly `tool_call_id`.
    pub fn confirms(&self, tool_call_id: &str) -> bool {
        self.confirmed_tool_call_id.as_deref() == Some(tool_call_id)
    }
}

/// A callable capability the agent can invoke, with JSON-schema parameters
/// and a per-call risk classification.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema describing accepted arguments.
    fn parameters(&self) -> serde_json::Value;
    /// Logical grouping for registry listing/UI display (e.g. "filesystem").
    fn group(&self) -> &str {
        "general"
    }

    /// Classify the risk of one call given its arguments and context. Most
    /// tools are unconditionally safe or risky; a few (e.g. a shell runner
    /// restricted to an allow-list) vary by argument.
    fn risk_level(&self, args: &serde_json::Value, ctx: &ToolContext) -> RiskLevel;

    /// Optional pre-flight validation distinct from risk classification
    /// (e.g. malformed arguments, missing file). Default accepts everything.
    async fn can_execute(&self, _args: &serde_json::Value, _ctx: &ToolContext) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult;
}

impl fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

pub type ArcTool = Arc<dyn Tool>;
