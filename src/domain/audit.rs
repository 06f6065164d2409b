//! Tool-call audit log entries — a separate stream from domain events
//!.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit entry: a tool call was requested, or one completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AuditEntry {
    ToolCallRequested {
        tool_call_id: String,
        tool_name: String,
        task_id: String,
        input: serde_json::Value,
    },
    ToolCallCompleted {
        tool_call_id: String,
        tool_name: String,
        task_id: String,
        output: serde_json::Value,
        is_error: bool,
        duration_ms: u64,
    },
}

impl AuditEntry {
    pub fn tool_call_id(&self) -> &str {
        match self {
            AuditEntry::ToolCallRequested { tool_call_id, .. }
            | AuditEntry::ToolCallCompleted { tool_call_id, .. } => tool_call_id,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            AuditEntry::ToolCallRequested { task_id, .. }
            | AuditEntry::ToolCallCompleted { task_id, .. } => task_id,
        }
    }
}

/// An [`AuditEntry`] as persisted: adds a wall-clock timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub entry: AuditEntry,
}
