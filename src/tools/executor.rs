//! The Tool Executor: confirmation-gated tool invocation with an
//! audit-log entry on both ends of every call.

use crate::domain::audit::AuditEntry;
use crate::domain::message::ToolCallRequest;
use crate::error::ToolExecutionError;
use crate::store::AuditLog;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{RiskLevel, ToolContext, ToolResult};
use std::sync::Arc;
use std::time::Instant;

/// Runs [`Tool`](crate::tools::Tool) invocations on behalf of the Agent
/// Runtime, enforcing the confirmation gate for risky tools and keeping the
/// audit log consistent.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    audit_log: Arc<AuditLog>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, audit_log: Arc<AuditLog>) -> Self {
        Self { registry, audit_log }
    }

    /// Execute one tool call, appending the request/completion audit pair.
    ///
    /// A risky tool whose call id doesn't match `ctx`'s confirmation binding
    /// fails with [`ToolExecutionError::ConfirmationRequired`] before the
    /// tool itself ever runs — the audit log still records the request, so
    /// the requirement shows up in the trail even when rejected.
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolExecutionError> {
        let tool = self
            .registry
            .get(&call.tool_name)
            .ok_or_else(|| ToolExecutionError::NotFound(call.tool_name.clone()))?;

        self.audit_log
            .append(AuditEntry::ToolCallRequested {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                task_id: ctx.task_id.clone(),
                input: call.arguments.clone(),
            })
            .await
            .map_err(|e| ToolExecutionError::ExecutionFailed(e.to_string()))?;

        if tool.risk_level(&call.arguments, ctx) == RiskLevel::Risky && !ctx.confirms(&call.tool_call_id) {
            return Err(ToolExecutionError::ConfirmationRequired {
                tool_call_id: call.tool_call_id.clone(),
            });
        }

        if let Err(msg) = tool.can_execute(&call.arguments, ctx).await {
            return Err(ToolExecutionError::PrecheckFailed(msg));
        }

        let started = Instant::now();
        let result = tool.execute(call.arguments.clone(), ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.audit_log
            .append(AuditEntry::ToolCallCompleted {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                task_id: ctx.task_id.clone(),
                output: result.content.clone(),
                is_error: result.is_error,
                duration_ms,
            })
            .await
            .map_err(|e| ToolExecutionError::ExecutionFailed(e.to_string()))?;

        Ok(result)
    }

    /// Record that the user rejected a pending risky-tool confirmation:
    /// appends both the request and a synthetic rejection completion so
    /// live observers see the pair, and returns the rejection result for
    /// the caller to persist as a conversation message.
    pub async fn record_rejection(&self, call: &ToolCallRequest, task_id: &str) -> ToolResult {
        let _ = self
            .audit_log
            .append(AuditEntry::ToolCallRequested {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                task_id: task_id.to_string(),
                input: call.arguments.clone(),
            })
            .await;

        let result = ToolResult::error("User rejected the request");

        let _ = self
            .audit_log
            .append(AuditEntry::ToolCallCompleted {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                task_id: task_id.to_string(),
                output: result.content.clone(),
                is_error: true,
                duration_ms: 0,
            })
            .await;

        result
    }
}
