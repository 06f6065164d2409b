//! History repair: make a task's persisted conversation safe to hand
//! to an LM again after a crash, by resolving every assistant tool call
//! that has no matching tool-result message.

use crate::domain::audit::AuditEntry;
use crate::domain::message::{LmMessage, Role};
use crate::store::AuditLog;
use crate::tools::{RiskLevel, Tool, ToolContext, ToolExecutor};
use std::collections::HashSet;
use std::sync::Arc;

/// `true` iff a new `user` message can be appended to `history` right now
/// without breaking tool-call/result pairing: either the last non-tool role
/// is `user`, or the last `assistant` message has every one of its tool
/// calls already answered by a `tool` message.
pub fn is_safe_to_inject(history: &[LmMessage]) -> bool {
    let last_assistant = history.iter().rev().find(|m| {
        matches!(
            m.role(),
            Role::Assistant | Role::User
        )
    });
    let Some(last) = last_assistant else {
        return true;
    };
    match last.role() {
        Role::User => true,
        Role::Assistant => {
            let requested = last.requested_tool_call_ids();
            if requested.is_empty() {
                return true;
            }
            let answered: HashSet<&str> = history
                .iter()
                .filter_map(|m| m.answered_tool_call_id())
                .collect();
            requested.iter().all(|id| answered.contains(id))
        }
        _ => unreachable!(),
    }
}

/// Run the four repair strategies over `history`, returning the messages to
/// append (in order) to make it safe again. Empty if nothing was dangling.
///
/// Repair is idempotent: a history with no outstanding tool calls (or one
/// already repaired) yields no additional messages.
pub async fn repair(
    history: &[LmMessage],
    task_id: &str,
    audit_log: &AuditLog,
    executor: &ToolExecutor,
    tool_lookup: impl Fn(&str) -> Option<(bool, RiskLevel)>,
    cancellation: tokio_util::sync::CancellationToken,
) -> Vec<LmMessage> {
    let answered: HashSet<&str> = history
        .iter()
        .filter_map(|m| m.answered_tool_call_id())
        .collect();

    let mut outstanding = Vec::new();
    for message in history {
        if let LmMessage::Assistant { tool_calls, .. } = message {
            for call in tool_calls {
                if !answered.contains(call.tool_call_id.as_str()) {
                    outstanding.push(call.clone());
                }
            }
        }
    }

    let mut injected = Vec::new();
    for call in outstanding {
        // S1 — Recover from Audit Log.
        if let Some(entry) = audit_log.find_by_tool_call_id(&call.tool_call_id).await {
            if let AuditEntry::ToolCallCompleted { output, .. } = entry.entry {
                injected.push(LmMessage::Tool {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: Some(call.tool_name.clone()),
                    content: output.to_string(),
                });
                continue;
            }
        }

        match tool_lookup(&call.tool_name) {
            // S2 — Unknown tool.
            None => {
                injected.push(LmMessage::tool_error(
                    call.tool_call_id.clone(),
                    "Tool execution interrupted (Unknown tool)",
                ));
            }
            // S3 — Safe tool: re-execute.
            Some((_, RiskLevel::Safe)) => {
                let ctx = ToolContext::new(task_id, cancellation.clone());
                match executor.execute(&call, &ctx).await {
                    Ok(result) => injected.push(LmMessage::Tool {
                        tool_call_id: call.tool_call_id.clone(),
                        tool_name: Some(call.tool_name.clone()),
                        content: result.content.to_string(),
                    }),
                    Err(e) => injected.push(LmMessage::tool_error(call.tool_call_id.clone(), e.to_string())),
                }
            }
            // S4 — Risky tool: leave dangling; the agent re-requests
            // confirmation on its next iteration.
            Some((_, RiskLevel::Risky)) => {}
        }
    }

    injected
}

/// Build a `(is_registered, risk_level)` lookup closure from a tool registry
/// and a fixed context, matching the shape [`repair`] expects.
pub fn lookup_from_registry<'a>(
    registry: &'a crate::tools::ToolRegistry,
    sample_args: &'a serde_json::Value,
    ctx: &'a ToolContext,
) -> impl Fn(&str) -> Option<(bool, RiskLevel)> + 'a {
    move |name: &str| {
        registry
            .get(name)
            .map(|tool| (true, tool.risk_level(sample_args, ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::ToolCallRequest;

    fn assistant_with_calls(calls: Vec<ToolCallRequest>) -> LmMessage {
        LmMessage::Assistant {
            content: None,
            reasoning: None,
            tool_calls: calls,
        }
    }

    #[test]
    fn safe_when_last_message_is_user() {
        let history = vec![LmMessage::User { content: "hi".into() }];
        assert!(is_safe_to_inject(&history));
    }

    #[test]
    fn unsafe_when_tool_call_unanswered() {
        let history = vec![assistant_with_calls(vec![ToolCallRequest {
            tool_call_id: "c1".into(),
            tool_name: "readFile".into(),
            arguments: serde_json::json!({}),
        }])];
        assert!(!is_safe_to_inject(&history));
    }

    #[test]
    fn safe_once_tool_call_answered() {
        let history = vec![
            assistant_with_calls(vec![ToolCallRequest {
                tool_call_id: "c1".into(),
                tool_name: "readFile".into(),
                arguments: serde_json::json!({}),
            }]),
            LmMessage::Tool {
                tool_call_id: "c1".into(),
                tool_name: Some("readFile".into()),
                content: "hi".into(),
            },
        ];
        assert!(is_safe_to_inject(&history));
    }

    #[tokio::test]
    async fn s1_recovers_completed_tool_result_from_audit_log() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        audit
            .append(AuditEntry::ToolCallCompleted {
                tool_call_id: "c3".into(),
                tool_name: "readFile".into(),
                task_id: "t1".into(),
                output: serde_json::json!({"ok": true}),
                is_error: false,
                duration_ms: 2,
            })
            .await
            .unwrap();

        let registry = Arc::new(crate::tools::ToolRegistry::new());
        let executor = ToolExecutor::new(registry, Arc::new(AuditLog::open(dir.path()).unwrap()));

        let history = vec![assistant_with_calls(vec![ToolCallRequest {
            tool_call_id: "c3".into(),
            tool_name: "readFile".into(),
            arguments: serde_json::json!({}),
        }])];

        let injected = repair(
            &history,
            "t1",
            &audit,
            &executor,
            |_| None,
            tokio_util::sync::CancellationToken::new(),
        )
        .await;

        assert_eq!(injected.len(), 1);
        match &injected[0] {
            LmMessage::Tool { tool_call_id, content, .. } => {
                assert_eq!(tool_call_id, "c3");
                assert!(content.contains("\"ok\":true"));
            }
            other => panic!("expected tool message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn s2_synthesizes_error_for_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        let registry = Arc::new(crate::tools::ToolRegistry::new());
        let executor = ToolExecutor::new(registry, Arc::new(AuditLog::open(dir.path()).unwrap()));

        let history = vec![assistant_with_calls(vec![ToolCallRequest {
            tool_call_id: "c9".into(),
            tool_name: "longGoneTool".into(),
            arguments: serde_json::json!({}),
        }])];

        let injected = repair(
            &history,
            "t1",
            &audit,
            &executor,
            |_| None,
            tokio_util::sync::CancellationToken::new(),
        )
        .await;

        assert_eq!(injected.len(), 1);
        match &injected[0] {
            LmMessage::Tool { content, .. } => assert!(content.contains("Unknown tool")),
            other => panic!("expected tool message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn s4_leaves_risky_tool_dangling() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        let registry = Arc::new(crate::tools::ToolRegistry::new());
        let executor = ToolExecutor::new(registry, Arc::new(AuditLog::open(dir.path()).unwrap()));

        let history = vec![assistant_with_calls(vec![ToolCallRequest {
            tool_call_id: "c2".into(),
            tool_name: "runCommand".into(),
            arguments: serde_json::json!({}),
        }])];

        let injected = repair(
            &history,
            "t1",
            &audit,
            &executor,
            |_| Some((true, RiskLevel::Risky)),
            tokio_util::sync::CancellationToken::new(),
        )
        .await;

        assert!(injected.is_empty());
    }

    #[tokio::test]
    async fn repair_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        let registry = Arc::new(crate::tools::ToolRegistry::new());
        let executor = ToolExecutor::new(registry, Arc::new(AuditLog::open(dir.path()).unwrap()));

        let history = vec![assistant_with_calls(vec![ToolCallRequest {
            tool_call_id: "c9".into(),
            tool_name: "longGoneTool".into(),
            arguments: serde_json::json!({}),
        }])];

        let first = repair(
            &history,
            "t1",
            &audit,
            &executor,
            |_| None,
            tokio_util::sync::CancellationToken::new(),
        )
        .await;

        let mut repaired_history = history.clone();
        repaired_history.extend(first.clone());

        let second = repair(
            &repaired_history,
            "t1",
            &audit,
            &executor,
            |_| None,
            tokio_util::sync::CancellationToken::new(),
        )
        .await;

        assert!(second.is_empty());
    }
}
