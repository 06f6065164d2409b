//! The Subtask Tool: `createSubtasks`, spawning child tasks under a
//! top-level caller and aggregating their terminal outcomes.

use crate::domain::event::DomainEvent;
use crate::domain::task::{Priority, TaskStatus};
use crate::error::SubtaskError;
use crate::store::EventStore;
use crate::task_service::TaskService;
use crate::tools::tool::{RiskLevel, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SubtaskRequest {
    pub agent_id: String,
    pub title: String,
    pub intent: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChildStatus {
    Success,
    Error,
    Cancel,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildOutcome {
    pub task_id: String,
    pub title: String,
    pub status: ChildStatus,
    pub failure_reason: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtaskSummary {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub cancel: usize,
    pub tasks: Vec<ChildOutcome>,
}

/// Spawns child tasks, waits for each to reach a terminal state in
/// parallel, and returns a structured summary. Callable only from a
/// top-level task (one with no `parentTaskId`).
pub struct CreateSubtasksTool {
    task_service: Arc<TaskService>,
    event_store: Arc<EventStore>,
    known_agent_ids: HashSet<String>,
    timeout: Duration,
}

impl CreateSubtasksTool {
    pub fn new(task_service: Arc<TaskService>, event_store: Arc<EventStore>, known_agent_ids: HashSet<String>, timeout: Duration) -> Self {
        Self {
            task_service,
            event_store,
            known_agent_ids,
            timeout,
        }
    }

    pub async fn create_subtasks(&self, caller_task_id: &str, requests: Vec<SubtaskRequest>) -> Result<SubtaskSummary, SubtaskError> {
        if requests.is_empty() {
            return Err(SubtaskError::EmptyRequest);
        }

        let caller = self
            .task_service
            .get_task(caller_task_id)
            .await
            .map_err(|_| SubtaskError::NotTopLevel(caller_task_id.to_string()))?;
        if !caller.is_top_level() {
            return Err(SubtaskError::NotTopLevel(caller_task_id.to_string()));
        }

        for req in &requests {
            if !self.known_agent_ids.contains(&req.agent_id) {
                return Err(SubtaskError::UnknownAgent(req.agent_id.clone()));
            }
        }

        let mut children = Vec::with_capacity(requests.len());
        for req in &requests {
            let child = self
                .task_service
                .create_task(
                    &caller.agent_id,
                    &req.title,
                    req.intent.clone(),
                    req.priority.unwrap_or(Priority::Normal),
                    &req.agent_id,
                    Some(caller_task_id.to_string()),
                )
                .await
                .map_err(|e| SubtaskError::UnknownAgent(e.to_string()))?;
            children.push(child);
        }

        let waits = children.iter().map(|child| self.wait_for_terminal(child.task_id.clone(), child.title.clone()));
        let outcomes = futures_util::future::join_all(waits).await;

        let total = outcomes.len();
        let success = outcomes.iter().filter(|o| o.status == ChildStatus::Success).count();
        let error = outcomes.iter().filter(|o| o.status == ChildStatus::Error).count();
        let cancel = outcomes.iter().filter(|o| o.status == ChildStatus::Cancel).count();

        Ok(SubtaskSummary {
            total,
            success,
            error,
            cancel,
            tasks: outcomes,
        })
    }

    /// Subscribe, then perform a catch-up read to close the race against a
    /// child that reached a terminal state before the subscription filter
    /// applied; whichever observes the terminal event first wins.
    async fn wait_for_terminal(&self, child_task_id: String, title: String) -> ChildOutcome {
        let mut rx = self.event_store.subscribe();

        if let Some(outcome) = self.terminal_outcome_from_stream(&child_task_id, &title).await {
            return outcome;
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    let _ = self.task_service.cancel_task(&child_task_id, "system", Some("Parent task timed out".to_string())).await;
                    return ChildOutcome {
                        task_id: child_task_id,
                        title,
                        status: ChildStatus::Error,
                        failure_reason: Some("Subtask wait timed out".to_string()),
                        summary: None,
                    };
                }
                event = rx.recv() => {
                    match event {
                        Ok(stored) if stored.stream_id == child_task_id => {
                            if let Some(outcome) = self.outcome_for_event(&child_task_id, &title, &stored.event) {
                                return outcome;
                            }
                        }
                        Ok(_) => continue,
                        Err(_) => {
                            // Lagged or closed: fall back to a direct read.
                            if let Some(outcome) = self.terminal_outcome_from_stream(&child_task_id, &title).await {
                                return outcome;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn terminal_outcome_from_stream(&self, child_task_id: &str, title: &str) -> Option<ChildOutcome> {
        let events = self.event_store.read_stream(child_task_id, None).await;
        for stored in events.iter().rev() {
            if let Some(outcome) = self.outcome_for_event(child_task_id, title, &stored.event) {
                return Some(outcome);
            }
        }
        None
    }

    fn outcome_for_event(&self, child_task_id: &str, title: &str, event: &DomainEvent) -> Option<ChildOutcome> {
        match event {
            DomainEvent::TaskCompleted { summary, .. } => Some(ChildOutcome {
                task_id: child_task_id.to_string(),
                title: title.to_string(),
                status: ChildStatus::Success,
                failure_reason: None,
                summary: summary.clone(),
            }),
            DomainEvent::TaskFailed { failure_reason, .. } => Some(ChildOutcome {
                task_id: child_task_id.to_string(),
                title: title.to_string(),
                status: ChildStatus::Error,
                failure_reason: Some(failure_reason.clone()),
                summary: None,
            }),
            DomainEvent::TaskCanceled { reason, .. } => Some(ChildOutcome {
                task_id: child_task_id.to_string(),
                title: title.to_string(),
                status: ChildStatus::Cancel,
                failure_reason: reason.clone(),
                summary: None,
            }),
            _ => None,
        }
    }

    /// Cascade-cancel any non-terminal child of `parent_task_id` — called
    /// when the parent itself is canceled (not on pause; a paused parent
    /// leaves its children running).
    pub async fn cascade_cancel_children(&self, parent_task_id: &str) {
        let parent = match self.task_service.get_task(parent_task_id).await {
            Ok(parent) => parent,
            Err(err) => {
                log::warn!("cascade-cancel skipped for parent {parent_task_id}: failed to load task: {err}");
                return;
            }
        };
        for child_id in &parent.child_task_ids {
            match self.task_service.get_task(child_id).await {
                Ok(child) => {
                    if !child.status.is_terminal() && child.status != TaskStatus::Canceled {
                        if let Err(err) = self
                            .task_service
                            .cancel_task(child_id, "system", Some("Parent task canceled".to_string()))
                            .await
                        {
                            log::warn!("cascade-cancel failed to cancel child {child_id} of parent {parent_task_id}: {err}");
                        }
                    }
                }
                Err(err) => {
                    log::warn!("cascade-cancel skipped child {child_id} of parent {parent_task_id}: failed to load task: {err}");
                }
            }
        }
    }
}

#[async_trait]
impl Tool for CreateSubtasksTool {
    fn name(&self) -> &str {
        "create_subtasks"
    }

    fn description(&self) -> &str {
        "Spawn one or more child tasks under separate agents and wait for all of them to finish."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "children": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "agentId": { "type": "string" },
                            "title": { "type": "string" },
                            "intent": { "type": "string" },
                            "priority": { "type": "string", "enum": ["foreground", "normal", "background"] }
                        },
                        "required": ["agentId", "title"]
                    },
                    "minItems": 1
                }
            },
            "required": ["children"]
        })
    }

    fn group(&self) -> &str {
        "orchestration"
    }

    fn risk_level(&self, _args: &serde_json::Value, _ctx: &ToolContext) -> RiskLevel {
        RiskLevel::Safe
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult {
        let requests: Vec<SubtaskRequest> = match args.get("children").cloned() {
            Some(value) => match serde_json::from_value(value) {
                Ok(reqs) => reqs,
                Err(e) => return ToolResult::error(format!("invalid children: {}", e)),
            },
            None => return ToolResult::error("missing required field: children"),
        };

        match self.create_subtasks(&ctx.task_id, requests).await {
            Ok(summary) => ToolResult::ok(serde_json::json!({ "summary": summary })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
