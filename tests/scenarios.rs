//! End-to-end scenarios covering the full task lifecycle: the happy-path
//! tool loop, risky-tool confirmation (approve and reject), crash recovery
//! via the audit log, instruction queuing mid-execution, and parallel
//! subtasks with one failure.

use agentrt::agent::{Agent, AgentInput, AgentOutput, AgentRuntime, OutputHandler};
use agentrt::domain::message::{LmMessage, ToolCallRequest};
use agentrt::domain::task::{Priority, TaskStatus};
use agentrt::domain::InteractionOption;
use agentrt::domain::interaction::InteractionResponse;
use agentrt::store::{AuditLog, ConversationStore, EventStore};
use agentrt::task_service::TaskService;
use agentrt::tools::{RiskLevel, Tool, ToolContext, ToolExecutor, ToolRegistry, ToolResult};
use agentrt::ui_bus::NullUiBus;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Plays back a fixed sequence of turns: each call to `run` pops the next
/// turn, persists its assistant message (mirroring a real agent's own LM
/// call and history persistence), then yields its scripted outputs.
struct ScriptedAgent {
    turns: Mutex<Vec<(LmMessage, Vec<AgentOutput>)>>,
    call_count: AtomicUsize,
}

impl ScriptedAgent {
    fn new(turns: Vec<(LmMessage, Vec<AgentOutput>)>) -> Self {
        Self {
            turns: Mutex::new(turns),
            call_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn run(&self, input: AgentInput, tx: mpsc::Sender<AgentOutput>) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let mut turns = self.turns.lock().await;
        if turns.is_empty() {
            return;
        }
        let (assistant_message, outputs) = turns.remove(0);
        let _ = input.conversation_store.append(&input.task_id, assistant_message).await;
        for output in outputs {
            if tx.send(output).await.is_err() {
                return;
            }
        }
    }
}

struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "readFile"
    }
    fn description(&self) -> &str {
        "reads a file"
    }
    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({})
    }
    fn risk_level(&self, _args: &serde_json::Value, _ctx: &ToolContext) -> RiskLevel {
        RiskLevel::Safe
    }
    async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::ok(serde_json::json!({ "content": "hi" }))
    }
}

struct RunCommand;

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "runCommand"
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
    async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::ok(serde_json::json!({ "exitCode": 0 }))
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    event_store: Arc<EventStore>,
    conversation_store: Arc<ConversationStore>,
    audit_log: Arc<AuditLog>,
    tool_registry: Arc<ToolRegistry>,
    tool_executor: Arc<ToolExecutor>,
    task_service: Arc<TaskService>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let event_store = Arc::new(EventStore::open(dir.path(), 64).unwrap());
        let conversation_store = Arc::new(ConversationStore::open(dir.path()).unwrap());
        let audit_log = Arc::new(AuditLog::open(dir.path()).unwrap());
        let tool_registry = Arc::new(ToolRegistry::new());
        tool_registry.register(Arc::new(ReadFile));
        tool_registry.register(Arc::new(RunCommand));
        let tool_executor = Arc::new(ToolExecutor::new(tool_registry.clone(), audit_log.clone()));
        let task_service = Arc::new(TaskService::new(event_store.clone()));
        Self {
            _dir: dir,
            event_store,
            conversation_store,
            audit_log,
            tool_registry,
            tool_executor,
            task_service,
        }
    }

    fn runtime(&self, task_id: &str, agent: Arc<dyn Agent>) -> AgentRuntime {
        let output_handler = Arc::new(OutputHandler::new(
            self.conversation_store.clone(),
            Arc::new(NullUiBus),
            self.tool_registry.clone(),
            self.tool_executor.clone(),
        ));
        AgentRuntime::new(
            task_id.to_string(),
            "agent-1".to_string(),
            agent,
            self.event_store.clone(),
            self.conversation_store.clone(),
            self.audit_log.clone(),
            output_handler,
            self.tool_registry.clone(),
            self.tool_executor.clone(),
            32,
        )
    }
}

#[tokio::test]
async fn scenario_1_happy_path_tool_loop() {
    let h = Harness::new();
    let task = h
        .task_service
        .create_task("user", "read a.txt", None, Priority::Normal, "agent-1", None)
        .await
        .unwrap();
    h.task_service.start_task(&task.task_id, "agent-1").await.unwrap();

    let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new(vec![
        (
            LmMessage::Assistant {
                content: None,
                reasoning: None,
                tool_calls: vec![ToolCallRequest {
                    tool_call_id: "c1".to_string(),
                    tool_name: "readFile".to_string(),
                    arguments: serde_json::json!({ "path": "a.txt" }),
                }],
            },
            vec![AgentOutput::ToolCall {
                call: ToolCallRequest {
                    tool_call_id: "c1".to_string(),
                    tool_name: "readFile".to_string(),
                    arguments: serde_json::json!({ "path": "a.txt" }),
                },
            }],
        ),
        (
            LmMessage::Assistant {
                content: Some("done".to_string()),
                reasoning: None,
                tool_calls: vec![],
            },
            vec![AgentOutput::Done { summary: Some("done".to_string()) }],
        ),
    ]));

    let runtime = h.runtime(&task.task_id, agent);
    runtime.execute().await.unwrap();
    // One more iteration drains the second scripted turn.
    runtime.execute().await.unwrap();

    let final_task = h.task_service.get_task(&task.task_id).await.unwrap();
    assert_eq!(final_task.status, TaskStatus::Done);

    let events = h.event_store.read_stream(&task.task_id, None).await;
    let kinds: Vec<&str> = events.iter().map(|e| e.event.kind()).collect();
    assert_eq!(kinds, vec!["TaskCreated", "TaskStarted", "TaskCompleted"]);

    let history = h.conversation_store.load(&task.task_id).await;
    match history.last().unwrap().message.clone() {
        LmMessage::Assistant { content, .. } => assert_eq!(content, Some("done".to_string())),
        other => panic!("expected final assistant message, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_2_risky_tool_approve() {
    let h = Harness::new();
    let task = h
        .task_service
        .create_task("user", "run ls", None, Priority::Normal, "agent-1", None)
        .await
        .unwrap();
    h.task_service.start_task(&task.task_id, "agent-1").await.unwrap();

    let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new(vec![
        (
            LmMessage::Assistant {
                content: None,
                reasoning: None,
                tool_calls: vec![ToolCallRequest {
                    tool_call_id: "c2".to_string(),
                    tool_name: "runCommand".to_string(),
                    arguments: serde_json::json!({ "cmd": "ls" }),
                }],
            },
            vec![AgentOutput::ToolCall {
                call: ToolCallRequest {
                    tool_call_id: "c2".to_string(),
                    tool_name: "runCommand".to_string(),
                    arguments: serde_json::json!({ "cmd": "ls" }),
                },
            }],
        ),
        (
            LmMessage::Assistant {
                content: Some("done".to_string()),
                reasoning: None,
                tool_calls: vec![],
            },
            vec![AgentOutput::Done { summary: Some("done".to_string()) }],
        ),
    ]));

    let runtime = h.runtime(&task.task_id, agent);
    runtime.execute().await.unwrap();

    let after_pause = h.task_service.get_task(&task.task_id).await.unwrap();
    assert_eq!(after_pause.status, TaskStatus::AwaitingUser);
    let interaction_id = after_pause.pending_interaction_id.clone().unwrap();

    let response = InteractionResponse {
        interaction_id,
        selected_option_id: Some("approve".to_string()),
        input_value: None,
        comment: None,
    };
    runtime.resume(response).await.unwrap();

    let final_task = h.task_service.get_task(&task.task_id).await.unwrap();
    assert_eq!(final_task.status, TaskStatus::Done);

    let history = h.conversation_store.load(&task.task_id).await;
    assert!(history.iter().any(|e| matches!(
        &e.message,
        LmMessage::Tool { tool_call_id, .. } if tool_call_id == "c2"
    )));
}

#[tokio::test]
async fn scenario_3_risky_tool_reject() {
    let h = Harness::new();
    let task = h
        .task_service
        .create_task("user", "run ls", None, Priority::Normal, "agent-1", None)
        .await
        .unwrap();
    h.task_service.start_task(&task.task_id, "agent-1").await.unwrap();

    let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new(vec![(
        LmMessage::Assistant {
            content: None,
            reasoning: None,
            tool_calls: vec![ToolCallRequest {
                tool_call_id: "c2".to_string(),
                tool_name: "runCommand".to_string(),
                arguments: serde_json::json!({ "cmd": "rm -rf /" }),
            }],
        },
        vec![AgentOutput::ToolCall {
            call: ToolCallRequest {
                tool_call_id: "c2".to_string(),
                tool_name: "runCommand".to_string(),
                arguments: serde_json::json!({ "cmd": "rm -rf /" }),
            },
        }],
    )]));

    let runtime = h.runtime(&task.task_id, agent);
    runtime.execute().await.unwrap();

    let after_pause = h.task_service.get_task(&task.task_id).await.unwrap();
    let interaction_id = after_pause.pending_interaction_id.clone().unwrap();

    runtime
        .resume(InteractionResponse {
            interaction_id,
            selected_option_id: Some("reject".to_string()),
            input_value: None,
            comment: None,
        })
        .await
        .unwrap();

    let history = h.conversation_store.load(&task.task_id).await;
    let rejection = history
        .iter()
        .find_map(|e| match &e.message {
            LmMessage::Tool { tool_call_id, content, .. } if tool_call_id == "c2" => Some(content.clone()),
            _ => None,
        })
        .expect("rejection tool-result message");
    assert!(rejection.contains("User rejected"));
}

#[tokio::test]
async fn scenario_4_crash_recovery_via_audit_log() {
    let h = Harness::new();
    let task = h
        .task_service
        .create_task("user", "read a.txt", None, Priority::Normal, "agent-1", None)
        .await
        .unwrap();
    h.task_service.start_task(&task.task_id, "agent-1").await.unwrap();

    // Simulate a crash: the assistant's tool-call message was persisted but
    // the tool-result never was, though the tool actually completed (its
    // outcome lives only in the audit log).
    h.conversation_store
        .append(
            &task.task_id,
            LmMessage::Assistant {
                content: None,
                reasoning: None,
                tool_calls: vec![ToolCallRequest {
                    tool_call_id: "c3".to_string(),
                    tool_name: "readFile".to_string(),
                    arguments: serde_json::json!({ "path": "a.txt" }),
                }],
            },
        )
        .await
        .unwrap();
    h.audit_log
        .append(agentrt::domain::AuditEntry::ToolCallCompleted {
            tool_call_id: "c3".to_string(),
            tool_name: "readFile".to_string(),
            task_id: task.task_id.clone(),
            output: serde_json::json!({ "ok": true }),
            is_error: false,
            duration_ms: 1,
        })
        .await
        .unwrap();

    let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new(vec![(
        LmMessage::Assistant {
            content: Some("done".to_string()),
            reasoning: None,
            tool_calls: vec![],
        },
        vec![AgentOutput::Done { summary: Some("done".to_string()) }],
    )]));

    let runtime = h.runtime(&task.task_id, agent);
    runtime.execute().await.unwrap();

    let history = h.conversation_store.load(&task.task_id).await;
    let injected = history.iter().find_map(|e| match &e.message {
        LmMessage::Tool { tool_call_id, content, .. } if tool_call_id == "c3" => Some(content.clone()),
        _ => None,
    });
    assert!(injected.unwrap().contains("\"ok\":true"));

    let final_task = h.task_service.get_task(&task.task_id).await.unwrap();
    assert_eq!(final_task.status, TaskStatus::Done);
}

#[tokio::test]
async fn scenario_5_instruction_queuing_while_executing() {
    let h = Harness::new();
    let task = h
        .task_service
        .create_task("user", "read a.txt", None, Priority::Normal, "agent-1", None)
        .await
        .unwrap();
    h.task_service.start_task(&task.task_id, "agent-1").await.unwrap();

    // History is unsafe to inject into while a tool call is outstanding.
    h.conversation_store
        .append(
            &task.task_id,
            LmMessage::Assistant {
                content: None,
                reasoning: None,
                tool_calls: vec![ToolCallRequest {
                    tool_call_id: "c4".to_string(),
                    tool_name: "readFile".to_string(),
                    arguments: serde_json::json!({}),
                }],
            },
        )
        .await
        .unwrap();

    let agent: Arc<dyn Agent> = Arc::new(ScriptedAgent::new(vec![(
        LmMessage::Assistant {
            content: Some("done".to_string()),
            reasoning: None,
            tool_calls: vec![],
        },
        vec![AgentOutput::Done { summary: Some("done".to_string()) }],
    )]));
    let runtime = h.runtime(&task.task_id, agent);

    runtime.on_instruction("also do Y".to_string()).await;

    runtime.execute().await.unwrap();

    let history = h.conversation_store.load(&task.task_id).await;
    let tool_result_index = history
        .iter()
        .position(|e| matches!(&e.message, LmMessage::Tool { tool_call_id, .. } if tool_call_id == "c4"))
        .unwrap();
    let instruction_index = history
        .iter()
        .position(|e| matches!(&e.message, LmMessage::User { content } if content == "also do Y"))
        .unwrap();
    assert!(instruction_index > tool_result_index, "instruction must land after the tool result it was queued behind");
}

#[tokio::test]
async fn scenario_6_parallel_subtasks_with_one_failure() {
    use agentrt::tools::{CreateSubtasksTool, SubtaskRequest};
    use std::collections::HashSet;
    use std::time::Duration;

    let h = Harness::new();
    let parent = h
        .task_service
        .create_task("user", "fan out", None, Priority::Normal, "agent-1", None)
        .await
        .unwrap();

    let mut known_agents = HashSet::new();
    known_agents.insert("A".to_string());
    known_agents.insert("B".to_string());
    let subtask_tool = CreateSubtasksTool::new(h.task_service.clone(), h.event_store.clone(), known_agents, Duration::from_secs(5));

    let requests = vec![
        SubtaskRequest {
            agent_id: "A".to_string(),
            title: "X".to_string(),
            intent: None,
            priority: None,
        },
        SubtaskRequest {
            agent_id: "B".to_string(),
            title: "Y".to_string(),
            intent: None,
            priority: None,
        },
    ];

    let wait = tokio::spawn({
        let subtask_tool = subtask_tool;
        let parent_id = parent.task_id.clone();
        async move { subtask_tool.create_subtasks(&parent_id, requests).await }
    });

    // Give the wait loop a moment to subscribe before children finish.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let parent_view = h.task_service.get_task(&parent.task_id).await.unwrap();
    assert_eq!(parent_view.child_task_ids.len(), 2);
    let child_x = parent_view.child_task_ids[0].clone();
    let child_y = parent_view.child_task_ids[1].clone();

    h.task_service.start_task(&child_x, "A").await.unwrap();
    h.task_service.complete_task(&child_x, "A", Some("did X".to_string())).await.unwrap();

    h.task_service.start_task(&child_y, "B").await.unwrap();
    h.task_service.fail_task(&child_y, "B", "could not do Y").await.unwrap();

    let summary = wait.await.unwrap().unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.cancel, 0);
}

#[test]
fn interaction_option_labels_are_human_readable() {
    let interaction = agentrt::domain::Interaction::confirm_risky_tool("i1", "runCommand", "c1");
    let labels: Vec<&str> = interaction.options.iter().map(|o: &InteractionOption| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Approve", "Reject"]);
}
