//! A task-oriented agent execution runtime.
//!
//! Tasks move through a small state machine (`open -> in_progress ->
//! {awaiting_user, paused, done, failed, canceled}`), driven purely by an
//! append-only log of domain events. Every mutation goes through
//! [`task_service::TaskService`], which validates the requested transition
//! before appending; every read is a fold of one task's event stream
//! ([`projection`]). Conversation history survives a crash via
//! [`conversation::repair`], and tool calls that need a human's go-ahead
//! are gated by a confirmation binding enforced in [`tools::ToolExecutor`].

pub mod agent;
pub mod artifact_store;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod error;
pub mod lm_client;
pub mod projection;
pub mod runtime_manager;
pub mod store;
pub mod task_service;
pub mod tools;
pub mod ui_bus;

pub use agent::{Agent, AgentInput, AgentOutput, AgentRuntime};
pub use config::RuntimeConfig;
pub use domain::{Task, TaskStatus};
pub use runtime_manager::RuntimeManager;
pub use task_service::TaskService;
