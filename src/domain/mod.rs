//! Core data model: tasks, domain events, audit entries, LM messages, and
//! user interactions.
//!
//! Every wire/disk type here is a closed, exhaustively matched tagged
//! variant rather than a dynamically typed union.

pub mod audit;
pub mod event;
pub mod interaction;
pub mod message;
pub mod task;

pub use audit::{AuditEntry, StoredAuditEntry};
pub use event::{DomainEvent, StoredEvent};
pub use interaction::{Interaction, InteractionKind, InteractionOption, Purpose, Validation};
pub use message::{LmMessage, Role, ToolCallRequest};
pub use task::{Priority, Task, TaskStatus};
