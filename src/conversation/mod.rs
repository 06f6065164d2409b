//! Conversation history repair: crash-safe recovery of a task's LM
//! message history before it is handed back to an agent.

mod repair;

pub use repair::{is_safe_to_inject, lookup_from_registry, repair};
