//! The agent execution layer: the `Agent` strategy trait, the Output
//! Handler, and the per-task Agent Runtime.

mod output_handler;
mod runtime;
mod traits;

pub use output_handler::{Outcome, OutputHandler, Signal};
pub use runtime::AgentRuntime;
pub use traits::{Agent, AgentInput, AgentOutput};
