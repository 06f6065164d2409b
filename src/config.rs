//! Process-wide configuration for the runtime.
//!
//! Provides [`RuntimeConfig`], constructed manually or via [`RuntimeConfig::default`].
//! No TOML/YAML/env-file parsing dependency is introduced here — callers build
//! the struct however they like and leave file-format parsing to the
//! embedding application.
//!
//! # Example
//!
//! ```rust
//! use agentrt::config::RuntimeConfig;
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let config = RuntimeConfig::default()
//!     .with_data_dir(PathBuf::from("/var/lib/agentrt"))
//!     .with_subtask_timeout(Duration::from_secs(60));
//! assert_eq!(config.subtask_timeout, Duration::from_secs(60));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the runtime.
///
/// Fields are intentionally plain and public — there is no builder-only
/// access, just `with_*` convenience methods on top of direct field access.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory under which `events.jsonl`, `audit.jsonl`, `conversations.jsonl`,
    /// and `projections.jsonl` are stored.
    pub data_dir: PathBuf,
    /// Capacity of the Event Store's broadcast channel (§4.2 `events$`).
    /// Subscribers slower than this will miss events (at-least-once, not exactly-once).
    pub event_channel_capacity: usize,
    /// Capacity of the bounded channel an [`Agent`](crate::agent::Agent) uses
    /// to yield outputs to the runtime loop (§9, "channel-producing generators").
    pub agent_output_channel_capacity: usize,
    /// Default timeout for a subtask waiting on a child task's terminal event (§5).
    pub subtask_timeout: Duration,
    /// Whether localhost transport connections bypass authentication (§6).
    /// The core never enforces this itself — it is surfaced so an embedding
    /// transport can read a single shared source of truth.
    pub localhost_bypass_auth: bool,
    /// Cap on the number of events a single gap-fill read may return (§6, §7).
    pub gap_fill_cap: usize,
}

impl Default for RuntimeConfig {
    /// Create a config pointing at `"agentrt_data"` in the current working
    /// directory, with a 300s subtask timeout and
    /// generous channel capacities.
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("agentrt_data"),
            event_channel_capacity: 1024,
            agent_output_channel_capacity: 64,
            subtask_timeout: Duration::from_secs(300),
            localhost_bypass_auth: true,
            gap_fill_cap: 1000,
        }
    }
}

impl RuntimeConfig {
    /// Override the storage directory.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    /// Override the subtask wait timeout.
    pub fn with_subtask_timeout(mut self, timeout: Duration) -> Self {
        self.subtask_timeout = timeout;
        self
    }

    /// Override the event broadcast channel capacity.
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Path to the event log file.
    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    /// Path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join("audit.jsonl")
    }

    /// Path to the conversation log file.
    pub fn conversations_path(&self) -> PathBuf {
        self.data_dir.join("conversations.jsonl")
    }

    /// Path to the projection cursor file.
    pub fn projections_path(&self) -> PathBuf {
        self.data_dir.join("projections.jsonl")
    }
}
