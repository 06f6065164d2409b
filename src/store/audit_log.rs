//! The Audit Log: a durable record of every tool call request and
//! completion, separate from the domain event stream, used to recover a
//! tool's outcome after a crash (repair strategy S1).

use crate::domain::audit::{AuditEntry, StoredAuditEntry};
use crate::error::StoreError;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tokio::sync::Mutex;

struct Inner {
    entries: Vec<StoredAuditEntry>,
    path: PathBuf,
}

/// Append-only tool-call audit trail, persisted as newline-delimited JSON.
pub struct AuditLog {
    inner: Mutex<Inner>,
}

impl AuditLog {
    pub fn open(data_dir: &std::path::Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let path = data_dir.join("audit.jsonl");

        let mut entries = Vec::new();
        if path.exists() {
            let file = fs::File::open(&path).map_err(|e| StoreError::Io(e.to_string()))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| StoreError::Io(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: StoredAuditEntry =
                    serde_json::from_str(&line).map_err(|e| StoreError::Corrupt(e.to_string()))?;
                entries.push(entry);
            }
        }

        Ok(Self {
            inner: Mutex::new(Inner { entries, path }),
        })
    }

    pub async fn append(&self, entry: AuditEntry) -> Result<StoredAuditEntry, StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = StoredAuditEntry {
            timestamp: chrono::Utc::now(),
            entry,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.path)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writeln!(
            file,
            "{}",
            serde_json::to_string(&stored).map_err(|e| StoreError::Corrupt(e.to_string()))?
        )
        .map_err(|e| StoreError::Io(e.to_string()))?;

        inner.entries.push(stored.clone());
        Ok(stored)
    }

    /// All audit entries for one task, in append order.
    pub async fn for_task(&self, task_id: &str) -> Vec<StoredAuditEntry> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .filter(|e| e.entry.task_id() == task_id)
            .cloned()
            .collect()
    }

    /// The most recent entry matching `tool_call_id`, if any — used by
    /// repair strategy S1 to recover a dangling tool call's outcome.
    pub async fn find_by_tool_call_id(&self, tool_call_id: &str) -> Option<StoredAuditEntry> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .rev()
            .find(|e| e.entry.tool_call_id() == tool_call_id)
            .cloned()
    }

    /// All entries for a given tool call, in order (typically a requested
    /// entry followed by a completed one).
    pub async fn history_for_tool_call(&self, tool_call_id: &str) -> Vec<StoredAuditEntry> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .filter(|e| e.entry.tool_call_id() == tool_call_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested(tool_call_id: &str, task_id: &str) -> AuditEntry {
        AuditEntry::ToolCallRequested {
            tool_call_id: tool_call_id.to_string(),
            tool_name: "read_file".to_string(),
            task_id: task_id.to_string(),
            input: serde_json::json!({"path": "a.txt"}),
        }
    }

    fn completed(tool_call_id: &str, task_id: &str) -> AuditEntry {
        AuditEntry::ToolCallCompleted {
            tool_call_id: tool_call_id.to_string(),
            tool_name: "read_file".to_string(),
            task_id: task_id.to_string(),
            output: serde_json::json!({"contents": "hi"}),
            is_error: false,
            duration_ms: 5,
        }
    }

    #[tokio::test]
    async fn find_by_tool_call_id_returns_latest_entry() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        log.append(requested("tc-1", "task-a")).await.unwrap();
        log.append(completed("tc-1", "task-a")).await.unwrap();

        let latest = log.find_by_tool_call_id("tc-1").await.unwrap();
        assert!(matches!(latest.entry, AuditEntry::ToolCallCompleted { .. }));
    }

    #[tokio::test]
    async fn for_task_filters_by_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        log.append(requested("tc-1", "task-a")).await.unwrap();
        log.append(requested("tc-2", "task-b")).await.unwrap();

        assert_eq!(log.for_task("task-a").await.len(), 1);
        assert_eq!(log.for_task("task-b").await.len(), 1);
    }

    #[tokio::test]
    async fn reload_from_disk_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = AuditLog::open(dir.path()).unwrap();
            log.append(requested("tc-1", "task-a")).await.unwrap();
        }
        let log = AuditLog::open(dir.path()).unwrap();
        assert_eq!(log.for_task("task-a").await.len(), 1);
    }
}
