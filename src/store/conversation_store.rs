//! The Conversation Store: a durable, per-task, index-ordered log of
//! [`LmMessage`]s used to rebuild LM conversation history after a crash.

use crate::domain::message::{ConversationEntry, LmMessage};
use crate::error::StoreError;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tokio::sync::Mutex;

struct Inner {
    /// All entries in append order, mirrored to disk.
    entries: Vec<ConversationEntry>,
    /// Highest `index` appended so far per task, for the next append.
    next_index: HashMap<String, u64>,
    path: PathBuf,
}

/// Per-task conversation history, persisted as newline-delimited JSON and
/// loaded fully into memory on open, same discipline as [`EventStore`](crate::store::EventStore).
pub struct ConversationStore {
    inner: Mutex<Inner>,
}

impl ConversationStore {
    pub fn open(data_dir: &std::path::Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let path = data_dir.join("conversations.jsonl");

        let mut entries = Vec::new();
        let mut next_index: HashMap<String, u64> = HashMap::new();
        if path.exists() {
            let file = fs::File::open(&path).map_err(|e| StoreError::Io(e.to_string()))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| StoreError::Io(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: ConversationEntry =
                    serde_json::from_str(&line).map_err(|e| StoreError::Corrupt(e.to_string()))?;
                next_index
                    .entry(entry.task_id.clone())
                    .and_modify(|n| *n = (*n).max(entry.index + 1))
                    .or_insert(entry.index + 1);
                entries.push(entry);
            }
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                entries,
                next_index,
                path,
            }),
        })
    }

    /// Append one message to `task_id`'s conversation, assigning the next
    /// per-task index.
    pub async fn append(
        &self,
        task_id: &str,
        message: LmMessage,
    ) -> Result<ConversationEntry, StoreError> {
        let mut inner = self.inner.lock().await;
        let index = inner.next_index.get(task_id).copied().unwrap_or(0);
        let entry = ConversationEntry {
            task_id: task_id.to_string(),
            index,
            message,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.path)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writeln!(
            file,
            "{}",
            serde_json::to_string(&entry).map_err(|e| StoreError::Corrupt(e.to_string()))?
        )
        .map_err(|e| StoreError::Io(e.to_string()))?;

        inner.next_index.insert(task_id.to_string(), index + 1);
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    /// Append several messages in one call, e.g. an assistant turn followed
    /// by its tool results, preserving relative order under one lock
    /// acquisition.
    pub async fn append_many(
        &self,
        task_id: &str,
        messages: Vec<LmMessage>,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        let mut out = Vec::with_capacity(messages.len());
        for message in messages {
            out.push(self.append(task_id, message).await?);
        }
        Ok(out)
    }

    /// Load a task's full conversation history in index order.
    pub async fn load(&self, task_id: &str) -> Vec<ConversationEntry> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Number of messages currently stored for a task.
    pub async fn len(&self, task_id: &str) -> u64 {
        let inner = self.inner.lock().await;
        inner.next_index.get(task_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_assigns_increasing_per_task_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();

        let e0 = store
            .append("task-a", LmMessage::User { content: "hi".into() })
            .await
            .unwrap();
        let e1 = store
            .append(
                "task-a",
                LmMessage::Assistant {
                    content: Some("hello".into()),
                    reasoning: None,
                    tool_calls: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(e0.index, 0);
        assert_eq!(e1.index, 1);
    }

    #[tokio::test]
    async fn conversations_are_isolated_per_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();
        store
            .append("task-a", LmMessage::User { content: "a".into() })
            .await
            .unwrap();
        store
            .append("task-b", LmMessage::User { content: "b".into() })
            .await
            .unwrap();

        assert_eq!(store.load("task-a").await.len(), 1);
        assert_eq!(store.load("task-b").await.len(), 1);
    }

    #[tokio::test]
    async fn reload_from_disk_continues_index() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ConversationStore::open(dir.path()).unwrap();
            store
                .append("task-a", LmMessage::User { content: "a".into() })
                .await
                .unwrap();
        }
        let store = ConversationStore::open(dir.path()).unwrap();
        let entry = store
            .append("task-a", LmMessage::User { content: "b".into() })
            .await
            .unwrap();
        assert_eq!(entry.index, 1);
        assert_eq!(store.load("task-a").await.len(), 2);
    }
}
