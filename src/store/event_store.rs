//! The Event Store: a durable, append-only, per-stream-ordered log of
//! [`DomainEvent`]s with a broadcast channel and projection cursors
//!.

use crate::domain::event::{DomainEvent, ProjectionRecord, StoredEvent};
use crate::error::StoreError;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

struct Inner {
    events: Vec<StoredEvent>,
    /// Index into `events` by id, for O(1) `read_by_id`.
    by_id: HashMap<u64, usize>,
    /// Highest `seq` appended so far per stream.
    stream_seqs: HashMap<String, u64>,
    next_id: u64,
    events_path: PathBuf,
    projections: HashMap<String, ProjectionRecord>,
    projections_path: PathBuf,
}

/// Durable, append-only, per-stream-ordered event log.
///
/// `append` assigns ids/seqs, writes to `events.jsonl`, and publishes to
/// `events$` all under one `tokio::sync::Mutex` guarding the critical
/// section, so subscriber delivery order equals `id` order.
pub struct EventStore {
    inner: Mutex<Inner>,
    events_tx: broadcast::Sender<StoredEvent>,
}

impl EventStore {
    /// Open (or create) an event store rooted at `data_dir`, loading any
    /// existing `events.jsonl`/`projections.jsonl` into memory.
    ///
    /// `channel_capacity` bounds the broadcast channel; slow subscribers
    /// lag and miss events rather than blocking appenders.
    pub fn open(data_dir: &std::path::Path, channel_capacity: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let events_path = data_dir.join("events.jsonl");
        let projections_path = data_dir.join("projections.jsonl");

        let mut events = Vec::new();
        let mut by_id = HashMap::new();
        let mut stream_seqs: HashMap<String, u64> = HashMap::new();
        let mut next_id = 0u64;

        if events_path.exists() {
            let file = fs::File::open(&events_path).map_err(|e| StoreError::Io(e.to_string()))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| StoreError::Io(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let stored: StoredEvent =
                    serde_json::from_str(&line).map_err(|e| StoreError::Corrupt(e.to_string()))?;
                by_id.insert(stored.id, events.len());
                next_id = next_id.max(stored.id + 1);
                stream_seqs
                    .entry(stored.stream_id.clone())
                    .and_modify(|s| *s = (*s).max(stored.seq))
                    .or_insert(stored.seq);
                events.push(stored);
            }
        }

        let mut projections = HashMap::new();
        if projections_path.exists() {
            let file =
                fs::File::open(&projections_path).map_err(|e| StoreError::Io(e.to_string()))?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|e| StoreError::Io(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: ProjectionRecord =
                    serde_json::from_str(&line).map_err(|e| StoreError::Corrupt(e.to_string()))?;
                // The latest record for a name wins.
                projections.insert(record.name.clone(), record);
            }
        }

        let (events_tx, _rx) = broadcast::channel(channel_capacity.max(1));

        Ok(Self {
            inner: Mutex::new(Inner {
                events,
                by_id,
                stream_seqs,
                next_id,
                events_path,
                projections,
                projections_path,
            }),
            events_tx,
        })
    }

    /// Append one or more events to `stream_id`, assigning strictly
    /// increasing `id` (global) and `seq` (per-stream), persisting them,
    /// and publishing each to `events$` in the same order.
    ///
    /// All-or-nothing: if the durable write fails, no in-memory state is
    /// mutated and nothing is published.
    pub async fn append(
        &self,
        stream_id: &str,
        events: Vec<DomainEvent>,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.lock().await;

        let mut next_seq = inner.stream_seqs.get(stream_id).copied().unwrap_or(0);
        let mut stored_batch = Vec::with_capacity(events.len());
        let mut serialized = String::new();
        for event in events {
            let id = inner.next_id;
            next_seq += 1;
            let stored = StoredEvent {
                id,
                stream_id: stream_id.to_string(),
                seq: next_seq,
                created_at: chrono::Utc::now(),
                event,
            };
            serialized.push_str(
                &serde_json::to_string(&stored).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            );
            serialized.push('\n');
            inner.next_id = id + 1;
            stored_batch.push(stored);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.events_path)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?;

        inner.stream_seqs.insert(stream_id.to_string(), next_seq);
        for stored in &stored_batch {
            inner.by_id.insert(stored.id, inner.events.len());
            inner.events.push(stored.clone());
        }

        for stored in &stored_batch {
            // A broadcast channel with no subscribers errors on send; that's
            // fine, publication is fire-and-forget (at-least-once to whoever
            // is listening).
            let _ = self.events_tx.send(stored.clone());
        }

        log::debug!(
            "event_store: appended {} event(s) to stream {}",
            stored_batch.len(),
            stream_id
        );

        Ok(stored_batch)
    }

    /// Subscribe to the ordered stream of all appended events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.events_tx.subscribe()
    }

    /// Read one stream, optionally starting from (and including) `from_seq`.
    pub async fn read_stream(
        &self,
        stream_id: &str,
        from_seq_inclusive: Option<u64>,
    ) -> Vec<StoredEvent> {
        let inner = self.inner.lock().await;
        let floor = from_seq_inclusive.unwrap_or(1);
        inner
            .events
            .iter()
            .filter(|e| e.stream_id == stream_id && e.seq >= floor)
            .cloned()
            .collect()
    }

    /// Read the full log, optionally starting after (and excluding) `from_id`.
    pub async fn read_all(&self, from_id_exclusive: Option<u64>) -> Vec<StoredEvent> {
        let inner = self.inner.lock().await;
        let floor = from_id_exclusive.map(|id| id + 1).unwrap_or(0);
        inner
            .events
            .iter()
            .filter(|e| e.id >= floor)
            .cloned()
            .collect()
    }

    /// Read a single event by its global id.
    pub async fn read_by_id(&self, id: u64) -> Option<StoredEvent> {
        let inner = self.inner.lock().await;
        inner.by_id.get(&id).map(|&idx| inner.events[idx].clone())
    }

    /// Replay one stream in full (alias over `read_stream` with no floor),
    /// matching the `replayByStream` entry in the Event Query API.
    pub async fn replay_by_stream(&self, stream_id: &str) -> Vec<StoredEvent> {
        self.read_stream(stream_id, None).await
    }

    /// Query API `getEventsAfter`: events with `id > id_exclusive`, capped at
    /// `limit`. Returns `(events, truncated)` so a transport can signal
    /// "truncated" to the client when the cap was hit.
    pub async fn get_events_after(
        &self,
        id_exclusive: u64,
        limit: usize,
    ) -> (Vec<StoredEvent>, bool) {
        let inner = self.inner.lock().await;
        let mut matched: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.id > id_exclusive)
            .cloned()
            .collect();
        let truncated = matched.len() > limit;
        matched.truncate(limit);
        (matched, truncated)
    }

    /// Fetch a named projection cursor, or `default_state` if none has been
    /// saved yet.
    pub async fn get_projection(
        &self,
        name: &str,
        default_state: serde_json::Value,
    ) -> ProjectionRecord {
        let inner = self.inner.lock().await;
        inner.projections.get(name).cloned().unwrap_or(ProjectionRecord {
            name: name.to_string(),
            cursor_event_id: 0,
            state: default_state,
        })
    }

    /// Persist a new cursor/state for a named projection. The latest record
    /// for a given name wins on reload.
    pub async fn save_projection(
        &self,
        name: &str,
        cursor_event_id: u64,
        state: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = ProjectionRecord {
            name: name.to_string(),
            cursor_event_id,
            state,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.projections_path)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writeln!(
            file,
            "{}",
            serde_json::to_string(&record).map_err(|e| StoreError::Corrupt(e.to_string()))?
        )
        .map_err(|e| StoreError::Io(e.to_string()))?;
        inner.projections.insert(name.to_string(), record);
        Ok(())
    }
}

/// Convenience wrapper so callers can share one store across tasks without
/// wrapping it themselves.
pub type SharedEventStore = Arc<EventStore>;
