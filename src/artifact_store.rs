//! The Artifact Store: an external collaborator providing sandboxed
//! read/write/list/stat access to a task's workspace files.
//!
//! The core never implements a concrete backend; it only requires that
//! whatever does reject symlink traversal, absolute paths, and null bytes
//! before touching the filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStat {
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub is_dir: bool,
}

/// Sandboxed workspace file access, scoped to one task.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn read(&self, task_id: &str, path: &str) -> Result<Vec<u8>, String>;
    async fn write(&self, task_id: &str, path: &str, contents: &[u8]) -> Result<(), String>;
    async fn list(&self, task_id: &str, path: &str) -> Result<Vec<ArtifactStat>, String>;
    async fn stat(&self, task_id: &str, path: &str) -> Result<ArtifactStat, String>;
}

/// Reject a path that isn't safely containable within a task's sandbox:
/// absolute paths, `..` traversal, and embedded null bytes are all refused.
/// Implementations should call this before touching the filesystem; it
/// does not itself resolve symlinks (that check requires a live
/// filesystem handle and belongs in the concrete backend).
pub fn reject_unsafe_path(path: &str) -> Result<(), String> {
    if path.contains('\0') {
        return Err("path contains a null byte".to_string());
    }
    if std::path::Path::new(path).is_absolute() {
        return Err("absolute paths are not allowed".to_string());
    }
    if std::path::Path::new(path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err("path traversal (..) is not allowed".to_string());
    }
    Ok(())
}
