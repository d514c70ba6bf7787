//! Checkpoint persistence
//!
//! One checkpoint per thread: the last completed step and the record as it
//! stood after that step. Writes for one thread are serialized; different
//! threads never contend on the same lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::step::StepId;
use crate::article::ArticleRecord;
use crate::{Error, Result};

/// Snapshot of a thread after a step completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    /// Last step that completed
    pub step: StepId,
    pub record: ArticleRecord,
    /// The terminal step has run
    #[serde(default)]
    pub finished: bool,
    /// Steps run over the thread's whole life
    #[serde(default)]
    pub steps_run: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// First checkpoint of a thread
    pub fn new(thread_id: &str, step: StepId, record: ArticleRecord) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.to_string(),
            step,
            record,
            finished: false,
            steps_run: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Successor checkpoint after another step completed
    pub fn advance(&self, step: StepId, record: ArticleRecord) -> Self {
        Self {
            thread_id: self.thread_id.clone(),
            step,
            record,
            finished: false,
            steps_run: self.steps_run + 1,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }

    /// Same position with an amended record
    pub fn with_record(&self, record: ArticleRecord) -> Self {
        Self {
            record,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// One-line summary for listings
    pub fn summary(&self) -> String {
        let state = if self.finished { "finished" } else { "suspended" };
        let title = self.record.title.as_deref().unwrap_or("(untitled)");
        format!(
            "{}  {:<14} {:<9} form {}  {}  {}",
            self.thread_id,
            self.step,
            state,
            self.record.form_number,
            self.updated_at.format("%Y-%m-%d %H:%M"),
            title
        )
    }
}

/// Storage for per-thread checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest checkpoint for a thread, if any
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Replace the thread's checkpoint
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Forget a thread; returns whether anything was removed
    async fn discard(&self, thread_id: &str) -> Result<bool>;

    /// All checkpoints, most recently updated first
    async fn list(&self) -> Result<Vec<Checkpoint>>;
}

/// Lazily created per-thread mutexes
///
/// An entry only the map refers to is neither held nor awaited, so it is
/// dropped on the next acquire or prune.
#[derive(Default)]
pub(crate) struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn drop_idle(locks: &mut HashMap<String, Arc<Mutex<()>>>) {
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
}

impl ThreadLocks {
    pub(crate) async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            drop_idle(&mut locks);
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop every lock nobody holds or waits on
    pub(crate) async fn prune(&self) {
        drop_idle(&mut *self.locks.lock().await);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// In-process store, lost on exit
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn discard(&self, thread_id: &str) -> Result<bool> {
        Ok(self.checkpoints.write().await.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let mut all: Vec<_> = self.checkpoints.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}

/// One YAML file per thread under a directory
///
/// Files are written to a temporary sibling and renamed into place, so a
/// crash mid-write leaves the previous checkpoint intact.
pub struct FileCheckpointStore {
    base_dir: PathBuf,
    locks: ThreadLocks,
}

impl FileCheckpointStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            locks: ThreadLocks::default(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Checkpoint file for a thread
    pub fn path_for(&self, thread_id: &str) -> Result<PathBuf> {
        validate_thread_id(thread_id)?;
        Ok(self.base_dir.join(format!("{}.yaml", thread_id)))
    }

    async fn read(path: &Path) -> Result<Checkpoint> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| {
            Error::Checkpoint(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

/// Thread ids become file names, so keep them to a safe alphabet
fn validate_thread_id(thread_id: &str) -> Result<()> {
    let valid = !thread_id.is_empty()
        && thread_id.len() <= 128
        && !thread_id.starts_with('.')
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::Checkpoint(format!("Invalid thread id: {:?}", thread_id)))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(thread_id)?;
        let _guard = self.locks.acquire(thread_id).await;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read(&path).await.map(Some)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path_for(&checkpoint.thread_id)?;
        let content = serde_yaml::to_string(checkpoint)?;

        let _guard = self.locks.acquire(&checkpoint.thread_id).await;
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let staging = path.with_extension("yaml.tmp");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &path).await?;

        debug!(
            "Saved checkpoint for {} at {} to {}",
            checkpoint.thread_id,
            checkpoint.step,
            path.display()
        );
        Ok(())
    }

    async fn discard(&self, thread_id: &str) -> Result<bool> {
        let path = self.path_for(thread_id)?;
        let guard = self.locks.acquire(thread_id).await;
        let removed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        drop(guard);
        self.locks.prune().await;
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        if !tokio::fs::try_exists(&self.base_dir).await? {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "yaml").unwrap_or(false) {
                match Self::read(&path).await {
                    Ok(checkpoint) => checkpoints.push(checkpoint),
                    Err(e) => debug!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        checkpoints.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(checkpoints)
    }
}
