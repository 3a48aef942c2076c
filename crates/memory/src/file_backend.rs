//! File-based history store — persistent JSON-lines storage.
//!
//! Each line is one JSON-encoded `IterationRecord`. `clear` truncates the
//! file. With a window of N, `read` returns the last N records and the file
//! is compacted down to N lines once it grows past 2N.
//!
//! Storage location: `~/.toolweave/history.jsonl` unless configured.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use toolweave_core::error::MemoryError;
use toolweave_core::memory::HistoryStore;
use toolweave_core::session::IterationRecord;
use tracing::{debug, warn};

/// A file-backed history store using JSONL (one JSON object per line).
pub struct FileHistory {
    path: PathBuf,
    window: Option<usize>,
    // Serializes writers so concurrent appends never interleave lines.
    write_lock: Mutex<()>,
}

impl FileHistory {
    /// Create a store at the given path. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "File history store opened");
        Self {
            path,
            window: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Keep only the last `window` records.
    pub fn windowed(path: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            window: Some(window),
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file with its last `window` lines once it holds more
    /// than twice that many. Caller holds the write lock.
    async fn compact(&self, window: usize) -> Result<(), MemoryError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to read history file: {e}")))?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= window.saturating_mul(2) {
            return Ok(());
        }

        let mut kept = lines[lines.len() - window..].join("\n");
        kept.push('\n');
        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, kept.as_bytes())
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write history file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to replace history file: {e}")))?;
        debug!(path = %self.path.display(), dropped = lines.len() - window, "History file compacted");
        Ok(())
    }

    fn parse(content: &str) -> Vec<IterationRecord> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<IterationRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted history record");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl HistoryStore for FileHistory {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, record: &IterationRecord) -> Result<(), MemoryError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize history record: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create history directory: {e}"))
            })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open history file: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write history file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to flush history file: {e}")))?;
        drop(file);

        if let Some(window) = self.window {
            self.compact(window).await?;
        }
        Ok(())
    }

    async fn read(&self) -> Result<Vec<IterationRecord>, MemoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let mut records = Self::parse(&content);
                if let Some(window) = self.window {
                    let excess = records.len().saturating_sub(window);
                    records.drain(..excess);
                }
                Ok(records)
            }
            // No file yet means no history
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(MemoryError::Storage(format!("Failed to read history file: {e}"))),
        }
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::write(&self.path, b"").await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoryError::Storage(format!("Failed to truncate history file: {e}"))),
        }
    }
}
