//! In-memory history store — useful for testing and multi-turn sessions
//! that don't need to survive a restart.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use toolweave_core::error::MemoryError;
use toolweave_core::memory::HistoryStore;
use toolweave_core::session::IterationRecord;

/// Stores records in a deque, optionally keeping only the most recent ones.
pub struct InMemoryHistory {
    records: Arc<RwLock<VecDeque<IterationRecord>>>,
    window: Option<usize>,
}

impl InMemoryHistory {
    /// Unbounded store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::new())),
            window: None,
        }
    }

    /// Store that keeps only the last `window` records.
    pub fn windowed(window: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(window))),
            window: Some(window.max(1)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, record: &IterationRecord) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        records.push_back(record.clone());
        if let Some(window) = self.window {
            while records.len() > window {
                records.pop_front();
            }
        }
        Ok(())
    }

    async fn read(&self) -> Result<Vec<IterationRecord>, MemoryError> {
        Ok(self.records.read().await.iter().cloned().collect())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.records.write().await.clear();
        Ok(())
    }
}
