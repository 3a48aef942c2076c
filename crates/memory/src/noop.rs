//! No-op history store — disables persistence entirely.

use async_trait::async_trait;
use toolweave_core::error::MemoryError;
use toolweave_core::memory::HistoryStore;
use toolweave_core::session::IterationRecord;

/// A no-op store that keeps nothing.
pub struct NoopHistory;

#[async_trait]
impl HistoryStore for NoopHistory {
    fn name(&self) -> &str { "none" }

    async fn append(&self, _record: &IterationRecord) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn read(&self) -> Result<Vec<IterationRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}
