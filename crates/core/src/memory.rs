//! History store trait — optional persistence of iteration records.
//!
//! When a store is attached, the loop controller appends every completed
//! round and reads prior rounds at session start so earlier work is visible
//! to the planner.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::session::IterationRecord;

/// The core HistoryStore trait.
///
/// Implementations: in-memory (optionally windowed), JSONL file, none (no-op).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory", "none").
    fn name(&self) -> &str;

    /// Append one record.
    async fn append(&self, record: &IterationRecord) -> std::result::Result<(), MemoryError>;

    /// Read prior records, oldest first.
    async fn read(&self) -> std::result::Result<Vec<IterationRecord>, MemoryError>;

    /// Drop all stored records.
    async fn clear(&self) -> std::result::Result<(), MemoryError>;
}
