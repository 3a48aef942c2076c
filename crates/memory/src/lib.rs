//! History store implementations for toolweave.

pub mod file_backend;
pub mod in_memory;
pub mod noop;

pub use file_backend::FileHistory;
pub use in_memory::InMemoryHistory;
pub use noop::NoopHistory;

use std::path::PathBuf;
use std::sync::Arc;
use toolweave_core::memory::HistoryStore;

/// Build a store from a backend name, as found in the `[memory]` config section.
///
/// Returns `None` for the "none" backend so callers can skip history entirely.
pub fn from_backend(
    backend: &str,
    path: PathBuf,
    window: Option<usize>,
) -> Option<Arc<dyn HistoryStore>> {
    match backend {
        "in_memory" => Some(match window {
            Some(n) => Arc::new(InMemoryHistory::windowed(n)),
            None => Arc::new(InMemoryHistory::new()),
        }),
        "file" => Some(match window {
            Some(n) => Arc::new(FileHistory::windowed(path, n)),
            None => Arc::new(FileHistory::new(path)),
        }),
        _ => None,
    }
}
