//! Shared state cell — an explicitly owned, thread-safe slot.
//!
//! Background producers (a listener thread, a watcher task) write the latest
//! value here and tools read it. The cell is owned by whoever builds the
//! session, never by the process.

use std::sync::{Arc, RwLock};

/// A cloneable handle to one optional value.
#[derive(Debug)]
pub struct StateCell<T> {
    inner: Arc<RwLock<Option<T>>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for StateCell<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }
}

impl<T: Clone> StateCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, if any.
    pub fn get(&self) -> Option<T> {
        // A poisoned lock still holds a consistent Option; keep serving it.
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the value, returning the previous one.
    pub fn set(&self, value: T) -> Option<T> {
        match self.inner.write() {
            Ok(mut guard) => guard.replace(value),
            Err(poisoned) => poisoned.into_inner().replace(value),
        }
    }

    /// Empty the cell, returning what it held.
    pub fn clear(&self) -> Option<T> {
        match self.inner.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_clear() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), None);
        assert_eq!(cell.set("hello".to_string()), None);
        assert_eq!(cell.get().as_deref(), Some("hello"));
        assert_eq!(cell.set("world".to_string()).as_deref(), Some("hello"));
        assert_eq!(cell.clear().as_deref(), Some("world"));
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn clones_share_the_value() {
        let cell: StateCell<u32> = StateCell::new();
        let writer = cell.clone();
        let handle = std::thread::spawn(move || {
            writer.set(7);
        });
        handle.join().unwrap();
        assert_eq!(cell.get(), Some(7));
    }
}
