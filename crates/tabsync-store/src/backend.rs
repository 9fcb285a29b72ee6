//! Storage backend abstraction.
//!
//! The [`StorageBackend`] trait captures the contract of the underlying
//! persistent store: synchronous, string-keyed, string-valued, shared by
//! every consumer in the process.

use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a storage backend.
///
/// These are the only failures a durable local store produces; the
/// adapter wraps them into [`StoreError`](crate::StoreError) and never
/// lets them escape as panics.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The store is out of space for the attempted write.
    #[error("storage quota exceeded writing key '{key}': {used} of {quota} bytes used")]
    QuotaExceeded {
        /// Key whose write was rejected.
        key: String,
        /// Bytes currently stored.
        used: usize,
        /// Configured quota in bytes.
        quota: usize,
    },

    /// The backing medium failed.
    #[error("storage I/O failure: {0}")]
    Io(String),
}

/// Synchronous string-keyed persistent store.
///
/// Implementations must be thread-safe (`Send + Sync`); the store is
/// process-wide shared mutable state and correctness relies on the
/// single-threaded mutation model plus each consumer's de-duplication
/// discipline, not on locking at this layer.
///
/// Mutations through a backend do **not** produce change events; that is
/// the [`KvStore`](crate::KvStore) adapter's job. Writing directly to a
/// backend is how tests plant corrupt data.
pub trait StorageBackend: Send + Sync {
    /// Reads the raw string stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Deletes the entry under `key`. Deleting a missing key is a no-op.
    fn remove_item(&self, key: &str) -> Result<(), BackendError>;
}

/// In-memory backend.
///
/// The default backend for tests and ephemeral contexts. An optional
/// byte quota simulates the bounded storage of a real platform store so
/// the quota-exceeded path can be exercised deterministically.
///
/// # Example
///
/// ```
/// use tabsync_store::{MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::with_quota(8);
/// backend.set_item("k", "small").unwrap();
/// assert!(backend.set_item("k2", "way too large").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Creates an unbounded in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that rejects writes once `quota` bytes of
    /// values are stored.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the backend holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn used_bytes(entries: &HashMap<String, String>) -> usize {
        entries.values().map(String::len).sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota {
            let existing = entries.get(key).map_or(0, String::len);
            let used = Self::used_bytes(&entries) - existing;
            if used + value.len() > quota {
                return Err(BackendError::QuotaExceeded {
                    key: key.to_string(),
                    used,
                    quota,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let backend = MemoryBackend::new();

        assert!(backend.get_item("k").unwrap().is_none());

        backend.set_item("k", "v").unwrap();
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("v"));

        backend.remove_item("k").unwrap();
        assert!(backend.get_item("k").unwrap().is_none());
    }

    #[test]
    fn overwrite_replaces() {
        let backend = MemoryBackend::new();
        backend.set_item("k", "old").unwrap();
        backend.set_item("k", "new").unwrap();
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("new"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn remove_missing_is_noop() {
        let backend = MemoryBackend::new();
        backend.remove_item("ghost").unwrap();
    }

    #[test]
    fn quota_rejects_oversized_write() {
        let backend = MemoryBackend::with_quota(4);
        backend.set_item("a", "1234").unwrap();

        let err = backend.set_item("b", "5").unwrap_err();
        assert!(matches!(err, BackendError::QuotaExceeded { .. }));

        // Rejected write must not be partially applied
        assert!(backend.get_item("b").unwrap().is_none());
    }

    #[test]
    fn quota_allows_overwrite_within_budget() {
        let backend = MemoryBackend::with_quota(4);
        backend.set_item("a", "1234").unwrap();
        // Replacing the same key frees its old bytes first
        backend.set_item("a", "abcd").unwrap();
        assert_eq!(backend.get_item("a").unwrap().as_deref(), Some("abcd"));
    }
}
