//! Persistent key/value store adapter for TabSync.
//!
//! This crate wraps a durable, synchronous, string-keyed store behind
//! the [`StorageBackend`] trait and exposes the [`KvStore`] adapter that
//! serializes values, tolerates corruption, and emits exactly one change
//! event per successful mutation.
//!
//! # Architecture
//!
//! ```text
//! KvStore.set / get / remove
//!     │ serialize / decode (ValueFormat)
//!     ▼
//! StorageBackend (MemoryBackend | FileBackend | platform store)
//!     │ on successful mutation
//!     ├─► ChangeNotifier  (same context)
//!     └─► ContextHub      (other contexts, if attached)
//! ```
//!
//! # Error Handling
//!
//! Nothing here panics past the adapter boundary:
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Backend full / I/O error | returned as [`StoreError`] |
//! | Unserializable value | returned as [`StoreError`] |
//! | Corrupt cached JSON | reads as `Value::Null`, not an error |
//!
//! # Usage
//!
//! ```
//! use tabsync_store::{KvStore, MemoryBackend};
//! use tabsync_types::ValueFormat;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = KvStore::new(Arc::new(MemoryBackend::new()));
//!
//! store.set("user", &json!({"uid": "abc"})).unwrap();
//! let value = store.get("user", ValueFormat::Json).unwrap();
//! assert_eq!(value["uid"], "abc");
//!
//! store.remove("user").unwrap();
//! assert!(store.get("user", ValueFormat::Json).unwrap().is_null());
//! ```

mod backend;
mod error;
mod file;
mod store;

pub use backend::{BackendError, MemoryBackend, StorageBackend};
pub use error::StoreError;
pub use file::{default_store_path, FileBackend};
pub use store::KvStore;

// Re-exports for consumers wiring stores to hubs
pub use tabsync_event::{ChangeEvent, ChangeNotifier, ContextHub};
pub use tabsync_types::{ContextId, ValueFormat};
