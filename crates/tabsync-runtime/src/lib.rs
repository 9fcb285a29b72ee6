//! Reactive runtime for TabSync: bindings, autosave, and session state.
//!
//! This crate composes the storage layer into the behaviors an
//! application actually mounts:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ tabsync-runtime                                           │
//! │                                                           │
//! │  KeyBinding ───── two-way sync with one KvStore key       │
//! │  AutosaveSession ─ debounced writes to a RemoteStore      │
//! │  SessionStore ──── cache-then-provider identity           │
//! │  SyncConfig ────── defaults + TOML + TABSYNC_* env        │
//! └──────────────┬────────────────────────────────────────────┘
//!                ▼
//!  tabsync-store (KvStore) · tabsync-event (notifier, hub)
//! ```
//!
//! External systems enter through two traits: [`RemoteStore`] for the
//! document backend and [`AuthProvider`] for identity. The [`testing`]
//! module ships in-memory doubles for both.
//!
//! # Example
//!
//! ```
//! use tabsync_runtime::{BindingConfig, KeyBinding};
//! use tabsync_store::{KvStore, MemoryBackend};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tabsync_store::StoreError> {
//! let store = KvStore::new(Arc::new(MemoryBackend::new()));
//! let binding = KeyBinding::bind(store, BindingConfig::new("theme", json!("light")))?;
//!
//! binding.set(&json!("dark"))?;
//! assert_eq!(binding.value(), json!("dark"));
//! # Ok(())
//! # }
//! ```

mod auth;
mod autosave;
mod binding;
mod config;
mod remote;
mod session;
pub mod testing;

pub use auth::{AuthProvider, AuthUser};
pub use autosave::{
    AutosaveConfig, AutosaveSession, SaveState, DEFAULT_DEBOUNCE, DEFAULT_VOLATILE_FIELDS,
};
pub use binding::{BindingConfig, KeyBinding};
pub use config::{ConfigError, SyncConfig};
pub use remote::{DocTarget, RemoteError, RemoteStore, WriteReceipt};
pub use session::{
    IdentitySource, SessionIdentity, SessionStore, DEFAULT_SESSION_CACHE_KEY,
};

// Re-exports so applications can wire the full stack from one crate
pub use tabsync_store::{FileBackend, KvStore, MemoryBackend, StorageBackend, StoreError};
pub use tabsync_store::{ChangeEvent, ChangeNotifier, ContextHub};
pub use tabsync_types::{ContextId, ErrorCode, ValueFormat};
