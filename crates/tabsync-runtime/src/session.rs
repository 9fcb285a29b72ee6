//! Session identity state.
//!
//! The [`SessionStore`] answers "who is signed in" with a deliberate
//! two-phase story: a cached identity is shown immediately on startup,
//! then the authoritative provider answer replaces it as soon as it
//! arrives. The source tag lets consumers tell the phases apart:
//!
//! ```text
//! Unknown ──seed──► Cache ──provider event──► Provider
//!    │                                           ▲
//!    └───────────────provider event──────────────┘
//! ```
//!
//! The provider always wins; once an identity carries
//! [`IdentitySource::Provider`] it is never downgraded.

use crate::auth::{AuthProvider, AuthUser};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tabsync_store::KvStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Which phase produced an identity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Nothing has been established yet.
    #[default]
    #[serde(rename = "undefined")]
    Unknown,
    /// Tentative identity seeded from the persistent cache.
    Cache,
    /// Authoritative identity reported by the provider.
    Provider,
}

/// The current session identity.
///
/// `uid: None` with `source: Provider` means "definitely signed out";
/// with `source: Unknown` it means "not yet established".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Which phase produced this value.
    ///
    /// Tolerated as absent in cached data (reads as `Unknown`); the
    /// seeding path overrides it anyway.
    #[serde(default)]
    pub source: IdentitySource,
    /// Stable user id, absent when signed out.
    pub uid: Option<String>,
    /// Provider profile fields, carried verbatim.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl SessionIdentity {
    /// The not-yet-established identity.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            source: IdentitySource::Unknown,
            uid: None,
            profile: Map::new(),
        }
    }

    /// The authoritative signed-out identity.
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            source: IdentitySource::Provider,
            uid: None,
            profile: Map::new(),
        }
    }

    /// Builds an identity from a provider user.
    #[must_use]
    pub fn from_user(source: IdentitySource, user: AuthUser) -> Self {
        Self {
            source,
            uid: Some(user.uid),
            profile: user.profile,
        }
    }

    /// Returns `true` if a user is signed in.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.uid.is_some()
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Default cache key for the persisted identity.
pub const DEFAULT_SESSION_CACHE_KEY: &str = "user";

/// Reactive store of the session identity, persisted to a [`KvStore`].
///
/// # Persistence Rules
///
/// On every accepted identity change:
/// - source `Unknown` — nothing is persisted;
/// - no uid — the cached entry is removed;
/// - otherwise — the full identity is written under the cache key.
///
/// Persistence failures are logged and swallowed; the in-memory identity
/// is updated regardless.
///
/// # Example
///
/// ```
/// use tabsync_runtime::testing::FakeAuthProvider;
/// use tabsync_runtime::{AuthUser, IdentitySource, SessionStore};
/// use tabsync_store::{KvStore, MemoryBackend};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = KvStore::new(Arc::new(MemoryBackend::new()));
/// let auth = FakeAuthProvider::signed_in(AuthUser::new("abc"));
///
/// let session = SessionStore::new(store);
/// assert!(session.initialize(&auth));
///
/// tokio::time::sleep(std::time::Duration::from_millis(20)).await;
/// let identity = session.current();
/// assert_eq!(identity.uid.as_deref(), Some("abc"));
/// assert_eq!(identity.source, IdentitySource::Provider);
/// # }
/// ```
pub struct SessionStore {
    store: KvStore,
    cache_key: String,
    identity_tx: Arc<watch::Sender<SessionIdentity>>,
    initialized: AtomicBool,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Creates a session store persisting under the default cache key.
    #[must_use]
    pub fn new(store: KvStore) -> Self {
        Self::with_cache_key(store, DEFAULT_SESSION_CACHE_KEY)
    }

    /// Creates a session store persisting under `cache_key`.
    #[must_use]
    pub fn with_cache_key(store: KvStore, cache_key: impl Into<String>) -> Self {
        let (identity_tx, _) = watch::channel(SessionIdentity::unknown());
        Self {
            store,
            cache_key: cache_key.into(),
            identity_tx: Arc::new(identity_tx),
            initialized: AtomicBool::new(false),
            watcher: Mutex::new(None),
        }
    }

    /// Seeds from the cache and subscribes to the provider.
    ///
    /// Idempotent: only the first call (since construction or the last
    /// [`shutdown`](Self::shutdown)) does anything. Returns whether this
    /// call performed the initialization.
    ///
    /// Must be called inside a tokio runtime.
    pub fn initialize<A: AuthProvider>(&self, auth: &A) -> bool {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return false;
        }

        // Phase 1: show the cached identity, tentatively, right away
        match self.store.get_as::<SessionIdentity>(&self.cache_key) {
            Ok(Some(mut cached)) => {
                cached.source = IdentitySource::Cache;
                debug!(uid = ?cached.uid, "seeded identity from cache");
                apply_identity(&self.store, &self.cache_key, &self.identity_tx, cached);
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to read cached identity"),
        }

        // Phase 2: let the provider overwrite whatever we showed
        let rx = auth.watch();
        let store = self.store.clone();
        let cache_key = self.cache_key.clone();
        let identity_tx = Arc::clone(&self.identity_tx);
        let watcher = tokio::spawn(watch_provider(rx, store, cache_key, identity_tx));

        *self.watcher.lock() = Some(watcher);
        true
    }

    /// Returns a clone of the current identity.
    #[must_use]
    pub fn current(&self) -> SessionIdentity {
        self.identity_tx.borrow().clone()
    }

    /// Subscribes to identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionIdentity> {
        self.identity_tx.subscribe()
    }

    /// Removes the cached identity and resets to signed-out.
    pub fn clear(&self) {
        apply_identity(
            &self.store,
            &self.cache_key,
            &self.identity_tx,
            SessionIdentity::signed_out(),
        );
    }

    /// Detaches the provider subscription.
    ///
    /// The current identity is kept; [`initialize`](Self::initialize)
    /// may be called again afterwards.
    pub fn shutdown(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
        }
        self.initialized.store(false, Ordering::SeqCst);
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
        }
    }
}

async fn watch_provider(
    mut rx: watch::Receiver<Option<AuthUser>>,
    store: KvStore,
    cache_key: String,
    identity_tx: Arc<watch::Sender<SessionIdentity>>,
) {
    loop {
        // The current value counts as the first event
        let identity = match rx.borrow_and_update().clone() {
            Some(user) => SessionIdentity::from_user(IdentitySource::Provider, user),
            None => SessionIdentity::signed_out(),
        };
        apply_identity(&store, &cache_key, &identity_tx, identity);

        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Persists per the session rules, then publishes the identity.
fn apply_identity(
    store: &KvStore,
    cache_key: &str,
    identity_tx: &watch::Sender<SessionIdentity>,
    identity: SessionIdentity,
) {
    match (identity.source, identity.uid.as_deref()) {
        (IdentitySource::Unknown, _) => {}
        (_, None) => {
            if let Err(error) = store.remove(cache_key) {
                warn!(%error, "failed to remove cached identity");
            }
        }
        (_, Some(uid)) => {
            if let Err(error) = store.set(cache_key, &identity) {
                warn!(%error, uid, "failed to persist identity");
            }
        }
    }

    identity_tx.send_replace(identity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAuthProvider;
    use serde_json::json;
    use std::time::Duration;
    use tabsync_store::MemoryBackend;
    use tabsync_types::ValueFormat;

    fn memory_store() -> KvStore {
        KvStore::new(Arc::new(MemoryBackend::new()))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn source_serialization_matches_wire_names() {
        assert_eq!(
            serde_json::to_value(IdentitySource::Unknown).unwrap(),
            json!("undefined")
        );
        assert_eq!(
            serde_json::to_value(IdentitySource::Cache).unwrap(),
            json!("cache")
        );
        assert_eq!(
            serde_json::to_value(IdentitySource::Provider).unwrap(),
            json!("provider")
        );
    }

    #[test]
    fn identity_profile_flattens() {
        let user = AuthUser::new("abc").with_field("name", json!("Alex"));
        let identity = SessionIdentity::from_user(IdentitySource::Provider, user);

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["uid"], "abc");
        assert_eq!(json["name"], "Alex");
        assert_eq!(json["source"], "provider");
    }

    #[tokio::test]
    async fn provider_overwrites_cached_identity() {
        let store = memory_store();
        store
            .set(
                "user",
                &SessionIdentity::from_user(IdentitySource::Provider, AuthUser::new("cached-a")),
            )
            .unwrap();

        let auth = FakeAuthProvider::signed_in(AuthUser::new("provider-b"));
        let session = SessionStore::new(store.clone());

        assert!(session.initialize(&auth));
        // The seed is visible synchronously, before the provider answers
        let seeded = session.current();
        assert_eq!(seeded.source, IdentitySource::Cache);
        assert_eq!(seeded.uid.as_deref(), Some("cached-a"));

        settle().await;
        let identity = session.current();
        assert_eq!(identity.source, IdentitySource::Provider);
        assert_eq!(identity.uid.as_deref(), Some("provider-b"));

        // And the authoritative identity is what is cached now
        let cached: SessionIdentity = store.get_as("user").unwrap().unwrap();
        assert_eq!(cached.uid.as_deref(), Some("provider-b"));
    }

    #[tokio::test]
    async fn sign_out_removes_cached_entry() {
        let store = memory_store();
        let auth = FakeAuthProvider::signed_in(AuthUser::new("abc"));

        let session = SessionStore::new(store.clone());
        session.initialize(&auth);
        settle().await;
        assert!(store.raw("user").unwrap().is_some());

        auth.sign_out();
        settle().await;

        assert!(store.raw("user").unwrap().is_none());
        let identity = session.current();
        assert_eq!(identity.source, IdentitySource::Provider);
        assert!(!identity.is_signed_in());
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let store = memory_store();
        let auth = FakeAuthProvider::new();

        let session = SessionStore::new(store);
        assert!(session.initialize(&auth));
        assert!(!session.initialize(&auth));
    }

    #[tokio::test]
    async fn shutdown_allows_reinitialization() {
        let store = memory_store();
        let auth = FakeAuthProvider::new();

        let session = SessionStore::new(store);
        assert!(session.initialize(&auth));
        session.shutdown();
        assert!(session.initialize(&auth));
    }

    #[tokio::test]
    async fn shutdown_detaches_provider() {
        let store = memory_store();
        let auth = FakeAuthProvider::new();

        let session = SessionStore::new(store);
        session.initialize(&auth);
        settle().await;
        session.shutdown();

        auth.sign_in(AuthUser::new("late"));
        settle().await;

        assert!(!session.current().is_signed_in());
    }

    #[tokio::test]
    async fn clear_removes_cache_and_signs_out() {
        let store = memory_store();
        let auth = FakeAuthProvider::signed_in(AuthUser::new("abc"));

        let session = SessionStore::new(store.clone());
        session.initialize(&auth);
        settle().await;

        session.clear();

        assert!(store.get("user", ValueFormat::Json).unwrap().is_null());
        assert!(!session.current().is_signed_in());
    }

    #[tokio::test]
    async fn custom_cache_key_is_honored() {
        let store = memory_store();
        let auth = FakeAuthProvider::signed_in(AuthUser::new("abc"));

        let session = SessionStore::with_cache_key(store.clone(), "session/current");
        session.initialize(&auth);
        settle().await;

        assert!(store.raw("session/current").unwrap().is_some());
        assert!(store.raw("user").unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_cache_is_ignored_at_seed() {
        let backend = Arc::new(MemoryBackend::new());
        use tabsync_store::StorageBackend;
        backend.set_item("user", "{broken").unwrap();

        let store = KvStore::new(backend);
        let auth = FakeAuthProvider::new();
        let session = SessionStore::new(store);

        session.initialize(&auth);
        // Corrupt seed reads as absent; identity comes from the provider
        settle().await;
        assert_eq!(session.current().source, IdentitySource::Provider);
    }
}
