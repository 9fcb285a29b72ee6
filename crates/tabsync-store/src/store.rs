//! The key/value store adapter.

use crate::{StorageBackend, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tabsync_event::{ChangeEvent, ChangeNotifier, ContextHub};
use tabsync_types::{ContextId, ValueFormat};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Adapter over a [`StorageBackend`] with serialization, corruption
/// tolerance, and change notification.
///
/// The store is constructed explicitly by the application's composition
/// root and passed (cloned) to every component that needs it — there is
/// no process-global instance, so tests can wire doubles freely.
///
/// # Event Contract
///
/// Every successful `set`/`set_text`/`remove` emits exactly one
/// same-context [`ChangeEvent`] and, when a [`ContextHub`] is attached,
/// one cross-context publication. Failed operations emit nothing.
///
/// # Visibility
///
/// All operations are synchronous: within one context a `set` is
/// visible to every `get` issued afterwards on the same thread.
///
/// # Example
///
/// ```
/// use tabsync_store::{ContextHub, KvStore, MemoryBackend};
/// use tabsync_types::{ContextId, ValueFormat};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// // Two "tabs" sharing one backend and one hub
/// let backend = Arc::new(MemoryBackend::new());
/// let hub = ContextHub::new();
///
/// let tab_a = KvStore::new(backend.clone())
///     .with_context(ContextId::named("a"))
///     .with_hub(hub.clone());
/// let tab_b = KvStore::new(backend)
///     .with_context(ContextId::named("b"))
///     .with_hub(hub);
///
/// let mut cross = tab_b.subscribe_cross();
/// tab_a.set("user", &json!({"uid": "abc"})).unwrap();
///
/// // Tab B reads the shared backend and hears about the change
/// assert_eq!(tab_b.get("user", ValueFormat::Json).unwrap()["uid"], "abc");
/// assert!(cross.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct KvStore {
    backend: Arc<dyn StorageBackend>,
    notifier: ChangeNotifier,
    context: ContextId,
    hub: Option<ContextHub>,
    /// Keeps `subscribe_cross` receivers pending (not closed) when no
    /// hub is attached.
    dormant: broadcast::Sender<ChangeEvent>,
}

impl KvStore {
    /// Creates a store over `backend` with a fresh context identity and
    /// no cross-context hub.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let (dormant, _) = broadcast::channel(1);
        Self {
            backend,
            notifier: ChangeNotifier::new(),
            context: ContextId::new(),
            hub: None,
            dormant,
        }
    }

    /// Sets the context identity for this store.
    #[must_use]
    pub fn with_context(mut self, context: ContextId) -> Self {
        self.context = context;
        self
    }

    /// Attaches a cross-context hub, registering this store's context.
    #[must_use]
    pub fn with_hub(self, hub: ContextHub) -> Self {
        let _ = hub.register(self.context);
        Self {
            hub: Some(hub),
            ..self
        }
    }

    /// Returns this store's context identity.
    #[must_use]
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// Serializes `value` as canonical JSON and stores it under `key`.
    ///
    /// Returns the raw string written, which consumers record as their
    /// de-duplication baseline.
    ///
    /// # Errors
    ///
    /// [`StoreError::Serialize`] if the value cannot be serialized;
    /// [`StoreError::Backend`] if the underlying store rejects the
    /// write (e.g. quota exceeded). Never panics.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<String, StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::serialize(key, e))?;
        self.write_raw(key, raw)
    }

    /// Stores a string verbatim (pass-through, no JSON quoting).
    ///
    /// Use this for entries declared [`ValueFormat::Text`].
    pub fn set_text(&self, key: &str, text: &str) -> Result<String, StoreError> {
        self.write_raw(key, text.to_string())
    }

    fn write_raw(&self, key: &str, raw: String) -> Result<String, StoreError> {
        if let Err(e) = self.backend.set_item(key, &raw) {
            warn!(key, error = %e, "storage write failed");
            return Err(e.into());
        }

        debug!(key, raw = raw.as_str(), "stored entry");
        self.fan_out(ChangeEvent::written(key, raw.clone()));
        Ok(raw)
    }

    /// Reads the logical value under `key`.
    ///
    /// A missing entry or corrupt JSON yields [`Value::Null`]: callers
    /// must not be able to distinguish "never set" from "corrupted".
    ///
    /// # Errors
    ///
    /// Only backend failures are errors; decode failures are not.
    pub fn get(&self, key: &str, format: ValueFormat) -> Result<Value, StoreError> {
        let raw = self.backend.get_item(key)?;
        Ok(format.decode_opt(raw.as_deref()))
    }

    /// Reads and deserializes the entry under `key`.
    ///
    /// Missing and corrupt entries both read as `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.backend.get_item(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry read as absent");
                Ok(None)
            }
        }
    }

    /// Reads the raw stored string under `key`, if any.
    pub fn raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.backend.get_item(key)?)
    }

    /// Deletes the entry under `key` and signals deletion.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the underlying store fails.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.backend.remove_item(key)?;
        debug!(key, "removed entry");
        self.fan_out(ChangeEvent::removed(key));
        Ok(())
    }

    /// Subscribes to changes made through this store instance and its
    /// clones (same-context channel).
    #[must_use]
    pub fn subscribe_local(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    /// Subscribes to changes made by sibling contexts through the
    /// attached hub (cross-context channel).
    ///
    /// Without a hub the receiver simply never fires.
    #[must_use]
    pub fn subscribe_cross(&self) -> broadcast::Receiver<ChangeEvent> {
        self.hub
            .as_ref()
            .and_then(|hub| hub.subscribe(self.context))
            .unwrap_or_else(|| self.dormant.subscribe())
    }

    fn fan_out(&self, event: ChangeEvent) {
        if let Some(hub) = &self.hub {
            hub.publish_from(self.context, event.clone());
        }
        self.notifier.emit(event);
    }
}
