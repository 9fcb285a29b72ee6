//! Reactive binding of local state to one store key.
//!
//! A [`KeyBinding`] keeps an in-memory value synchronized with a
//! [`KvStore`] entry in both directions:
//!
//! ```text
//! set(v) ──► KvStore ──► ChangeNotifier ──┐
//!    │                                    │  (suppressed: raw == baseline)
//!    └──► watch value + baseline ◄────────┘
//!
//! sibling context write ──► ContextHub ──► apply + new baseline
//! ```
//!
//! The baseline is the raw serialized form of the last value this
//! binding wrote or adopted. Incoming events carrying that exact raw
//! string are echoes of our own state and are discarded; everything else
//! replaces the in-memory value.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tabsync_event::ChangeEvent;
use tabsync_store::{KvStore, StoreError};
use tabsync_types::ValueFormat;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Configuration for a [`KeyBinding`].
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Store key the binding is attached to.
    pub key: String,
    /// Value adopted when the key is absent or deleted.
    pub default_value: Value,
    /// How raw stored strings decode to values.
    pub format: ValueFormat,
    /// Read the store synchronously at bind time.
    pub seed_on_mount: bool,
}

impl BindingConfig {
    /// JSON binding with seeding enabled.
    #[must_use]
    pub fn new(key: impl Into<String>, default_value: Value) -> Self {
        Self {
            key: key.into(),
            default_value,
            format: ValueFormat::Json,
            seed_on_mount: true,
        }
    }

    /// Sets the decode format.
    #[must_use]
    pub fn format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    /// Disables the synchronous read at bind time.
    #[must_use]
    pub fn without_seed(mut self) -> Self {
        self.seed_on_mount = false;
        self
    }
}

/// A live two-way binding between an in-memory value and a store key.
///
/// Must be created inside a tokio runtime; the listener runs as a
/// spawned task until [`detach`](Self::detach) or drop.
///
/// # Example
///
/// ```
/// use tabsync_runtime::{BindingConfig, KeyBinding};
/// use tabsync_store::{KvStore, MemoryBackend};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tabsync_store::StoreError> {
/// let store = KvStore::new(Arc::new(MemoryBackend::new()));
/// let binding = KeyBinding::bind(store.clone(), BindingConfig::new("theme", json!("light")))?;
///
/// assert_eq!(binding.value(), json!("light"));   // default: key absent
/// binding.set(&json!("dark"))?;
/// assert_eq!(binding.value(), json!("dark"));
/// assert_eq!(store.raw("theme")?.as_deref(), Some("\"dark\""));
/// # Ok(())
/// # }
/// ```
pub struct KeyBinding {
    store: KvStore,
    key: String,
    format: ValueFormat,
    value_tx: Arc<watch::Sender<Value>>,
    baseline: Arc<Mutex<Option<String>>>,
    listener: JoinHandle<()>,
}

impl KeyBinding {
    /// Binds to `config.key` on `store` and starts the listener task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the seeding read fails. A missing or
    /// corrupt entry is not an error; the default value is adopted.
    pub fn bind(store: KvStore, config: BindingConfig) -> Result<Self, StoreError> {
        let BindingConfig {
            key,
            default_value,
            format,
            seed_on_mount,
        } = config;

        let (initial, initial_raw) = if seed_on_mount {
            match store.raw(&key)? {
                Some(raw) => (format.decode(&raw), Some(raw)),
                None => (default_value.clone(), None),
            }
        } else {
            (default_value.clone(), None)
        };

        let (value_tx, _) = watch::channel(initial);
        let value_tx = Arc::new(value_tx);
        let baseline = Arc::new(Mutex::new(initial_raw));

        // Subscribe before returning: broadcast receivers only see events
        // sent after subscription, so doing this inside the task would
        // lose any write landing before its first poll.
        let local = store.subscribe_local();
        let cross = store.subscribe_cross();

        let listener = tokio::spawn(listen(
            store.clone(),
            key.clone(),
            format,
            default_value,
            Arc::clone(&value_tx),
            Arc::clone(&baseline),
            local,
            cross,
        ));

        Ok(Self {
            store,
            key,
            format,
            value_tx,
            baseline,
            listener,
        })
    }

    /// Returns the bound key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value_tx.borrow().clone()
    }

    /// Subscribes to value changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Value> {
        self.value_tx.subscribe()
    }

    /// Writes `value` through to the store and adopts it locally.
    ///
    /// The store write, the baseline update, and the in-memory update
    /// all complete before this returns, so the notification produced by
    /// the write is recognized as an echo and discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store rejects the write; local
    /// state is left unchanged in that case.
    pub fn set(&self, value: &Value) -> Result<(), StoreError> {
        let raw = match self.format {
            ValueFormat::Json => self.store.set(&self.key, value)?,
            ValueFormat::Text => {
                let text = value
                    .as_str()
                    .map(str::to_owned)
                    .unwrap_or_else(|| value.to_string());
                self.store.set_text(&self.key, &text)?
            }
        };

        let decoded = self.format.decode(&raw);
        *self.baseline.lock() = Some(raw);
        self.value_tx.send_replace(decoded);
        Ok(())
    }

    /// Stops the listener; no value update is observed afterwards.
    pub fn detach(&self) {
        self.listener.abort();
    }
}

impl Drop for KeyBinding {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Listener loop: applies non-echo events for the bound key from both
/// delivery channels.
#[allow(clippy::too_many_arguments)]
async fn listen(
    store: KvStore,
    key: String,
    format: ValueFormat,
    default_value: Value,
    value_tx: Arc<watch::Sender<Value>>,
    baseline: Arc<Mutex<Option<String>>>,
    mut local: broadcast::Receiver<ChangeEvent>,
    mut cross: broadcast::Receiver<ChangeEvent>,
) {
    loop {
        let event = tokio::select! {
            event = local.recv() => event,
            event = cross.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(key, missed, "binding lagged behind change events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if !event.matches_key(&key) {
            continue;
        }

        apply(&store, &event, &format, &default_value, &value_tx, &baseline, &key);
    }
}

fn apply(
    store: &KvStore,
    event: &ChangeEvent,
    format: &ValueFormat,
    default_value: &Value,
    value_tx: &watch::Sender<Value>,
    baseline: &Mutex<Option<String>>,
    key: &str,
) {
    // An event that no longer matches what the store holds is stale:
    // either a superseded write of our own or an already-overwritten
    // sibling write. The event for the store's current raw follows.
    let current = match store.raw(key) {
        Ok(current) => current,
        Err(error) => {
            warn!(key, %error, "failed to re-read store for change event");
            return;
        }
    };
    if event.new_raw != current {
        debug!(key, "discarded stale change event");
        return;
    }

    let mut baseline = baseline.lock();
    if event.new_raw == *baseline {
        debug!(key, "discarded echo of own state");
        return;
    }

    let next = match event.new_raw.as_deref() {
        Some(raw) => format.decode(raw),
        None => default_value.clone(),
    };

    *baseline = event.new_raw.clone();
    value_tx.send_replace(next);
    debug!(key, cross = event.is_cross_context(), "applied external change");
}
