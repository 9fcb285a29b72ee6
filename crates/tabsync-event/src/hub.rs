//! Cross-context change delivery.

use crate::{ChangeEvent, EVENT_CHANNEL_CAPACITY};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tabsync_types::ContextId;
use tokio::sync::broadcast;
use tracing::debug;

/// Explicit registry of contexts sharing one persistent store.
///
/// The hub models the platform's cross-context storage signal: a write
/// in one context is delivered to every *other* registered context, but
/// never back to the originator (same-context delivery is the
/// [`ChangeNotifier`](crate::ChangeNotifier)'s job). Unlike the
/// platform's global event, the hub is an explicitly constructed object
/// handed to each store, so tests can wire any topology they need.
///
/// # Delivery Semantics
///
/// - Best-effort: contexts with full buffers or dropped receivers are
///   skipped; [`publish_from`](Self::publish_from) reports how many
///   contexts actually received the event.
/// - On delivery the event's origin is rewritten to
///   [`ChangeOrigin::CrossContext`](crate::ChangeOrigin) carrying the
///   writer's [`ContextId`].
/// - No ordering guarantee relative to same-context delivery; consumers
///   de-duplicate by payload, not by ordering.
///
/// # Example
///
/// ```
/// use tabsync_event::{ChangeEvent, ContextHub};
/// use tabsync_types::ContextId;
///
/// let hub = ContextHub::new();
/// let a = ContextId::named("a");
/// let b = ContextId::named("b");
///
/// let mut rx_a = hub.register(a);
/// let mut rx_b = hub.register(b);
///
/// hub.publish_from(a, ChangeEvent::written("user", "{}"));
///
/// assert!(rx_a.try_recv().is_err());        // not echoed to the writer
/// assert!(rx_b.try_recv().is_ok());         // delivered to the sibling
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextHub {
    contexts: Arc<RwLock<HashMap<ContextId, broadcast::Sender<ChangeEvent>>>>,
}

impl ContextHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context and returns its event receiver.
    ///
    /// Registering the same context again replaces its channel; old
    /// receivers stop getting events.
    pub fn register(&self, context: ContextId) -> broadcast::Receiver<ChangeEvent> {
        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        self.contexts.write().insert(context, tx);
        rx
    }

    /// Returns an additional receiver for an already-registered context.
    ///
    /// Each binding in a context subscribes separately; all of them see
    /// every event delivered to that context. Returns `None` if the
    /// context was never registered.
    #[must_use]
    pub fn subscribe(&self, context: ContextId) -> Option<broadcast::Receiver<ChangeEvent>> {
        self.contexts.read().get(&context).map(|tx| tx.subscribe())
    }

    /// Removes a context from the hub.
    ///
    /// Its receivers observe a closed channel and get no further events.
    pub fn unregister(&self, context: ContextId) {
        self.contexts.write().remove(&context);
    }

    /// Publishes an event to every registered context except the origin.
    ///
    /// The event's origin is rewritten to `CrossContext { from: origin }`
    /// before delivery. Returns the number of contexts that received it.
    pub fn publish_from(&self, origin: ContextId, event: ChangeEvent) -> usize {
        let outbound = event.from_context(origin);
        let contexts = self.contexts.read();

        let mut delivered = 0;
        for (context, tx) in contexts.iter() {
            if *context == origin {
                continue;
            }
            if tx.send(outbound.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!(key = %outbound.key, %origin, delivered, "published cross-context change");
        delivered
    }

    /// Returns the number of registered contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.read().len()
    }
}
