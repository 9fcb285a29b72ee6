//! Same-context change fan-out.

use crate::ChangeEvent;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the channel reports lag.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// In-context publish/subscribe channel for [`ChangeEvent`]s.
///
/// The notifier delivers every successful store mutation to all
/// subscribers within the same execution context, immediately after the
/// mutating call returns. This stands in for re-dispatching the
/// platform's storage signal to the current window, which the platform
/// itself never does.
///
/// # Delivery Semantics
///
/// - Fire and forget: [`emit`](Self::emit) never fails. With no live
///   subscribers the event is dropped.
/// - Each subscriber gets an independent buffered receiver; a slow
///   subscriber lags and misses old events rather than blocking the
///   writer.
///
/// # Example
///
/// ```
/// use tabsync_event::{ChangeEvent, ChangeNotifier};
///
/// let notifier = ChangeNotifier::new();
/// let mut rx = notifier.subscribe();
///
/// notifier.emit(ChangeEvent::written("theme", "\"dark\""));
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.key, "theme");
/// ```
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Creates a notifier with the default per-subscriber buffer.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribes to all events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers.
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
