//! Change-event system for TabSync.
//!
//! This crate provides the typed change notifications that keep every
//! consumer of the persistent key/value store in sync, both within one
//! execution context and across sibling contexts sharing the same store.
//!
//! # Event Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Context X                               │
//! │  KvStore.set(key, v)                                             │
//! │      │                                                           │
//! │      ├─► ChangeNotifier ──► bindings in X   (same-context)       │
//! │      │                                                           │
//! │      └─► ContextHub ───────► contexts Y, Z  (cross-context,      │
//! │                              never back to X)                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two channels exist because the platform's native storage signal is
//! not delivered to the originating context: the adapter notifies its
//! own context directly through the [`ChangeNotifier`], and the
//! [`ContextHub`] carries the same payload to every *other* context.
//!
//! # De-duplication Contract
//!
//! Delivery order between the two channels is best-effort. A consumer
//! that already holds the serialized value equal to an incoming event's
//! `new_raw` must discard the event — this is what prevents feedback
//! loops when a context receives an echo of its own write. See
//! `KeyBinding` in `tabsync-runtime` for the reference consumer.
//!
//! # Usage
//!
//! ```
//! use tabsync_event::{ChangeEvent, ChangeNotifier, ContextHub};
//! use tabsync_types::ContextId;
//!
//! // Same-context fan-out
//! let notifier = ChangeNotifier::new();
//! let mut rx = notifier.subscribe();
//! notifier.emit(ChangeEvent::written("user", r#"{"uid":"a"}"#));
//! assert_eq!(rx.try_recv().unwrap().key, "user");
//!
//! // Cross-context fan-out skips the originator
//! let hub = ContextHub::new();
//! let tab_a = ContextId::named("a");
//! let tab_b = ContextId::named("b");
//! let mut rx_a = hub.register(tab_a);
//! let mut rx_b = hub.register(tab_b);
//!
//! let delivered = hub.publish_from(tab_a, ChangeEvent::removed("user"));
//! assert_eq!(delivered, 1);
//! assert!(rx_a.try_recv().is_err()); // originator is skipped
//! assert!(rx_b.try_recv().unwrap().is_removal());
//! ```

mod change;
mod hub;
mod notifier;

pub use change::{ChangeEvent, ChangeOrigin};
pub use hub::ContextHub;
pub use notifier::{ChangeNotifier, EVENT_CHANNEL_CAPACITY};

// Re-export for convenience
pub use tabsync_types::ContextId;
