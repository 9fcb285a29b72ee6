//! Change events for store mutations.
//!
//! Every successful write or removal through the KV adapter produces
//! exactly one [`ChangeEvent`], observable by all bindings in the same
//! context and, for hub-attached stores, by sibling contexts.

use serde::{Deserialize, Serialize};
use tabsync_types::ContextId;

/// Where a change event was produced relative to the observer.
///
/// | Origin | Delivered via | Observed by |
/// |--------|---------------|-------------|
/// | `SameContext` | [`ChangeNotifier`](crate::ChangeNotifier) | bindings in the writing context |
/// | `CrossContext` | [`ContextHub`](crate::ContextHub) | bindings in every other context |
///
/// Consumers must not rely on origin for de-duplication — an echo of a
/// context's own write can arrive as `CrossContext` through a relay.
/// De-duplicate by comparing `new_raw` against the last known serialized
/// value instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Produced by a write in the observer's own context.
    SameContext,
    /// Produced by a write in another context sharing the store.
    CrossContext {
        /// The context that performed the write.
        from: ContextId,
    },
}

/// A key-level change notification.
///
/// `new_raw = None` signals deletion of the entry. The raw value is the
/// serialized form as stored, which is what consumers compare against
/// their de-duplication baseline.
///
/// # Example
///
/// ```
/// use tabsync_event::ChangeEvent;
///
/// let written = ChangeEvent::written("user", r#"{"uid":"a"}"#);
/// assert!(!written.is_removal());
/// assert!(written.matches_key("user"));
///
/// let removed = ChangeEvent::removed("user");
/// assert!(removed.is_removal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The key that changed.
    pub key: String,
    /// The raw stored value after the change; `None` signals deletion.
    pub new_raw: Option<String>,
    /// Where the change came from.
    pub origin: ChangeOrigin,
}

impl ChangeEvent {
    /// Creates a same-context event for a written value.
    #[must_use]
    pub fn written(key: impl Into<String>, new_raw: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_raw: Some(new_raw.into()),
            origin: ChangeOrigin::SameContext,
        }
    }

    /// Creates a same-context event for a removed entry.
    #[must_use]
    pub fn removed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            new_raw: None,
            origin: ChangeOrigin::SameContext,
        }
    }

    /// Returns a copy of this event re-originated as cross-context.
    ///
    /// The hub rewrites origin on delivery so receivers see who wrote.
    #[must_use]
    pub fn from_context(&self, from: ContextId) -> Self {
        Self {
            key: self.key.clone(),
            new_raw: self.new_raw.clone(),
            origin: ChangeOrigin::CrossContext { from },
        }
    }

    /// Returns `true` if this event signals deletion of the entry.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.new_raw.is_none()
    }

    /// Returns `true` if this event is for the given key.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        self.key == key
    }

    /// Returns `true` if this event crossed a context boundary.
    #[must_use]
    pub fn is_cross_context(&self) -> bool {
        matches!(self.origin, ChangeOrigin::CrossContext { .. })
    }
}
