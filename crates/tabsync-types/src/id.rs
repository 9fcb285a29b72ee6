//! Identifier types for TabSync.
//!
//! Identifiers are UUID-based so that events can be attributed to an
//! originating context across process boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::{uuid, Uuid};

/// TabSync namespace UUID for deterministic UUID v5 generation.
///
/// Used as the namespace when deriving stable context IDs from names,
/// so fixtures and tests get the same ID on every run.
const TABSYNC_NAMESPACE: Uuid = uuid!("6f1c2a84-50db-4f0e-9b44-7c1de2a9c3b1");

/// Identifier for one execution context sharing a persistent store.
///
/// A context corresponds to one browser tab, window, or embedded view:
/// an independent event loop with its own in-memory state, sharing the
/// durable key/value store with sibling contexts. The [`ContextHub`]
/// uses this identity to skip the originator when fanning out
/// cross-context change events.
///
/// # UUID Strategy
///
/// - **Fresh contexts**: UUID v4 (random), one per [`ContextId::new`]
/// - **Named contexts**: UUID v5 (deterministic from name), for test
///   fixtures that need stable identity across runs
///
/// # Example
///
/// ```
/// use tabsync_types::ContextId;
///
/// // Fresh: unique per call
/// let a = ContextId::new();
/// let b = ContextId::new();
/// assert_ne!(a, b);
///
/// // Named: same name, same ID
/// let t1 = ContextId::named("tab-1");
/// let t2 = ContextId::named("tab-1");
/// assert_eq!(t1, t2);
/// ```
///
/// [`ContextHub`]: https://docs.rs/tabsync-event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Creates a fresh context ID with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic context ID derived from a name.
    ///
    /// The UUID is derived from the TabSync namespace UUID and the name
    /// via UUID v5 (SHA-1 based), so the same name always produces the
    /// same ID across processes and machines.
    ///
    /// # Example
    ///
    /// ```
    /// use tabsync_types::ContextId;
    ///
    /// let main = ContextId::named("main");
    /// let side = ContextId::named("sidebar");
    /// assert_eq!(main, ContextId::named("main"));
    /// assert_ne!(main, side);
    /// ```
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Uuid::new_v5(&TABSYNC_NAMESPACE, name.as_bytes()))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        let a = ContextId::new();
        let b = ContextId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn named_ids_are_deterministic() {
        assert_eq!(ContextId::named("tab-1"), ContextId::named("tab-1"));
        assert_ne!(ContextId::named("tab-1"), ContextId::named("tab-2"));
    }

    #[test]
    fn named_differs_from_fresh() {
        // Vanishingly unlikely to collide; the point is they are distinct kinds.
        assert_ne!(ContextId::named("tab-1"), ContextId::new());
    }

    #[test]
    fn serde_round_trip() {
        let id = ContextId::named("serde");
        let json = serde_json::to_string(&id).unwrap();
        let back: ContextId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn display_is_uuid_format() {
        let id = ContextId::named("display");
        let shown = id.to_string();
        assert_eq!(shown.len(), 36);
        assert_eq!(shown, id.as_uuid().to_string());
    }
}
