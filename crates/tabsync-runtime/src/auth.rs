//! Identity provider interface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

/// An authenticated user as reported by the identity provider.
///
/// The `uid` is the only field with meaning to this crate; everything
/// else the provider supplies (display name, email, avatar, ...) rides
/// along in `profile` and is persisted and exposed untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Stable unique id of the user.
    pub uid: String,
    /// Provider-specific profile fields, carried verbatim.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl AuthUser {
    /// Creates a user with the given id and an empty profile.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            profile: Map::new(),
        }
    }

    /// Adds a profile field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.profile.insert(key.into(), value);
        self
    }
}

/// Source of authentication state changes.
///
/// The returned receiver carries the current state immediately on
/// subscription (`None` = signed out), then one update per sign-in or
/// sign-out. The [`SessionStore`](crate::SessionStore) treats every
/// observed value as authoritative.
pub trait AuthProvider: Send + Sync {
    /// Subscribes to authentication state.
    fn watch(&self) -> watch::Receiver<Option<AuthUser>>;
}
