//! Test doubles for the external interfaces.
//!
//! These live in the library (not behind `cfg(test)`) so downstream
//! crates can exercise their own sync wiring without a real remote store
//! or identity provider.

use crate::auth::{AuthProvider, AuthUser};
use crate::remote::{DocTarget, RemoteError, RemoteStore, WriteReceipt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// One write as observed by [`MemoryRemote`].
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    /// Target exactly as the caller addressed it.
    pub target: DocTarget,
    /// Payload exactly as submitted (after any stamping).
    pub data: Value,
    /// Whether the caller requested a merge.
    pub merge: bool,
}

/// In-memory [`RemoteStore`] that records every write.
///
/// Created documents get ids `doc-1`, `doc-2`, ... in creation order.
/// A failure can be scripted for the next write via
/// [`fail_next`](Self::fail_next). Document contents are kept per
/// target so [`subscribe`](RemoteStore::subscribe) observes writes.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    writes: Mutex<Vec<RecordedWrite>>,
    documents: Mutex<HashMap<String, watch::Sender<Value>>>,
    next_failure: Mutex<Option<RemoteError>>,
    created: AtomicU64,
}

impl MemoryRemote {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next write to fail with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        *self.next_failure.lock() = Some(error);
    }

    /// Returns all recorded writes in order.
    #[must_use]
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    fn doc_channel(&self, collection: &str, id: &str) -> watch::Sender<Value> {
        self.documents
            .lock()
            .entry(format!("{collection}/{id}"))
            .or_insert_with(|| watch::channel(Value::Null).0)
            .clone()
    }
}

/// Patches `patch`'s top-level fields into `current`; non-object
/// payloads replace the document wholesale.
fn merge_into(current: &mut Value, patch: &Value) {
    match (current.as_object_mut(), patch.as_object()) {
        (Some(current), Some(patch)) => {
            for (key, value) in patch {
                current.insert(key.clone(), value.clone());
            }
        }
        _ => *current = patch.clone(),
    }
}

impl RemoteStore for MemoryRemote {
    fn write(
        &self,
        target: &DocTarget,
        data: Value,
        merge: bool,
    ) -> impl Future<Output = Result<WriteReceipt, RemoteError>> + Send {
        let result = match self.next_failure.lock().take() {
            Some(error) => Err(error),
            None => {
                let id = target.document.clone().unwrap_or_else(|| {
                    format!("doc-{}", self.created.fetch_add(1, Ordering::SeqCst) + 1)
                });
                self.writes.lock().push(RecordedWrite {
                    target: target.clone(),
                    data: data.clone(),
                    merge,
                });

                self.doc_channel(&target.collection, &id).send_modify(|current| {
                    if merge && !current.is_null() {
                        merge_into(current, &data);
                    } else {
                        *current = data.clone();
                    }
                });

                Ok(WriteReceipt { id })
            }
        };
        std::future::ready(result)
    }

    fn subscribe(&self, target: &DocTarget) -> Result<watch::Receiver<Value>, RemoteError> {
        let Some(id) = target.document.as_deref() else {
            return Err(RemoteError::Denied(
                "cannot subscribe to a document with no id".into(),
            ));
        };
        Ok(self.doc_channel(&target.collection, id).subscribe())
    }
}

/// Scriptable [`AuthProvider`].
#[derive(Debug)]
pub struct FakeAuthProvider {
    state: watch::Sender<Option<AuthUser>>,
}

impl FakeAuthProvider {
    /// Starts signed out.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Starts already signed in as `user`.
    #[must_use]
    pub fn signed_in(user: AuthUser) -> Self {
        let (state, _) = watch::channel(Some(user));
        Self { state }
    }

    /// Signs a user in.
    pub fn sign_in(&self, user: AuthUser) {
        self.state.send_replace(Some(user));
    }

    /// Signs the current user out.
    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }
}

impl Default for FakeAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for FakeAuthProvider {
    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }
}
