//! Remote document store interface.
//!
//! The autosave worker talks to exactly one seam: [`RemoteStore`]. The
//! production implementation wraps whatever backs the documents; tests
//! use [`MemoryRemote`](crate::testing::MemoryRemote).

use serde_json::Value;
use std::future::Future;
use tabsync_types::ErrorCode;
use thiserror::Error;
use tokio::sync::watch;

/// Address of a remote document.
///
/// A target without a document id denotes a document that does not exist
/// yet; the first write creates it and the store assigns the id.
///
/// # Example
///
/// ```
/// use tabsync_runtime::DocTarget;
///
/// let new_doc = DocTarget::collection("drafts");
/// assert!(new_doc.is_new());
///
/// let existing = DocTarget::document("drafts", "d-42");
/// assert!(!existing.is_new());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTarget {
    /// Collection the document lives in.
    pub collection: String,
    /// Document id, or `None` for a document not yet created.
    pub document: Option<String>,
}

impl DocTarget {
    /// Targets a not-yet-created document in `collection`.
    #[must_use]
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document: None,
        }
    }

    /// Targets an existing document.
    #[must_use]
    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document: Some(id.into()),
        }
    }

    /// Returns `true` if the target has no document id yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.document.is_none()
    }
}

/// Acknowledgement of a completed remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Id of the written document (assigned by the store on creation).
    pub id: String,
}

/// Errors raised by a remote store.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The store could not be reached; retrying later may succeed.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write; retrying will not help.
    #[error("remote store rejected write: {0}")]
    Denied(String),
}

impl ErrorCode for RemoteError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "REMOTE_UNAVAILABLE",
            Self::Denied(_) => "REMOTE_DENIED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Asynchronous document store.
///
/// `merge = true` patches the given fields into the existing document;
/// `merge = false` replaces it. Writing to a target with no document id
/// creates the document and reports the assigned id in the receipt.
pub trait RemoteStore: Send + Sync {
    /// Writes `data` to the targeted document.
    fn write(
        &self,
        target: &DocTarget,
        data: Value,
        merge: bool,
    ) -> impl Future<Output = Result<WriteReceipt, RemoteError>> + Send;

    /// Subscribes to the targeted document's contents.
    ///
    /// The receiver observes the current contents immediately
    /// (`Value::Null` while the document does not exist) and every
    /// subsequent write. Dropping the receiver is the unsubscription.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Denied`] when the target has no document
    /// id yet; only existing (or at least addressed) documents can be
    /// listened to.
    fn subscribe(&self, target: &DocTarget) -> Result<watch::Receiver<Value>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_types::assert_error_codes;

    #[test]
    fn target_constructors() {
        let target = DocTarget::collection("drafts");
        assert_eq!(target.collection, "drafts");
        assert!(target.is_new());

        let target = DocTarget::document("drafts", "d-1");
        assert_eq!(target.document.as_deref(), Some("d-1"));
        assert!(!target.is_new());
    }

    #[test]
    fn codes_follow_convention() {
        assert_error_codes(
            &[
                RemoteError::Unavailable("offline".into()),
                RemoteError::Denied("read-only".into()),
            ],
            "REMOTE_",
        );
    }

    #[test]
    fn only_unavailable_is_recoverable() {
        assert!(RemoteError::Unavailable("offline".into()).is_recoverable());
        assert!(!RemoteError::Denied("read-only".into()).is_recoverable());
    }
}
