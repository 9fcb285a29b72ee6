//! Store adapter error types.

use crate::BackendError;
use tabsync_types::ErrorCode;
use thiserror::Error;

/// Errors returned by [`KvStore`](crate::KvStore) operations.
///
/// These never escape as panics; the adapter catches every underlying
/// failure and returns it as a value, so callers decide whether to
/// degrade silently (the UI contract) while tests assert on the code.
///
/// | Error | Code | Recoverable |
/// |-------|------|-------------|
/// | Quota exceeded | `STORE_QUOTA_EXCEEDED` | Yes |
/// | Backend I/O | `STORE_IO` | Yes |
/// | Unserializable value | `STORE_SERIALIZE` | No |
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying store rejected or failed the operation.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The value could not be serialized for storage.
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        /// Key the write was intended for.
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Creates a serialization error for `key`.
    pub fn serialize(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            key: key.into(),
            source,
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(BackendError::QuotaExceeded { .. }) => "STORE_QUOTA_EXCEEDED",
            Self::Backend(BackendError::Io(_)) => "STORE_IO",
            Self::Serialize { .. } => "STORE_SERIALIZE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Space can be freed and I/O retried; a value that does not
        // serialize will not serialize next time either.
        matches!(self, Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsync_types::assert_error_codes;

    fn quota() -> StoreError {
        StoreError::Backend(BackendError::QuotaExceeded {
            key: "user".into(),
            used: 10,
            quota: 10,
        })
    }

    fn serialize_err() -> StoreError {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        StoreError::serialize("user", bad)
    }

    #[test]
    fn codes_follow_convention() {
        assert_error_codes(
            &[
                quota(),
                StoreError::Backend(BackendError::Io("disk".into())),
                serialize_err(),
            ],
            "STORE_",
        );
    }

    #[test]
    fn recoverability() {
        assert!(quota().is_recoverable());
        assert!(!serialize_err().is_recoverable());
    }

    #[test]
    fn display_mentions_key() {
        assert!(serialize_err().to_string().contains("user"));
        assert!(quota().to_string().contains("user"));
    }
}
