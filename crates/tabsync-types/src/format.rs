//! Stored-value formats.
//!
//! The underlying persistent store only accepts strings. Every entry
//! therefore has a declared format describing how its raw string maps
//! to a logical value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared format of a stored entry.
///
/// # Corruption Tolerance
///
/// Decoding never fails: a raw string that does not parse as JSON under
/// [`ValueFormat::Json`] decodes to [`Value::Null`]. Callers must not be
/// able to distinguish "never set" from "corrupted" — both read as null.
///
/// # Example
///
/// ```
/// use tabsync_types::ValueFormat;
/// use serde_json::json;
///
/// assert_eq!(ValueFormat::Json.decode(r#"{"a":1}"#), json!({"a":1}));
/// assert_eq!(ValueFormat::Text.decode("hello"), json!("hello"));
///
/// // Corrupt JSON reads as null, never an error.
/// assert!(ValueFormat::Json.decode("{oops").is_null());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    /// Raw string is a canonical JSON document.
    #[default]
    Json,
    /// Raw string is the value itself.
    Text,
}

impl ValueFormat {
    /// Decodes a raw stored string into a logical value.
    ///
    /// For [`ValueFormat::Json`], a parse failure yields [`Value::Null`].
    /// For [`ValueFormat::Text`], the raw string is wrapped as-is.
    #[must_use]
    pub fn decode(&self, raw: &str) -> Value {
        match self {
            Self::Json => serde_json::from_str(raw).unwrap_or(Value::Null),
            Self::Text => Value::String(raw.to_string()),
        }
    }

    /// Decodes an optional raw string, mapping absence to [`Value::Null`].
    #[must_use]
    pub fn decode_opt(&self, raw: Option<&str>) -> Value {
        match raw {
            Some(raw) => self.decode(raw),
            None => Value::Null,
        }
    }
}
