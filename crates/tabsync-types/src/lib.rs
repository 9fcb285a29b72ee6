//! Core types for TabSync.
//!
//! This crate provides the identifier, value-format, and error-code types
//! shared by every TabSync crate.
//!
//! # Crate Architecture
//!
//! This crate is the bottom of the **SDK layer**:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SDK Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  tabsync-types : ContextId, ValueFormat, ErrorCode ◄── HERE │
//! │  tabsync-event : ChangeEvent, ChangeNotifier, ContextHub    │
//! │  tabsync-store : StorageBackend, KvStore                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                          │
//! │  tabsync-runtime : KeyBinding, AutosaveSession,             │
//! │                    SessionStore                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use tabsync_types::{ContextId, ValueFormat};
//!
//! // Each execution context (think: one browser tab) gets an identity.
//! let ctx = ContextId::new();
//! assert_ne!(ctx, ContextId::new());
//!
//! // Stored values are raw strings decoded through a declared format.
//! let value = ValueFormat::Json.decode("{\"uid\":\"abc\"}");
//! assert_eq!(value["uid"], "abc");
//!
//! // Corrupt cache data decodes to null, never an error.
//! assert!(ValueFormat::Json.decode("not json").is_null());
//! ```

mod error;
mod format;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use format::ValueFormat;
pub use id::ContextId;
