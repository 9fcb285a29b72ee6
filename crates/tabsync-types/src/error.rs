//! Unified error interface for TabSync.
//!
//! Every fallible operation in the workspace returns a typed error enum
//! implementing [`ErrorCode`]. Nothing in the sync core panics or throws
//! past its component boundary; failures are values, and tests assert on
//! error codes rather than log output.
//!
//! # Example
//!
//! ```
//! use tabsync_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum CacheError {
//!     QuotaExceeded,
//!     Corrupt(String),
//! }
//!
//! impl ErrorCode for CacheError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::QuotaExceeded => "CACHE_QUOTA_EXCEEDED",
//!             Self::Corrupt(_) => "CACHE_CORRUPT",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         // The user can free space; corruption won't fix itself.
//!         matches!(self, Self::QuotaExceeded)
//!     }
//! }
//!
//! let err = CacheError::QuotaExceeded;
//! assert_eq!(err.code(), "CACHE_QUOTA_EXCEEDED");
//! assert!(err.is_recoverable());
//! ```

/// Unified error code interface for TabSync errors.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g., `"STORE_QUOTA_EXCEEDED"`
/// - **Domain-prefixed**: e.g., `"STORE_"`, `"REMOTE_"`, `"CONFIG_"`
/// - **Stable**: codes are an API contract and do not change once defined
///
/// # Recoverability
///
/// An error is recoverable when retrying may succeed or the user can take
/// corrective action (transient remote failure, full store). It is not
/// recoverable when retrying cannot help (invalid input, unserializable
/// value).
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying or user action may resolve the error.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows TabSync conventions.
///
/// # Checks
///
/// 1. Code is UPPER_SNAKE_CASE
/// 2. Code starts with the expected domain prefix
/// 3. Code is not empty
///
/// # Panics
///
/// Panics with a descriptive message if validation fails. Intended for
/// use in tests covering every variant of an error enum.
///
/// # Example
///
/// ```
/// use tabsync_types::{ErrorCode, assert_error_code};
///
/// #[derive(Debug)]
/// enum MyError { Full }
///
/// impl ErrorCode for MyError {
///     fn code(&self) -> &'static str { "STORE_FULL" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&MyError::Full, "STORE_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");

    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );

    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates multiple error codes at once.
///
/// Use this to verify all variants of an error enum share a prefix.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

/// Checks if a string is UPPER_SNAKE_CASE.
fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    if s.starts_with('_') || s.ends_with('_') {
        return false;
    }

    if s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn error_code_trait() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn assert_error_code_valid() {
        assert_error_code(&TestError::Transient, "TEST_");
    }

    #[test]
    fn assert_error_codes_all_variants() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_error_code_wrong_prefix() {
        assert_error_code(&TestError::Transient, "WRONG_");
    }

    #[test]
    fn is_upper_snake_case_valid() {
        assert!(is_upper_snake_case("STORE"));
        assert!(is_upper_snake_case("STORE_QUOTA_EXCEEDED"));
        assert!(is_upper_snake_case("ERR_2"));
    }

    #[test]
    fn is_upper_snake_case_invalid() {
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("store"));
        assert!(!is_upper_snake_case("Store_Full"));
        assert!(!is_upper_snake_case("_STORE"));
        assert!(!is_upper_snake_case("STORE_"));
        assert!(!is_upper_snake_case("STORE__FULL"));
    }
}
