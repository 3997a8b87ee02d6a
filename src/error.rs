//! Error types for the polycache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by runtime cache operations. The variants are
//!   plain values, compare them with `==` or `matches!`.
//! - [`ConfigError`]: Returned by [`CacheBuilder::try_build`] when the
//!   configuration cannot produce a usable cache (e.g. zero size for a
//!   bounded policy).
//!
//! ## Example Usage
//!
//! ```
//! use polycache::{CacheBuilder, CacheError};
//!
//! let cache = CacheBuilder::<&str, i32>::new(8).lru().build();
//! assert_eq!(cache.get(&"missing"), Err(CacheError::KeyNotFound));
//!
//! // Invalid size is caught without panicking
//! let bad = CacheBuilder::<&str, i32>::new(0).arc().try_build();
//! assert!(bad.is_err());
//! ```
//!
//! [`CacheBuilder::try_build`]: crate::builder::CacheBuilder::try_build

use std::fmt;

/// Boxed error returned by loader callbacks.
pub type LoadError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No live entry for the key and nothing could be loaded. A loader that
    /// returns an error also ends here; its message is logged.
    #[error("key not found")]
    KeyNotFound,
    /// `set_nx` found a live entry for the key.
    #[error("key already exists")]
    KeyAlreadyExists,
    /// The loader panicked; carries the panic payload when it was a string.
    #[error("loader panics: {0}")]
    LoaderPanic(String),
}

impl CacheError {
    /// `true` for [`CacheError::KeyNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound)
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Carries a human-readable description of which parameter failed
/// validation.
///
/// # Example
///
/// ```
/// use polycache::CacheBuilder;
///
/// let err = CacheBuilder::<u64, u64>::new(0).lfu().try_build().unwrap_err();
/// assert!(err.to_string().contains("size"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- CacheError -------------------------------------------------------

    #[test]
    fn cache_error_display() {
        assert_eq!(CacheError::KeyNotFound.to_string(), "key not found");
        assert_eq!(CacheError::KeyAlreadyExists.to_string(), "key already exists");
        assert_eq!(
            CacheError::LoaderPanic("boom".into()).to_string(),
            "loader panics: boom"
        );
    }

    #[test]
    fn cache_error_sentinels_compare_by_value() {
        assert_eq!(CacheError::KeyNotFound, CacheError::KeyNotFound);
        assert_ne!(CacheError::KeyNotFound, CacheError::KeyAlreadyExists);
        assert!(CacheError::KeyNotFound.is_not_found());
        assert!(!CacheError::LoaderPanic("x".into()).is_not_found());
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("size must be > 0");
        assert_eq!(err.to_string(), "size must be > 0");
        assert_eq!(err.message(), "size must be > 0");
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<CacheError>();
        assert_error::<ConfigError>();
    }
}
