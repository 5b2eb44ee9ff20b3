//! Error types for the carcache library.
//!
//! ## Key Components
//!
//! - [`ComputeError`]: Returned by value computations. Distinguishes a hard
//!   failure (propagated to the caller) from a value that was computed but
//!   must not be cached.
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. zero capacity, zero shards).
//! - [`InvariantError`]: Returned by `check_invariants` when the internal
//!   structures disagree with each other.
//!
//! ## Example Usage
//!
//! ```
//! use carcache::error::{ComputeError, ConfigError};
//! use carcache::policy::car::CarCache;
//!
//! let cache: Result<CarCache<u64, u64, _>, ConfigError> =
//!     CarCache::try_new(|k: &u64| Ok::<_, ComputeError<u64, ()>>(k * 2), 0, false);
//! assert!(cache.is_err());
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// ComputeError
// ---------------------------------------------------------------------------

/// Outcome of a value computation that did not produce a cacheable value.
///
/// - [`Uncacheable`](Self::Uncacheable) carries a usable value that is handed
///   back to the caller of `compute` without being admitted. No cache
///   structure is touched.
/// - [`Failed`](Self::Failed) carries the computation's own error, which
///   `compute` returns verbatim.
///
/// # Example
///
/// ```
/// use carcache::error::ComputeError;
/// use carcache::policy::car::CarCache;
///
/// let cache = CarCache::new(
///     |k: &u32| {
///         if *k == 0 {
///             Err(ComputeError::Uncacheable(-1))
///         } else if *k > 100 {
///             Err(ComputeError::Failed("too large"))
///         } else {
///             Ok(*k as i64)
///         }
///     },
///     8,
///     false,
/// );
///
/// assert_eq!(cache.compute(0), Ok(-1));
/// assert_eq!(cache.len(), 0);
/// assert_eq!(cache.compute(101), Err("too large"));
/// assert_eq!(cache.compute(7), Ok(7));
/// assert_eq!(cache.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError<V, E> {
    /// The value was computed but must not be cached.
    #[error("computed value must not be cached")]
    Uncacheable(V),
    /// The computation failed; the error is returned to the caller.
    #[error("value computation failed: {0}")]
    Failed(E),
}

impl<V, E> ComputeError<V, E> {
    /// Returns `true` for [`Uncacheable`](Self::Uncacheable).
    #[inline]
    pub fn is_uncacheable(&self) -> bool {
        matches!(self, Self::Uncacheable(_))
    }

    /// Maps the hard-failure payload, leaving an uncacheable value as is.
    pub fn map_failure<F, E2>(self, f: F) -> ComputeError<V, E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Uncacheable(value) => ComputeError::Uncacheable(value),
            Self::Failed(err) => ComputeError::Failed(f(err)),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`CarCache::try_new`](crate::policy::car::CarCache::try_new) and
/// [`CarCacheBuilder::try_build`](crate::builder::CarCacheBuilder::try_build).
///
/// # Example
///
/// ```
/// use carcache::builder::CarCacheBuilder;
/// use carcache::error::ComputeError;
///
/// let err = CarCacheBuilder::new(0)
///     .try_build(|k: &u64| Ok::<_, ComputeError<u64, ()>>(*k))
///     .unwrap_err();
/// assert!(err.to_string().contains("max_size"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`CarCache::check_invariants`](crate::policy::car::CarCache::check_invariants).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- ComputeError -----------------------------------------------------

    #[test]
    fn compute_failed_display_includes_source() {
        let err: ComputeError<u32, &str> = ComputeError::Failed("disk offline");
        assert_eq!(err.to_string(), "value computation failed: disk offline");
        assert!(!err.is_uncacheable());
    }

    #[test]
    fn compute_uncacheable_display() {
        let err: ComputeError<u32, &str> = ComputeError::Uncacheable(7);
        assert_eq!(err.to_string(), "computed value must not be cached");
        assert!(err.is_uncacheable());
    }

    #[test]
    fn compute_map_failure_keeps_uncacheable_value() {
        let soft: ComputeError<u32, &str> = ComputeError::Uncacheable(3);
        assert_eq!(soft.map_failure(str::len), ComputeError::Uncacheable(3));

        let hard: ComputeError<u32, &str> = ComputeError::Failed("abc");
        assert_eq!(hard.map_failure(str::len), ComputeError::Failed(3));
    }

    #[test]
    fn compute_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ComputeError<u32, String>>();
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("max_size must be > 0");
        assert_eq!(err.to_string(), "max_size must be > 0");
        assert_eq!(err.message(), "max_size must be > 0");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("key in both T1 and B1");
        assert_eq!(err.to_string(), "key in both T1 and B1");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("T1 and B1"));
    }

    #[test]
    fn invariant_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<InvariantError>();
    }
}
