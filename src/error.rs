//! Error types for the ratekit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when limiter configuration parameters are
//!   invalid (zero interval, zero burst capacity).
//! - [`InvariantError`]: Returned when the limiter's queue-ordering
//!   invariant is violated while a caller waits. Continuing past it could
//!   grant tickets out of order, so the waiting acquisition is aborted and
//!   the host application decides how to react.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use ratekit::error::ConfigError;
//! use ratekit::limiter::ContinuousLimiter;
//!
//! // Fallible constructor for user-configurable parameters
//! let limiter = ContinuousLimiter::new(Duration::from_millis(100), 4);
//! assert!(limiter.is_ok());
//!
//! // Invalid burst capacity is caught without panicking
//! let bad: Result<ContinuousLimiter, ConfigError> =
//!     ContinuousLimiter::new(Duration::from_millis(100), 0);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when the limiter's internal ordering invariant is violated.
///
/// Produced by [`ContinuousLimiter::acquire`](crate::limiter::ContinuousLimiter::acquire)
/// if a waiting caller observes that the service counter has overtaken its
/// own arrival number. Carries a human-readable description of which
/// invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
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

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when limiter configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`ContinuousLimiter::new`](crate::limiter::ContinuousLimiter::new).
/// Carries a human-readable description of which parameter failed
/// validation; no partially constructed limiter is returned.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ratekit::limiter::ContinuousLimiter;
///
/// let err = ContinuousLimiter::new(Duration::ZERO, 1).unwrap_err();
/// assert!(err.to_string().contains("production_interval"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
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

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
