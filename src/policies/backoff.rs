//! # Backoff between retry attempts.
//!
//! [`BackoffPolicy`] turns "how many attempts have failed so far" into a delay.
//! The default is a fixed one-second pause; a `factor > 1.0` makes it grow
//! geometrically up to [`BackoffPolicy::max`].
//!
//! The base delay depends only on the attempt index, so jitter never feeds back
//! into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use writevisor::{BackoffPolicy, JitterPolicy};
//!
//! let fixed = BackoffPolicy::fixed(Duration::from_millis(250));
//! assert_eq!(fixed.next(0), Duration::from_millis(250));
//! assert_eq!(fixed.next(7), Duration::from_millis(250));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(2), Duration::from_millis(400));
//! assert_eq!(growing.next(9), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay schedule between failed attempts of a retrier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth per failed attempt (`1.0` = fixed delay).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Fixed 1s delay, capped at 30s, no jitter.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// A constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay.max(Duration::from_secs(30)),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns the same policy with a different jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after `failed` prior failures (0-indexed: `next(0)` follows
    /// the first failed attempt).
    ///
    /// Non-finite or negative intermediate values collapse to [`BackoffPolicy::max`].
    pub fn next(&self, failed: u32) -> Duration {
        let exp = failed.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };
        self.jitter.apply(base)
    }
}
