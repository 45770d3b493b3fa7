//! Error types used by the writevisor runtime, the retrier and stores.
//!
//! - [`StoreError`]: failures reported by a [`Store`](crate::Store) backend.
//! - [`SubmitError`]: synchronous rejections from [`WriterPool::notify_value`](crate::WriterPool::notify_value).
//! - [`RuntimeError`]: failures of the pool lifecycle itself.
//! - [`RetryError`]: terminal failures of a single [`Retrier`](crate::Retrier) run.
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by a store backend.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No value is stored under the key.
    #[error("no value found for key {key:?}")]
    NotFound {
        /// Key that was looked up.
        key: String,
    },

    /// Backend failed to serve the call; the write may succeed if retried.
    #[error("store backend failed: {error}")]
    Backend {
        /// The underlying error message.
        error: String,
    },
}

impl StoreError {
    /// Shorthand for a [`StoreError::Backend`] failure.
    pub fn backend(error: impl Into<String>) -> Self {
        StoreError::Backend {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use writevisor::StoreError;
    ///
    /// let err = StoreError::backend("connection reset");
    /// assert_eq!(err.as_label(), "store_backend");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::Backend { .. } => "store_backend",
        }
    }
}

/// # Rejections returned to producers.
///
/// Persistence outcomes are never reported here: a producer only learns that its
/// request was not accepted.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The key was empty.
    #[error("write key must not be empty")]
    EmptyKey,

    /// The pool is shutting down or all workers have exited.
    #[error("writer pool is closed")]
    Closed,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::EmptyKey => "submit_empty_key",
            SubmitError::Closed => "submit_closed",
        }
    }
}

/// # Errors produced by the pool lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `start` was called on a pool whose workers were already spawned.
    #[error("writer pool already started")]
    AlreadyStarted,

    /// `start` was called after `shutdown`.
    #[error("writer pool is shut down")]
    Closed,

    /// Shutdown grace period was exceeded; remaining workers were aborted.
    #[error("shutdown timeout {grace:?} exceeded; {stuck} worker(s) aborted")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of workers that did not exit in time.
        stuck: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use writevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: 2 };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::Closed => "runtime_closed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Terminal failures of one retrier run.
///
/// Cancellation is deliberately absent: a cancelled run is reported as
/// [`RetryOutcome::Cancelled`](crate::RetryOutcome::Cancelled).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last observed error.
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Number of attempts made (equals the retrier's budget).
        attempts: u32,
        /// Error returned by the final attempt.
        last: E,
    },

    /// `retry` was already called on this retrier.
    #[error("retrier already started")]
    AlreadyStarted,
}

impl<E> RetryError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RetryError::Exhausted { .. } => "retry_exhausted",
            RetryError::AlreadyStarted => "retry_already_started",
        }
    }
}
