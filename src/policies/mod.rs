//! Retry pacing policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long a retrier waits between failed attempts
//! - [`JitterPolicy`]  randomization applied on top of the backoff delay
//!
//! ## Quick wiring
//! ```text
//! PoolConfig { max_attempts, backoff: BackoffPolicy, .. }
//!      └─► core::worker builds one Retrier per request:
//!           - backoff.next(failed_attempts - 1) after each failed attempt
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → fixed 1s delay (factor=1.0), max=30s, jitter=None.
//! - `JitterPolicy::None`; prefer `Equal` when many keys fail at once.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
