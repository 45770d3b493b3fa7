//! # Pool configuration.
//!
//! [`PoolConfig`] centralizes the settings of a [`WriterPool`](crate::WriterPool).
//!
//! ## Sentinel values
//! - `workers = 0` → treated as 1
//! - `max_attempts = 0` → treated as 1 (every write is tried at least once)
//! - `queue_capacity = 0` → rendezvous hand-off: `notify_value` waits for a free worker
//! - `bus_capacity = 0` → treated as 1

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// What happens to requests that have not reached a worker when shutdown fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Workers stop at their next queue wait. Producers blocked in
    /// `notify_value` get [`SubmitError::Closed`](crate::SubmitError::Closed);
    /// buffered requests are counted and reported as `WritesAbandoned`.
    #[default]
    Abandon,

    /// Workers keep taking requests that are already offered until the queue is
    /// empty, then exit. New `notify_value` calls are still rejected.
    Drain,
}

/// Configuration for a writer pool.
///
/// ## Field semantics
/// - `workers`: number of concurrent worker tasks
/// - `max_attempts`: store calls per write before giving up
/// - `backoff`: delay between failed attempts of one write
/// - `queue_capacity`: requests buffered between producers and workers
/// - `bus_capacity`: event ring size
/// - `grace`: how long `shutdown` waits for workers before aborting them
/// - `shutdown`: drain or abandon not-yet-taken requests
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub queue_capacity: usize,
    pub bus_capacity: usize,
    pub grace: Duration,
    pub shutdown: ShutdownMode,
}

impl PoolConfig {
    /// Worker count, at least 1.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    /// Attempt budget per write, at least 1.
    #[inline]
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Bus capacity, at least 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PoolConfig {
    /// - `workers = 4`
    /// - `max_attempts = 5`
    /// - `backoff = BackoffPolicy::default()` (fixed 1s)
    /// - `queue_capacity = 0` (rendezvous)
    /// - `bus_capacity = 1024`
    /// - `grace = 60s`
    /// - `shutdown = ShutdownMode::Abandon`
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
            queue_capacity: 0,
            bus_capacity: 1024,
            grace: Duration::from_secs(60),
            shutdown: ShutdownMode::default(),
        }
    }
}
