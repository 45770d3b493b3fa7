//! # Runtime events emitted by workers and retriers.
//!
//! [`EventKind`] covers four groups:
//! - **Worker lifecycle**: a worker started or stopped
//! - **Write lifecycle**: received, superseded, stale, succeeded, cancelled, exhausted
//! - **Attempts**: one store call starting or failing, backoff scheduled
//! - **Shutdown / subscribers**: grace outcome, abandoned requests, subscriber trouble
//!
//! Every [`Event`] carries a process-wide sequence number (`seq`) so subscribers
//! can restore order when deliveries interleave.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use writevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_key("user:42")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(1))
//!     .with_reason("connection reset");
//!
//! assert_eq!(ev.key.as_deref(), Some("user:42"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// Worker loop started.
    ///
    /// Sets: `worker`.
    WorkerStarted,

    /// Worker loop exited after observing shutdown (or the queue closing).
    ///
    /// Sets: `worker`.
    WorkerStopped,

    // === Write lifecycle ===
    /// A worker took a request off the queue.
    ///
    /// Sets: `worker`, `key`, `write_seq`.
    WriteReceived,

    /// The request replaced an in-flight retrier for the same key; the old one
    /// is being cancelled and awaited.
    ///
    /// Sets: `worker`, `key`, `write_seq`.
    WriteSuperseded,

    /// The request was older than one already admitted for its key and was skipped.
    ///
    /// Sets: `worker`, `key`, `write_seq`.
    WriteStale,

    /// The value was stored.
    ///
    /// Sets: `worker`, `key`, `write_seq`, `attempt` (attempts used).
    WriteSucceeded,

    /// The retrier stopped early because a newer write superseded it.
    ///
    /// Sets: `worker`, `key`, `write_seq`, `attempt` (attempts made).
    WriteCancelled,

    /// All attempts failed; the write is given up.
    ///
    /// Sets: `worker`, `key`, `write_seq`, `attempt`, `reason` (last error).
    WriteExhausted,

    // === Attempts ===
    /// A store call is about to be made.
    ///
    /// Sets: `key`, `attempt` (1-based).
    AttemptStarting,

    /// A store call failed.
    ///
    /// Sets: `key`, `attempt`, `reason`.
    AttemptFailed,

    /// The retrier will wait before the next attempt.
    ///
    /// Sets: `key`, `attempt` (the failed one), `delay_ms`, `reason`.
    BackoffScheduled,

    // === Shutdown ===
    /// Shutdown was requested through [`WriterPool::shutdown`](crate::WriterPool::shutdown).
    ShutdownRequested,

    /// Every worker exited within the grace period.
    AllStoppedWithin,

    /// Grace period elapsed; remaining workers were aborted.
    ///
    /// Sets: `reason` (number of aborted workers).
    GraceExceeded,

    /// Requests still buffered in the queue when the workers exited.
    ///
    /// Sets: `reason` (count).
    WritesAbandoned,

    // === Subscribers ===
    /// Subscriber panicked while handling an event.
    ///
    /// Sets: `key` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// An event was dropped for one subscriber (queue full or closed).
    ///
    /// Sets: `key` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// Only the fields listed for the [`EventKind`] are set; the rest stay `None`.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Write key (or subscriber name for subscriber events).
    pub key: Option<Arc<str>>,
    /// Admission number of the write request.
    pub write_seq: Option<u64>,
    /// Index of the worker that handled the request.
    pub worker: Option<usize>,
    /// Attempt number (1-based) or attempts used, depending on the kind.
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, counts, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            write_seq: None,
            worker: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[inline]
    pub fn with_write_seq(mut self, seq: u64) -> Self {
        self.write_seq = Some(seq);
        self
    }

    #[inline]
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub(crate) fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_key(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    pub(crate) fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_key(subscriber)
            .with_reason(info)
    }

    /// True for the terminal write kinds (succeeded, cancelled, exhausted, stale).
    pub fn is_write_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::WriteSucceeded
                | EventKind::WriteCancelled
                | EventKind::WriteExhausted
                | EventKind::WriteStale
        )
    }
}
