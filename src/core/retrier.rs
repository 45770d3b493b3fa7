//! # Retrier: one logical write with bounded retry and cooperative cancellation.
//!
//! A [`Retrier`] runs an operation up to `max_attempts` times, pausing per
//! [`BackoffPolicy`] between failures. [`Retrier::cancel`] stops it at the next
//! checkpoint and **waits** until [`Retrier::retry`] has returned, so a caller
//! that cancels a retrier knows no further call of its operation can happen.
//!
//! ## State machine
//! ```text
//!            retry()                 op Ok           ┌──────────┐
//!   Idle ───────────► Running ───────────────────►   │Succeeded │
//!    │                   │      attempts used up     ├──────────┤
//!    │ cancel()          ├─────────────────────►     │Exhausted │
//!    │                   │   cancel observed at      ├──────────┤
//!    └───────────────────┴──► checkpoint ─────────►  │Cancelled │
//!                                                    └──────────┘
//! ```
//!
//! ## Attempt loop
//! ```text
//! settle predecessor (cancel + await)
//! loop {
//!   ├─► checkpoint: cancelled? → Cancelled
//!   ├─► publish AttemptStarting, op().await   (never interrupted mid-call)
//!   │     └─ Ok  → Succeeded
//!   ├─► publish AttemptFailed
//!   ├─► checkpoint: cancelled? → Cancelled  (suppresses the error)
//!   ├─► last attempt? → Exhausted(last error)
//!   └─► publish BackoffScheduled, sleep(delay) | cancelled → Cancelled
//! }
//! ```
//!
//! ## Predecessors
//! When a retrier replaces another one for the same key (see
//! [`SupersessionTable`](crate::SupersessionTable)) the replaced retrier is
//! recorded as its predecessor. `retry` cancels and awaits the predecessor
//! before the first attempt; `cancel` on a retrier that never started awaits it
//! too. Either way, whoever waits on this retrier also waits out the whole
//! chain behind it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::RetryError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;

/// Observable lifecycle state of a [`Retrier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrierState {
    /// Created, `retry` not yet called.
    Idle,
    /// `retry` in progress.
    Running,
    /// An attempt succeeded.
    Succeeded,
    /// Every attempt failed.
    Exhausted,
    /// Stopped by [`Retrier::cancel`] (or by dropping the `retry` future).
    Cancelled,
}

impl RetrierState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RetrierState::Succeeded | RetrierState::Exhausted | RetrierState::Cancelled
        )
    }
}

/// Non-error result of [`Retrier::retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The operation succeeded on attempt `attempts`.
    Succeeded { attempts: u32 },
    /// Cancellation was observed after `attempts` attempts (possibly zero).
    Cancelled { attempts: u32 },
}

impl RetryOutcome {
    pub fn attempts(&self) -> u32 {
        match *self {
            RetryOutcome::Succeeded { attempts } | RetryOutcome::Cancelled { attempts } => attempts,
        }
    }
}

struct Slot {
    state: RetrierState,
    predecessor: Option<Arc<Retrier>>,
}

struct Events {
    bus: Bus,
    key: Arc<str>,
}

/// Executes one operation with bounded retry; cancellable from another task.
///
/// A retrier is single-use: the second call to [`retry`](Retrier::retry)
/// returns [`RetryError::AlreadyStarted`].
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use writevisor::{BackoffPolicy, Retrier, RetryOutcome};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let retrier = Retrier::new(3).with_backoff(BackoffPolicy::fixed(Duration::from_millis(1)));
/// let mut calls = 0;
/// let res = retrier
///     .retry(|| {
///         calls += 1;
///         let ok = calls == 2;
///         async move { if ok { Ok(()) } else { Err("not yet") } }
///     })
///     .await;
/// assert_eq!(res, Ok(RetryOutcome::Succeeded { attempts: 2 }));
/// # }
/// ```
pub struct Retrier {
    max_attempts: u32,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
    finished: CancellationToken,
    slot: Mutex<Slot>,
    events: Option<Events>,
}

impl Retrier {
    /// Creates an idle retrier. `max_attempts == 0` is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffPolicy::default(),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            slot: Mutex::new(Slot {
                state: RetrierState::Idle,
                predecessor: None,
            }),
            events: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Publishes attempt-level events for `key` to `bus`.
    pub fn with_events(mut self, bus: Bus, key: impl Into<Arc<str>>) -> Self {
        self.events = Some(Events {
            bus,
            key: key.into(),
        });
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn state(&self) -> RetrierState {
        self.slot.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records the retrier this one replaced. Only takes effect while idle.
    pub(crate) fn follow(&self, predecessor: Arc<Retrier>) {
        if std::ptr::eq(self, Arc::as_ptr(&predecessor)) {
            return;
        }
        let mut slot = self.slot.lock();
        if slot.state == RetrierState::Idle {
            slot.predecessor = Some(predecessor);
        }
    }

    /// Runs `op` until it succeeds, the attempt budget is spent, or the retrier
    /// is cancelled.
    ///
    /// Cancellation is never reported as an error: a cancelled run returns
    /// [`RetryOutcome::Cancelled`] even if the last attempt failed.
    pub async fn retry<F, Fut, E>(&self, mut op: F) -> Result<RetryOutcome, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let predecessor = {
            let mut slot = self.slot.lock();
            match slot.state {
                RetrierState::Idle => {
                    slot.state = RetrierState::Running;
                    slot.predecessor.take()
                }
                RetrierState::Cancelled => return Ok(RetryOutcome::Cancelled { attempts: 0 }),
                _ => return Err(RetryError::AlreadyStarted),
            }
        };
        let _finish = Finish(self);

        if let Some(prev) = predecessor {
            prev.cancel().await;
        }

        let res = self.attempts(&mut op).await;
        self.slot.lock().state = match &res {
            Ok(RetryOutcome::Succeeded { .. }) => RetrierState::Succeeded,
            Ok(RetryOutcome::Cancelled { .. }) => RetrierState::Cancelled,
            Err(_) => RetrierState::Exhausted,
        };
        res
    }

    /// Signals cancellation and resolves once the retrier has fully stopped.
    ///
    /// - running: waits for `retry` to return (an in-flight attempt completes first);
    /// - idle: marks it cancelled, then waits for its predecessor (if any);
    /// - finished: returns immediately. Calling it again is harmless.
    pub fn cancel(&self) -> BoxFuture<'_, ()> {
        async move {
            self.cancel.cancel();

            let never_started = {
                let mut slot = self.slot.lock();
                if slot.state == RetrierState::Idle {
                    slot.state = RetrierState::Cancelled;
                    Some(slot.predecessor.take())
                } else {
                    None
                }
            };

            match never_started {
                Some(predecessor) => {
                    let _finish = Finish(self);
                    if let Some(prev) = predecessor {
                        prev.cancel().await;
                    }
                }
                None => self.finished.cancelled().await,
            }
        }
        .boxed()
    }

    async fn attempts<F, Fut, E>(&self, op: &mut F) -> Result<RetryOutcome, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(RetryOutcome::Cancelled { attempts: attempt });
            }

            attempt += 1;
            self.publish(EventKind::AttemptStarting, attempt, |ev| ev);
            let err = match op().await {
                Ok(()) => return Ok(RetryOutcome::Succeeded { attempts: attempt }),
                Err(e) => e,
            };
            let reason = err.to_string();
            self.publish(EventKind::AttemptFailed, attempt, |ev| {
                ev.with_reason(reason.as_str())
            });

            if self.cancel.is_cancelled() {
                return Ok(RetryOutcome::Cancelled { attempts: attempt });
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff.next(attempt - 1);
            self.publish(EventKind::BackoffScheduled, attempt, |ev| {
                ev.with_delay(delay).with_reason(reason.as_str())
            });

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = self.cancel.cancelled() => {
                    return Ok(RetryOutcome::Cancelled { attempts: attempt });
                }
            }
        }
    }

    fn publish(&self, kind: EventKind, attempt: u32, fill: impl FnOnce(Event) -> Event) {
        if let Some(events) = &self.events {
            let ev = Event::new(kind)
                .with_key(Arc::clone(&events.key))
                .with_attempt(attempt);
            events.bus.publish(fill(ev));
        }
    }
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("max_attempts", &self.max_attempts)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Releases waiters in `cancel` when a run ends, including when its future is dropped.
struct Finish<'a>(&'a Retrier);

impl Drop for Finish<'_> {
    fn drop(&mut self) {
        {
            let mut slot = self.0.slot.lock();
            if slot.state == RetrierState::Running {
                slot.state = RetrierState::Cancelled;
            }
        }
        self.0.finished.cancel();
    }
}
