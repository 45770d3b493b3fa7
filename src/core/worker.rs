//! # Worker: one execution unit of the pool.
//!
//! ```text
//! loop {
//!   ├─► wait: queue.recv() | shutdown token      (tie-break per ShutdownMode)
//!   │     └─ shutdown → break
//!   ├─► publish WriteReceived
//!   ├─► new Retrier
//!   ├─► table.swap(key, seq, retrier), then settle the request's admission
//!   │     ├─ Stale                 → publish WriteStale, next request
//!   │     ├─ Installed{Some(prev)} → publish WriteSuperseded
//!   │     └─ Installed{None}
//!   ├─► retrier.retry(store.save)  (cancels + awaits prev before attempt 1)
//!   ├─► table.release(key, retrier)
//!   └─► report: Succeeded / Cancelled / Exhausted (warn!)
//! }
//! ```
//!
//! ## Rules
//! - A worker handles one request at a time; shutdown is observed only while
//!   waiting for the next request, never in the middle of one.
//! - Failures are reported, never propagated: the worker keeps serving.

use std::sync::Arc;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::core::config::ShutdownMode;
use crate::core::retrier::{Retrier, RetryOutcome};
use crate::core::table::{Admission, SupersessionTable, Swap};
use crate::error::RetryError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::store::Store;

/// A pending write handed from a producer to a worker.
#[derive(Debug)]
pub struct WriteRequest {
    pub key: Arc<str>,
    pub value: Arc<str>,
    /// Pool-wide admission number; higher means newer.
    pub seq: u64,
    admission: Admission,
}

impl WriteRequest {
    pub(crate) fn new(key: Arc<str>, value: Arc<str>, admission: Admission) -> Self {
        Self {
            key,
            value,
            seq: admission.seq(),
            admission,
        }
    }
}

/// State shared by all workers of one pool.
pub(crate) struct Shared<S> {
    pub store: Arc<S>,
    pub table: SupersessionTable,
    pub bus: Bus,
}

/// Per-worker retry settings, copied from [`PoolConfig`](crate::PoolConfig).
#[derive(Clone, Copy, Debug)]
pub(crate) struct WorkerParams {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub mode: ShutdownMode,
}

pub(crate) struct Worker<S> {
    id: usize,
    shared: Arc<Shared<S>>,
    queue: flume::Receiver<WriteRequest>,
    params: WorkerParams,
}

impl<S: Store> Worker<S> {
    pub fn new(
        id: usize,
        shared: Arc<Shared<S>>,
        queue: flume::Receiver<WriteRequest>,
        params: WorkerParams,
    ) -> Self {
        Self {
            id,
            shared,
            queue,
            params,
        }
    }

    /// Serves requests until `token` is cancelled or the queue disconnects.
    pub async fn run(self, token: CancellationToken) {
        tracing::debug!(worker = self.id, "worker started");
        self.shared
            .bus
            .publish(Event::new(EventKind::WorkerStarted).with_worker(self.id));

        while let Some(req) = self.next(&token).await {
            self.process(req).await;
        }

        tracing::debug!(worker = self.id, "worker stopped");
        self.shared
            .bus
            .publish(Event::new(EventKind::WorkerStopped).with_worker(self.id));
    }

    async fn next(&self, token: &CancellationToken) -> Option<WriteRequest> {
        match self.params.mode {
            ShutdownMode::Abandon => select! {
                biased;
                _ = token.cancelled() => None,
                req = self.queue.recv_async() => req.ok(),
            },
            ShutdownMode::Drain => select! {
                biased;
                req = self.queue.recv_async() => req.ok(),
                _ = token.cancelled() => None,
            },
        }
    }

    async fn process(&self, req: WriteRequest) {
        let WriteRequest {
            key,
            value,
            seq,
            admission,
        } = req;
        self.publish(self.event(EventKind::WriteReceived, &key, seq));

        let retrier = Arc::new(
            Retrier::new(self.params.max_attempts)
                .with_backoff(self.params.backoff)
                .with_events(self.shared.bus.clone(), Arc::clone(&key)),
        );

        let swap = self.shared.table.swap(&key, seq, &retrier);
        drop(admission);

        match swap {
            Swap::Stale { watermark } => {
                tracing::debug!(worker = self.id, %key, seq, watermark, "skipping stale write");
                self.publish(self.event(EventKind::WriteStale, &key, seq));
                return;
            }
            Swap::Installed { previous: Some(_) } => {
                tracing::debug!(worker = self.id, %key, seq, "superseding in-flight write");
                self.publish(self.event(EventKind::WriteSuperseded, &key, seq));
            }
            Swap::Installed { previous: None } => {}
        }

        let store = &self.shared.store;
        let res = retrier.retry(|| store.save(&key, &value)).await;
        self.shared.table.release(&key, &retrier);

        match res {
            Ok(RetryOutcome::Succeeded { attempts }) => {
                tracing::debug!(worker = self.id, %key, seq, attempts, "write stored");
                self.publish(self.event(EventKind::WriteSucceeded, &key, seq).with_attempt(attempts));
            }
            Ok(RetryOutcome::Cancelled { attempts }) => {
                tracing::debug!(worker = self.id, %key, seq, attempts, "write superseded before completion");
                self.publish(self.event(EventKind::WriteCancelled, &key, seq).with_attempt(attempts));
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(
                    worker = self.id,
                    %key,
                    seq,
                    attempts,
                    error = %last,
                    label = last.as_label(),
                    "failed to save with retry"
                );
                self.publish(
                    self.event(EventKind::WriteExhausted, &key, seq)
                        .with_attempt(attempts)
                        .with_reason(last.to_string()),
                );
            }
            Err(RetryError::AlreadyStarted) => {
                tracing::error!(worker = self.id, %key, seq, "fresh retrier reported as already started");
            }
        }
    }

    fn event(&self, kind: EventKind, key: &Arc<str>, seq: u64) -> Event {
        Event::new(kind)
            .with_worker(self.id)
            .with_key(Arc::clone(key))
            .with_write_seq(seq)
    }

    fn publish(&self, ev: Event) {
        self.shared.bus.publish(ev);
    }
}
