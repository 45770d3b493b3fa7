//! # writevisor
//!
//! **Writevisor** dispatches key/value writes to an external store from a
//! fixed pool of async workers, with bounded retries and **single-flight per
//! key**: a newer write for a key cancels the in-flight write for that key and
//! waits for it to fully stop before touching the store.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer           producer           producer
//!      │ notify_value(k, v)  │                  │
//!      ▼                     ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  WriterPool                                                       │
//! │  - queue (flume; rendezvous by default)                           │
//! │  - SupersessionTable (key → live Retrier, per-key watermark)      │
//! │  - Bus (broadcast events) + SubscriberSet                         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Worker 0   │   │   Worker 1   │   │   Worker N   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ table.swap(key) ─► cancel + await previous retrier
//!      ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Retrier    │   │   Retrier    │   │   Retrier    │
//!     │ (retry loop) │   │ (retry loop) │   │ (retry loop) │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ Store::save      │                  │
//!      │ Publishes: AttemptStarting, AttemptFailed, BackoffScheduled,
//!      │ WriteSucceeded, WriteCancelled, WriteExhausted, ...
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                 (capacity: PoolConfig::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          (per-sub queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                     sub1.on   sub2.on   subN.on
//!                      _event()  _event()  _event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! builder(cfg, store).build() ──► start(token) ──► notify_value(..)* ──► shutdown()
//!
//! shutdown():
//!   ├─► publish ShutdownRequested
//!   ├─► close              (workers finish the write they hold, then exit)
//!   ├─► join within grace  ─► AllStoppedWithin | GraceExceeded (abort)
//!   ├─► report requests nobody took as WritesAbandoned
//!   └─► drain subscribers, release every join()/shutdown() waiter
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                          |
//! |-------------------|------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**      | Worker pool with single-flight per key and graceful stop.  | [`WriterPool`], [`PoolConfig`]              |
//! | **Retry**         | Bounded, cancellable retry loop usable on its own.         | [`Retrier`], [`RetryOutcome`]               |
//! | **Policies**      | Delay between failed attempts.                             | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Storage**       | Pluggable persistence target.                              | [`Store`], [`MemoryStore`]                  |
//! | **Subscriber API**| Observe write outcomes (metrics, audit, tests).            | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors with stable labels.                           | [`StoreError`], [`SubmitError`], [`RuntimeError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use writevisor::{BackoffPolicy, MemoryStore, PoolConfig, Store, WriterPool};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = PoolConfig {
//!         workers: 2,
//!         max_attempts: 3,
//!         backoff: BackoffPolicy::fixed(Duration::from_millis(100)),
//!         ..PoolConfig::default()
//!     };
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let pool = WriterPool::builder(cfg, store.clone()).build();
//!     pool.start(CancellationToken::new())?;
//!
//!     pool.notify_value("user:1", "alice").await?;
//!     pool.notify_value("user:1", "alice-v2").await?;
//!
//!     pool.shutdown().await?;
//!     assert_eq!(store.get("user:1").await?, "alice-v2");
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    Admission, PoolBuilder, PoolConfig, Retrier, RetrierState, RetryOutcome, ShutdownMode, SupersessionTable,
    Swap, WriteRequest, WriterPool,
};
pub use error::{RetryError, RuntimeError, StoreError, SubmitError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use store::{MemoryStore, Store};
pub use subscribers::{Subscribe, SubscriberSet};
