//! Runtime core: dispatch, single-flight and lifecycle.
//!
//! Internal modules:
//! - [`retrier`]: bounded retry loop with cooperative cancellation and a completion latch;
//! - [`table`]: key → live retrier map, stale-write suppression;
//! - [`worker`]: one worker loop (queue wait, supersession, retry, report);
//! - [`pool`]: producer API, worker spawning, graceful shutdown;
//! - [`config`]: pool settings;
//! - [`builder`]: pool construction with subscribers.

mod builder;
mod config;
mod pool;
mod retrier;
mod table;
mod worker;

pub use builder::PoolBuilder;
pub use config::{PoolConfig, ShutdownMode};
pub use pool::WriterPool;
pub use retrier::{Retrier, RetrierState, RetryOutcome};
pub use table::{Admission, SupersessionTable, Swap};
pub use worker::WriteRequest;
