//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: worker loops, [`Retrier`](crate::Retrier) (when built with
//!   `with_events`), `WriterPool::shutdown`, `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the pool's subscriber listener, which fans out to [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
