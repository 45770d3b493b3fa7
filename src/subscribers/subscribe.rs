//! # Subscriber trait
//!
//! `Subscribe` is the hook for observing write outcomes (metrics, audit, tests).
//! Persistence results never reach the producer, so this is the only
//! programmatic way to learn that a write was exhausted or superseded.
//!
//! Each subscriber gets a dedicated worker task fed by a bounded queue owned by
//! the [`SubscriberSet`](crate::SubscriberSet); a slow subscriber never blocks
//! the write path.
//!
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use writevisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct ExhaustedCounter(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for ExhaustedCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WriteExhausted {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "exhausted-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue; overflowing events are dropped.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
