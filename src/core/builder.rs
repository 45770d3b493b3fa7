use std::sync::Arc;

use crate::{
    core::PoolConfig,
    events::Bus,
    store::Store,
    subscribers::{Subscribe, SubscriberSet},
};

use super::pool::WriterPool;

/// Builder for constructing a [`WriterPool`] with optional subscribers.
pub struct PoolBuilder<S> {
    cfg: PoolConfig,
    store: Arc<S>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<S: Store> PoolBuilder<S> {
    /// Creates a new builder writing to `store`.
    pub fn new(cfg: PoolConfig, store: Arc<S>) -> Self {
        Self {
            cfg,
            store,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive write outcomes (stored, superseded, exhausted, ...)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the pool. Workers are not spawned until [`WriterPool::start`].
    ///
    /// Must be called inside a tokio runtime (subscriber workers are spawned here).
    pub fn build(self) -> Arc<WriterPool<S>> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        Arc::new(WriterPool::new_internal(self.cfg, self.store, bus, subs))
    }
}
