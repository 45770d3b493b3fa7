//! Instrumented store for tests: latency, injected failures, overlap detection
//! and a save-count latch in place of sleep-based synchronization.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::store::{MemoryStore, Store};

pub(crate) struct ProbeStore {
    inner: MemoryStore,
    latency: Duration,
    always_fail: bool,
    failures: Mutex<HashMap<String, u32>>,
    in_flight: Mutex<HashMap<String, usize>>,
    overlaps: AtomicUsize,
    calls: AtomicUsize,
    started: Mutex<Vec<(String, String)>>,
    committed: Mutex<Vec<(String, String)>>,
    saved: watch::Sender<usize>,
}

impl ProbeStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            latency: Duration::ZERO,
            always_fail: false,
            failures: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            overlaps: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            committed: Mutex::new(Vec::new()),
            saved: watch::channel(0).0,
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// The next `n` saves for `key` fail.
    pub(crate) fn fail_next(self, key: &str, n: u32) -> Self {
        self.failures.lock().insert(key.to_string(), n);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of times a save began while another save for the same key was running.
    pub(crate) fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Values passed to `save`, in call order.
    pub(crate) fn started(&self) -> Vec<(String, String)> {
        self.started.lock().clone()
    }

    /// Values successfully stored, in completion order.
    pub(crate) fn committed(&self) -> Vec<(String, String)> {
        self.committed.lock().clone()
    }

    /// Resolves once at least `n` saves succeeded.
    pub(crate) async fn wait_saves(&self, n: usize) {
        let mut rx = self.saved.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn should_fail(&self, key: &str) -> bool {
        if self.always_fail {
            return true;
        }
        match self.failures.lock().get_mut(key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Store for ProbeStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut in_flight = self.in_flight.lock();
            let running = in_flight.entry(key.to_string()).or_insert(0);
            if *running > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *running += 1;
        }
        self.started.lock().push((key.to_string(), value.to_string()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let res = if self.should_fail(key) {
            Err(StoreError::backend(format!("injected failure for {key}")))
        } else {
            let res = self.inner.save(key, value).await;
            if res.is_ok() {
                self.committed.lock().push((key.to_string(), value.to_string()));
            }
            res
        };

        if let Some(running) = self.in_flight.lock().get_mut(key) {
            *running -= 1;
        }
        if res.is_ok() {
            self.saved.send_modify(|count| *count += 1);
        }
        res
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner.get(key).await
    }
}
