//! # Supersession table: the single live retrier per key.
//!
//! ```text
//! producer ──► admit()                    → Admission { seq } (registered as pending)
//!
//! worker ──► swap(key, seq, new)
//!              ├─ seq older than watermark ─► Stale (nothing changes)
//!              └─ otherwise (under the key's shard lock):
//!                   previous = slot.active.replace(new)
//!                   slot.watermark = seq
//!                   new.follow(previous)      ← predecessor link
//!                   ─► Installed { previous }
//!        ──► drop(admission)
//!
//! worker ──► release(key, &new)   after retry returns
//!              ├─ clears slot.active only if it still holds `new`
//!              └─ drops the slot once no pending admission is older than its watermark
//! ```
//!
//! ## Rules
//! - Every read-modify-write of a slot happens under its shard lock (`dashmap`),
//!   so swaps for keys in different shards never contend.
//! - The predecessor link is written before the shard lock is released: nobody
//!   can observe `new` in the table without also waiting on `previous` when
//!   cancelling it.
//! - A slot's watermark is kept while any request admitted before it is still
//!   pending, so a late, older request can never overwrite a newer value.
//!   Idle slots are dropped on `release` or by the periodic [`prune`](SupersessionTable::prune).

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::core::retrier::Retrier;

/// Releases between two full sweeps of idle slots.
const PRUNE_EVERY: u64 = 1024;

#[derive(Default)]
struct KeySlot {
    watermark: u64,
    active: Option<Arc<Retrier>>,
}

#[derive(Default)]
struct Pending {
    next: u64,
    seqs: BTreeSet<u64>,
}

impl Pending {
    /// Oldest seq that may still reach `swap`.
    fn low(&self) -> u64 {
        self.seqs.first().copied().unwrap_or(self.next + 1)
    }
}

/// Admission order of one request; pending until dropped.
pub struct Admission {
    seq: u64,
    pending: Arc<Mutex<Pending>>,
}

impl Admission {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Debug for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Admission").field(&self.seq).finish()
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.pending.lock().seqs.remove(&self.seq);
    }
}

/// Result of [`SupersessionTable::swap`].
#[derive(Debug)]
pub enum Swap {
    /// The new retrier is now responsible for the key. `previous` (if any) has
    /// been recorded as its predecessor and must be cancelled before writing.
    Installed { previous: Option<Arc<Retrier>> },
    /// A newer request was already admitted for this key.
    Stale { watermark: u64 },
}

/// Concurrent `key → live retrier` map enforcing single-flight per key.
#[derive(Default)]
pub struct SupersessionTable {
    slots: DashMap<Arc<str>, KeySlot>,
    pending: Arc<Mutex<Pending>>,
    releases: AtomicU64,
}

impl SupersessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next admission seq (starting at 1).
    ///
    /// The request counts as pending until the returned [`Admission`] is dropped;
    /// drop it once the request went through [`swap`](Self::swap) or was discarded.
    pub fn admit(&self) -> Admission {
        let mut pending = self.pending.lock();
        pending.next += 1;
        let seq = pending.next;
        pending.seqs.insert(seq);
        Admission {
            seq,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Installs `retrier` as the live writer for `key` unless `seq` is older
    /// than the last admitted request for that key.
    ///
    /// `seq` must increase with admission order; see [`admit`](Self::admit).
    pub fn swap(&self, key: &Arc<str>, seq: u64, retrier: &Arc<Retrier>) -> Swap {
        let mut slot = self.slots.entry(Arc::clone(key)).or_default();
        if seq <= slot.watermark {
            return Swap::Stale {
                watermark: slot.watermark,
            };
        }

        slot.watermark = seq;
        let previous = slot.active.replace(Arc::clone(retrier));
        if let Some(prev) = &previous {
            retrier.follow(Arc::clone(prev));
        }
        Swap::Installed { previous }
    }

    /// Clears the slot for `key` if `retrier` is still its live writer.
    ///
    /// Returns `true` when the slot was cleared.
    pub fn release(&self, key: &str, retrier: &Arc<Retrier>) -> bool {
        let low = self.pending.lock().low();
        let mut cleared = false;
        self.slots.remove_if_mut(key, |_, slot| {
            if !slot.active.as_ref().is_some_and(|a| Arc::ptr_eq(a, retrier)) {
                return false;
            }
            slot.active = None;
            cleared = true;
            slot.watermark < low
        });

        if self.releases.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }
        cleared
    }

    /// Drops idle slots no pending request can be stale against.
    ///
    /// Returns the number of slots removed.
    pub fn prune(&self) -> usize {
        let low = self.pending.lock().low();
        let mut removed = 0;
        self.slots.retain(|_, slot| {
            let keep = slot.active.is_some() || slot.watermark >= low;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Live retrier for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<Retrier>> {
        self.slots.get(key).and_then(|slot| slot.active.clone())
    }

    /// Number of keys with a live retrier.
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active.is_some()).count()
    }

    /// Number of tracked keys, idle ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
