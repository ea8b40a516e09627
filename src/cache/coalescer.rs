use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{Mutex, OwnedMutexGuard};

struct Slot<F> {
    waiters: usize,
    gate: Arc<Mutex<Option<F>>>,
}

/// Single-flight gate per resource key.
///
/// Callers for the same key are serialized on one mutex; the first one does
/// the expensive work while the rest wait and then find its result (in the
/// cache) or its failure (in the slot). The slot lives exactly as long as
/// someone holds or waits for it.
pub struct ResolutionCoalescer<F> {
    slots: Arc<DashMap<String, Slot<F>>>,
}

impl<F> Default for ResolutionCoalescer<F> {
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }
}

impl<F: Clone> ResolutionCoalescer<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers as a waiter for `key` and waits for its gate.
    pub async fn enter(&self, key: &str) -> ResolutionGuard<F> {
        let gate = {
            let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
                waiters: 0,
                gate: Arc::new(Mutex::new(None)),
            });
            slot.waiters += 1;
            slot.gate.clone()
        };

        // Counted before we block, so a caller cancelled while waiting still
        // gives its place back.
        let ticket = Ticket {
            slots: self.slots.clone(),
            key: key.to_string(),
        };

        ResolutionGuard {
            lock: gate.lock_owned().await,
            _ticket: ticket,
        }
    }

    /// Keys with at least one holder or waiter.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

/// Exclusive hold on one key. Dropping it unlocks, then leaves.
pub struct ResolutionGuard<F> {
    lock: OwnedMutexGuard<Option<F>>,
    _ticket: Ticket<F>,
}

impl<F: Clone> ResolutionGuard<F> {
    /// Failure left by an earlier holder that this caller queued behind.
    pub fn failure(&self) -> Option<F> {
        (*self.lock).clone()
    }

    pub fn record_failure(&mut self, failure: F) {
        *self.lock = Some(failure);
    }
}

struct Ticket<F> {
    slots: Arc<DashMap<String, Slot<F>>>,
    key: String,
}

impl<F> Drop for Ticket<F> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut entry) = self.slots.entry(self.key.clone()) {
            let slot = entry.get_mut();
            slot.waiters = slot.waiters.saturating_sub(1);
            if slot.waiters == 0 {
                entry.remove();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn slot_is_removed_when_last_waiter_leaves() {
        let coalescer: ResolutionCoalescer<String> = ResolutionCoalescer::new();
        let first = coalescer.enter("a").await;
        assert_eq!(coalescer.in_flight(), 1);
        drop(first);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn waiters_see_recorded_failure_until_slot_empties() {
        let coalescer: Arc<ResolutionCoalescer<String>> = Arc::new(ResolutionCoalescer::new());
        let mut holder = coalescer.enter("a").await;

        let waiter = {
            let c = coalescer.clone();
            tokio::spawn(async move { c.enter("a").await.failure() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        holder.record_failure("gone".to_string());
        drop(holder);
        assert_eq!(waiter.await.unwrap(), Some("gone".to_string()));

        assert_eq!(coalescer.in_flight(), 0);
        assert_eq!(coalescer.enter("a").await.failure(), None);
    }

    #[tokio::test]
    async fn cancelled_waiter_is_counted_down() {
        let coalescer: Arc<ResolutionCoalescer<String>> = Arc::new(ResolutionCoalescer::new());
        let holder = coalescer.enter("a").await;

        let c = coalescer.clone();
        let waiting = tokio::spawn(async move {
            let _guard = c.enter("a").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiting.abort();
        let _ = waiting.await;

        drop(holder);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let coalescer: ResolutionCoalescer<String> = ResolutionCoalescer::new();
        let _a = coalescer.enter("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), coalescer.enter("b")).await;
        assert!(b.is_ok());
    }
}
