//! Bounded in-memory log of breaker transitions.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tripwire_core::{BreakerObserver, CircuitState, TransitionEvent};

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    pub breaker: String,
    pub from: CircuitState,
    pub to: CircuitState,
    /// Per-breaker transition number.
    pub seq: u64,
    /// When the breaker changed state, not when the record was stored.
    pub at: Instant,
}

/// Keeps the last `capacity` transitions across all observed breakers.
///
/// Share one instance through `Arc` and hand it to
/// [`CircuitBreakerRegistry::with_observer`](tripwire_core::CircuitBreakerRegistry::with_observer)
/// to capture every breaker the registry creates.
pub struct TransitionHistory {
    capacity: usize,
    records: Mutex<VecDeque<TransitionRecord>>,
}

impl TransitionHistory {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All retained records, oldest first.
    pub fn entries(&self) -> Vec<TransitionRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Retained records for a single breaker, in transition order.
    pub fn for_breaker(&self, name: &str) -> Vec<TransitionRecord> {
        self.lock()
            .iter()
            .filter(|r| r.breaker == name)
            .cloned()
            .collect()
    }

    /// How many times `name` tripped open among the retained records.
    pub fn trip_count(&self, name: &str) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.breaker == name && r.to == CircuitState::Open)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TransitionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BreakerObserver for TransitionHistory {
    fn on_log(&self, message: &str) {
        tracing::trace!(target: "tripwire::history", "{message}");
    }

    fn on_transition(&self, name: &str, event: &TransitionEvent) {
        let mut records = self.lock();
        // a racing notifier may deliver a later transition first; slot this
        // one in ahead of any newer record for the same breaker
        let pos = records
            .iter()
            .rposition(|r| r.breaker != name || r.seq < event.seq)
            .map_or(0, |i| i + 1);
        records.insert(
            pos,
            TransitionRecord {
                breaker: name.to_string(),
                from: event.from,
                to: event.to,
                seq: event.seq,
                at: event.at,
            },
        );
        if records.len() > self.capacity {
            records.pop_front();
        }
    }
}
