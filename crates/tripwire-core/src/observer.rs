//! Observer hook for breaker transitions and log lines.

use tokio::time::Instant;

use crate::breaker::CircuitState;

/// A completed state transition, captured while the breaker lock was held.
///
/// `seq` counts transitions of one breaker starting at 1. Observers run
/// after the lock is released, so two racing transitions may be delivered
/// out of order; sort by `seq` to recover the order they happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    pub from: CircuitState,
    pub to: CircuitState,
    pub seq: u64,
    /// When the breaker changed state (its `last_state_change_time`).
    pub at: Instant,
}

/// Receives notifications from a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// Both methods default to no-ops. Calls happen synchronously, after the
/// breaker has released its internal lock, so implementations may query the
/// breaker again. Keep them cheap: they run on the caller's thread.
pub trait BreakerObserver: Send + Sync {
    /// A human-readable trace line (transitions and rejections).
    fn on_log(&self, _message: &str) {}

    /// A completed state transition. Never called with `from == to`.
    fn on_transition(&self, _name: &str, _event: &TransitionEvent) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BreakerObserver for NoopObserver {}
