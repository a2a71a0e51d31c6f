//! Three-state circuit breaker: Closed → Open → Half-Open.
//!
//! State transitions:
//! - `Closed` → `Open`:      failures inside `failure_window` reach `failure_threshold`
//! - `Open` → `Half-Open`:   `recovery_timeout` has elapsed (checked lazily on admission)
//! - `Half-Open` → `Closed`: `success_threshold` consecutive trial calls succeed
//! - `Half-Open` → `Open`:   any trial call fails
//!
//! Time is read from [`tokio::time::Instant`], which follows the real clock
//! outside a paused Tokio runtime.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::{BreakerError, ConfigError};
use crate::observer::{BreakerObserver, TransitionEvent};
use crate::stats::CircuitBreakerStatistics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// All requests rejected. Wait for `recovery_timeout` before retrying.
    Open,
    /// Trial requests allowed to test whether the dependency recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// A completed transition, reported once the lock is released.
#[derive(Debug, Clone, Copy)]
struct Transition {
    event: TransitionEvent,
    recent_failures: usize,
}

struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    failure_timestamps: VecDeque<Instant>,
    last_failure_time: Option<Instant>,
    last_state_change_time: Instant,
    transitions: u64,
}

impl CircuitInner {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            failure_timestamps: VecDeque::new(),
            last_failure_time: None,
            last_state_change_time: now,
            transitions: 0,
        }
    }

    /// Move to `to`. Same-state requests are ignored entirely.
    fn transition_to(&mut self, to: CircuitState, now: Instant) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        self.last_state_change_time = now;
        self.transitions += 1;
        self.success_count = 0;
        if to == CircuitState::Closed {
            self.failure_count = 0;
            self.failure_timestamps.clear();
        }
        Some(Transition {
            event: TransitionEvent {
                from,
                to,
                seq: self.transitions,
                at: now,
            },
            recent_failures: self.failure_timestamps.len(),
        })
    }

    /// Drop timestamps older than `window` relative to `now`.
    fn prune(&mut self, now: Instant, window: std::time::Duration) {
        while let Some(&oldest) = self.failure_timestamps.front() {
            if now.saturating_duration_since(oldest) > window {
                self.failure_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

struct Shared {
    name: String,
    config: CircuitBreakerConfig,
    observer: Option<Arc<dyn BreakerObserver>>,
    inner: Mutex<CircuitInner>,
}

/// Thread-safe circuit breaker.
///
/// Cloning is cheap and yields a handle to the same state machine.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in `Closed` state.
    ///
    /// Fails if `name` is empty or any config value is zero.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        Self::build(name.into(), config, None)
    }

    /// Like [`CircuitBreaker::new`], reporting transitions and rejections to `observer`.
    pub fn with_observer(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        observer: Arc<dyn BreakerObserver>,
    ) -> Result<Self, ConfigError> {
        Self::build(name.into(), config, Some(observer))
    }

    pub(crate) fn build(
        name: String,
        config: CircuitBreakerConfig,
        observer: Option<Arc<dyn BreakerObserver>>,
    ) -> Result<Self, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                name,
                config,
                observer,
                inner: Mutex::new(CircuitInner::new(Instant::now())),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// Current state, without evaluating the Open → Half-Open timer.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns `true` if both handles point at the same breaker.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Returns `true` if a call may go through right now.
    ///
    /// An open circuit whose `recovery_timeout` has elapsed moves to
    /// half-open as a side effect of this check.
    pub fn can_execute(&self) -> bool {
        let now = Instant::now();
        let (allowed, transition) = {
            let mut inner = self.lock();
            let state = inner.state;
            match state {
                CircuitState::Closed | CircuitState::HalfOpen => (true, None),
                CircuitState::Open => {
                    let elapsed = now.saturating_duration_since(inner.last_state_change_time);
                    if elapsed >= self.shared.config.recovery_timeout {
                        (true, inner.transition_to(CircuitState::HalfOpen, now))
                    } else {
                        (false, None)
                    }
                }
            }
        };
        self.notify(transition);
        allowed
    }

    /// Run a synchronous operation under the breaker.
    ///
    /// The operation is never invoked while the circuit is open.
    pub fn execute_blocking<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.can_execute() {
            return Err(self.reject());
        }
        match operation() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::ExecutionFailed(e))
            }
        }
    }

    /// Run an asynchronous operation under the breaker.
    ///
    /// No lock is held while the operation is awaited. If the returned future
    /// is dropped before the operation completes, the outcome is not recorded.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.can_execute() {
            return Err(self.reject());
        }
        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::ExecutionFailed(e))
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let now = Instant::now();
        let transition = {
            let mut inner = self.lock();
            let state = inner.state;
            match state {
                CircuitState::HalfOpen => {
                    inner.success_count += 1;
                    if inner.success_count >= self.shared.config.success_threshold {
                        inner.transition_to(CircuitState::Closed, now)
                    } else {
                        None
                    }
                }
                CircuitState::Closed => {
                    // decays the counter only; the window shrinks by pruning
                    inner.failure_count = inner.failure_count.saturating_sub(1);
                    None
                }
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let transition = {
            let mut inner = self.lock();
            inner.failure_count = inner.failure_count.saturating_add(1);
            inner.last_failure_time = Some(now);
            inner.failure_timestamps.push_back(now);
            inner.prune(now, self.shared.config.failure_window);

            let state = inner.state;
            match state {
                CircuitState::Closed => {
                    let threshold = self.shared.config.failure_threshold as usize;
                    if inner.failure_timestamps.len() >= threshold {
                        inner.transition_to(CircuitState::Open, now)
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => inner.transition_to(CircuitState::Open, now),
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    /// Clear all counters and force the circuit closed.
    pub fn reset(&self) {
        let now = Instant::now();
        let transition = {
            let mut inner = self.lock();
            inner.failure_count = 0;
            inner.success_count = 0;
            inner.failure_timestamps.clear();
            inner.last_failure_time = None;
            inner.transition_to(CircuitState::Closed, now)
        };
        tracing::info!(breaker = %self.shared.name, "Circuit breaker manually reset");
        self.log("manually reset");
        self.notify(transition);
    }

    /// Force the circuit open, e.g. for planned maintenance.
    pub fn force_open(&self) {
        let now = Instant::now();
        let transition = self.lock().transition_to(CircuitState::Open, now);
        tracing::info!(breaker = %self.shared.name, "Circuit breaker forced open");
        self.log("forced open");
        self.notify(transition);
    }

    /// Prune the failure window and return a snapshot.
    pub fn statistics(&self) -> CircuitBreakerStatistics {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.prune(now, self.shared.config.failure_window);

        let time_until_retry = (inner.state == CircuitState::Open).then(|| {
            let elapsed = now.saturating_duration_since(inner.last_state_change_time);
            self.shared.config.recovery_timeout.saturating_sub(elapsed)
        });

        CircuitBreakerStatistics {
            name: self.shared.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            recent_failures: inner.failure_timestamps.len(),
            last_failure_time: inner.last_failure_time,
            last_state_change_time: inner.last_state_change_time,
            time_until_retry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        // state is always left consistent, so a poisoned lock is still usable
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject<E>(&self) -> BreakerError<E> {
        tracing::debug!(breaker = %self.shared.name, "Circuit breaker rejected call");
        self.log("rejected call, circuit open");
        BreakerError::CircuitOpen {
            name: self.shared.name.clone(),
        }
    }

    fn log(&self, message: &str) {
        if let Some(observer) = &self.shared.observer {
            observer.on_log(&format!("Circuit breaker '{}' {message}", self.shared.name));
        }
    }

    fn notify(&self, transition: Option<Transition>) {
        let Some(Transition { event, recent_failures }) = transition else {
            return;
        };
        let TransitionEvent { from, to, seq, .. } = event;
        let name = &self.shared.name;
        if to == CircuitState::Open {
            tracing::warn!(breaker = %name, %from, seq, failures = recent_failures, "Circuit breaker → open");
        } else {
            tracing::info!(breaker = %name, %from, seq, "Circuit breaker → {to}");
        }
        if let Some(observer) = &self.shared.observer {
            observer.on_log(&format!("Circuit breaker '{name}' {from} → {to}"));
            observer.on_transition(name, &event);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}
