//! Point-in-time statistics snapshot for a circuit breaker.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::breaker::CircuitState;

/// Immutable snapshot produced by [`CircuitBreaker::statistics`](crate::CircuitBreaker::statistics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerStatistics {
    pub name: String,
    pub state: CircuitState,
    /// Lifetime-ish failure counter. Decays by one per success while closed.
    pub failure_count: u32,
    /// Consecutive successes (meaningful while half-open).
    pub success_count: u32,
    /// Failures still inside the failure window. This is what trips the circuit.
    pub recent_failures: usize,
    pub last_failure_time: Option<Instant>,
    pub last_state_change_time: Instant,
    /// Remaining cool-down before a trial call is allowed. `None` unless open.
    pub time_until_retry: Option<Duration>,
}

impl CircuitBreakerStatistics {
    /// `true` when the breaker is closed.
    pub fn is_healthy(&self) -> bool {
        self.state == CircuitState::Closed
    }

    /// Time spent in the current state, measured at `now`.
    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_state_change_time)
    }
}

impl fmt::Display for CircuitBreakerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: state={} failures={} recent={} successes={}",
            self.name, self.state, self.failure_count, self.recent_failures, self.success_count
        )?;
        if let Some(wait) = self.time_until_retry {
            write!(f, " retry_in={}ms", wait.as_millis())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CircuitBreaker, CircuitBreakerConfig};

    fn snapshot(state: CircuitState, retry: Option<Duration>) -> CircuitBreakerStatistics {
        CircuitBreakerStatistics {
            name: "ledger".into(),
            state,
            failure_count: 4,
            success_count: 0,
            recent_failures: 3,
            last_failure_time: None,
            last_state_change_time: Instant::now(),
            time_until_retry: retry,
        }
    }

    #[test]
    fn display_closed() {
        let s = snapshot(CircuitState::Closed, None);
        assert!(s.is_healthy());
        assert_eq!(
            s.to_string(),
            "ledger: state=closed failures=4 recent=3 successes=0"
        );
    }

    #[test]
    fn display_open_includes_retry() {
        let s = snapshot(CircuitState::Open, Some(Duration::from_millis(1500)));
        assert!(!s.is_healthy());
        assert!(s.to_string().ends_with("retry_in=1500ms"), "{s}");
    }

    #[tokio::test(start_paused = true)]
    async fn time_in_state_tracks_last_change() {
        let breaker = CircuitBreaker::new("ledger", CircuitBreakerConfig::default()).unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        breaker.force_open();
        tokio::time::advance(Duration::from_secs(4)).await;

        let s = breaker.statistics();
        assert_eq!(s.time_in_state(Instant::now()), Duration::from_secs(4));
        // a `now` before the change saturates to zero
        let before = s.last_state_change_time - Duration::from_secs(1);
        assert_eq!(s.time_in_state(before), Duration::ZERO);
    }
}
