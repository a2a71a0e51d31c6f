//! Breaker-level error types.

use thiserror::Error;

/// Errors surfaced by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
///
/// The two variants let callers tell "the breaker refused to run the call"
/// apart from "the call ran and failed".
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open. The operation was not invoked.
    #[error("Circuit breaker open: {name}")]
    CircuitOpen { name: String },

    /// The protected operation ran and returned an error.
    #[error("Protected operation failed: {0}")]
    ExecutionFailed(#[source] E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the call was rejected without being attempted.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` if the operation itself failed.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_))
    }

    /// Name of the breaker that rejected the call, if any.
    pub fn breaker_name(&self) -> Option<&str> {
        match self {
            Self::CircuitOpen { name } => Some(name),
            Self::ExecutionFailed(_) => None,
        }
    }

    /// Unwrap the operation's own error, if this is an execution failure.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::ExecutionFailed(e) => Some(e),
        }
    }
}

/// Errors raised while building a breaker or parsing its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Circuit breaker name must not be empty")]
    EmptyName,

    #[error("failure_threshold must be greater than zero")]
    ZeroFailureThreshold,

    #[error("success_threshold must be greater than zero")]
    ZeroSuccessThreshold,

    #[error("recovery_timeout must be greater than zero")]
    ZeroRecoveryTimeout,

    #[error("failure_window must be greater than zero")]
    ZeroFailureWindow,

    #[error("Unknown config preset: {0}")]
    UnknownPreset(String),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn circuit_open_carries_name() {
        let err: BreakerError<std::io::Error> = BreakerError::CircuitOpen {
            name: "payments".into(),
        };
        assert!(err.is_circuit_open());
        assert!(!err.is_execution_failure());
        assert_eq!(err.breaker_name(), Some("payments"));
        assert_eq!(err.to_string(), "Circuit breaker open: payments");
        assert!(err.into_inner().is_none());
    }

    #[test]
    fn execution_failure_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = BreakerError::ExecutionFailed(io);
        assert!(err.is_execution_failure());
        assert!(err.source().is_some());
        assert_eq!(err.breaker_name(), None);
        let inner = err.into_inner().unwrap();
        assert_eq!(inner.kind(), std::io::ErrorKind::ConnectionRefused);
    }
}
