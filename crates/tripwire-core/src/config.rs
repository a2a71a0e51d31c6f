//! Circuit breaker configuration and named presets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a circuit breaker.
///
/// Serialized form uses milliseconds for the two durations:
///
/// ```json
/// { "failure_threshold": 3, "recovery_timeout_ms": 15000,
///   "success_threshold": 1, "failure_window_ms": 30000 }
/// ```
///
/// Missing fields fall back to [`CircuitBreakerConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures inside `failure_window` that trip the circuit open.
    pub failure_threshold: u32,
    /// How long to stay open before a trial call is allowed.
    #[serde(rename = "recovery_timeout_ms", with = "duration_ms")]
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes needed to close again.
    pub success_threshold: u32,
    /// Only failures this recent count toward `failure_threshold`.
    #[serde(rename = "failure_window_ms", with = "duration_ms")]
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
            failure_window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Trips quickly and retries early. Suited to latency-sensitive paths.
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(15),
            success_threshold: 1,
            failure_window: Duration::from_secs(30),
        }
    }

    /// Tolerates bursts of failures and recovers cautiously.
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            failure_window: Duration::from_secs(120),
        }
    }

    /// Resolve a preset by name: `"default"`, `"aggressive"` or `"lenient"`.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::default()),
            "aggressive" => Ok(Self::aggressive()),
            "lenient" => Ok(Self::lenient()),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    /// Check that every threshold and duration is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::ZeroSuccessThreshold);
        }
        if self.recovery_timeout.is_zero() {
            return Err(ConfigError::ZeroRecoveryTimeout);
        }
        if self.failure_window.is_zero() {
            return Err(ConfigError::ZeroFailureWindow);
        }
        Ok(())
    }

    /// Parse a JSON document and validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{ser::Error as _, Deserialize, Deserializer, Serializer};

    /// Sub-millisecond remainders round up so a positive duration never
    /// serializes as zero.
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let partial = u128::from(d.subsec_nanos() % 1_000_000 != 0);
        let millis = u64::try_from(d.as_millis() + partial)
            .map_err(|_| S::Error::custom(format!("duration {d:?} overflows u64 milliseconds")))?;
        s.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
