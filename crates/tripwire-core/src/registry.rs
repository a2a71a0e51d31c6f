//! Named registry of shared circuit breakers.
//!
//! Independent call sites protecting the same dependency ask the registry for
//! the breaker by name and end up sharing one state machine.
//! Thread-safe via `Arc<RwLock<HashMap>>`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::config::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::observer::BreakerObserver;
use crate::stats::CircuitBreakerStatistics;

/// Aggregate health across every registered breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Every breaker is closed.
    Healthy,
    /// Some breakers are open or half-open.
    Degraded,
    /// No breaker is closed.
    Unhealthy,
    /// Nothing registered yet.
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Thread-safe registry of named circuit breakers.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
    observer: Option<Arc<dyn BreakerObserver>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config used by [`CircuitBreakerRegistry::breaker_default`].
    pub fn with_default_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Attach `observer` to every breaker this registry creates from now on.
    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Return the breaker registered as `name`, creating it with `config` if absent.
    ///
    /// The first registration wins: when `name` already exists, `config` is
    /// ignored (a warning is logged if it differs from the stored one).
    pub fn breaker(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<CircuitBreaker, ConfigError> {
        if let Some(existing) = self.read().get(name) {
            warn_if_mismatched(existing, &config);
            return Ok(existing.clone());
        }

        // another caller may have registered `name` since the read lock dropped
        match self.write().entry(name.to_string()) {
            Entry::Occupied(existing) => {
                warn_if_mismatched(existing.get(), &config);
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                let breaker = CircuitBreaker::build(name.to_string(), config, self.observer.clone())?;
                slot.insert(breaker.clone());
                tracing::debug!(breaker = %name, "Registered circuit breaker");
                Ok(breaker)
            }
        }
    }

    /// [`CircuitBreakerRegistry::breaker`] with the registry's default config.
    pub fn breaker_default(&self, name: &str) -> Result<CircuitBreaker, ConfigError> {
        self.breaker(name, self.default_config.clone())
    }

    /// Look up a breaker without creating it.
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.read().get(name).cloned()
    }

    /// Remove a breaker. Later lookups by `name` start from a fresh instance.
    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            tracing::debug!(breaker = %name, "Removed circuit breaker");
        }
        removed
    }

    /// Reset every registered breaker to `Closed`.
    pub fn reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.reset();
        }
    }

    /// Statistics for every registered breaker, in no particular order.
    pub fn all_statistics(&self) -> Vec<CircuitBreakerStatistics> {
        self.snapshot().iter().map(CircuitBreaker::statistics).collect()
    }

    /// Every breaker that is not currently `Closed`.
    pub fn unhealthy_breakers(&self) -> Vec<CircuitBreaker> {
        self.snapshot()
            .into_iter()
            .filter(|b| b.state() != CircuitState::Closed)
            .collect()
    }

    /// Summarise the health of all breakers.
    pub fn health(&self) -> HealthStatus {
        let breakers = self.snapshot();
        let closed = breakers
            .iter()
            .filter(|b| b.state() == CircuitState::Closed)
            .count();
        match (breakers.len(), closed) {
            (0, _) => HealthStatus::Unknown,
            (total, closed) if closed == total => HealthStatus::Healthy,
            (_, 0) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        }
    }

    /// Names of all registered breakers (sorted).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone out the current handles so breaker calls (and their observers)
    /// run without the registry lock held.
    fn snapshot(&self) -> Vec<CircuitBreaker> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CircuitBreaker>> {
        self.breakers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CircuitBreaker>> {
        self.breakers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn warn_if_mismatched(existing: &CircuitBreaker, requested: &CircuitBreakerConfig) {
    if existing.config() != requested {
        tracing::warn!(
            breaker = %existing.name(),
            existing = ?existing.config(),
            requested = ?requested,
            "Circuit breaker already registered; ignoring new config"
        );
    }
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn same_name_returns_same_instance() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.breaker("x", CircuitBreakerConfig::default()).unwrap();
        let b = registry.breaker("x", CircuitBreakerConfig::default()).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn first_config_wins() {
        let registry = CircuitBreakerRegistry::new();
        registry.breaker("db", CircuitBreakerConfig::aggressive()).unwrap();
        let again = registry.breaker("db", CircuitBreakerConfig::lenient()).unwrap();
        assert_eq!(again.config(), &CircuitBreakerConfig::aggressive());
    }

    #[test]
    fn remove_then_recreate_is_fresh() {
        let registry = CircuitBreakerRegistry::new();
        let old = registry.breaker("x", CircuitBreakerConfig::aggressive()).unwrap();
        old.force_open();

        assert!(registry.remove("x").is_some());
        assert!(registry.get("x").is_none());
        assert!(registry.remove("x").is_none());

        let fresh = registry.breaker("x", CircuitBreakerConfig::aggressive()).unwrap();
        assert!(!fresh.ptr_eq(&old));
        let stats = fresh.statistics();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 0);
    }

    #[test]
    fn get_does_not_create() {
        let registry = CircuitBreakerRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_config_is_not_registered() {
        let registry = CircuitBreakerRegistry::new();
        let err = registry
            .breaker("bad", CircuitBreakerConfig::default().with_failure_window(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroFailureWindow));
        assert!(registry.get("bad").is_none());
        assert!(matches!(
            registry.breaker_default(""),
            Err(ConfigError::EmptyName)
        ));
    }

    #[test]
    fn unhealthy_and_reset_all() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.breaker_default("a").unwrap();
        registry.breaker_default("b").unwrap();
        let c = registry.breaker_default("c").unwrap();
        assert_eq!(registry.health(), HealthStatus::Healthy);

        a.force_open();
        c.force_open();
        let mut unhealthy: Vec<String> = registry
            .unhealthy_breakers()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        unhealthy.sort();
        assert_eq!(unhealthy, vec!["a", "c"]);
        assert_eq!(registry.health(), HealthStatus::Degraded);

        registry.reset_all();
        assert!(registry.unhealthy_breakers().is_empty());
        assert_eq!(registry.health(), HealthStatus::Healthy);
    }

    #[test]
    fn health_edges() {
        let registry = CircuitBreakerRegistry::new();
        assert_eq!(registry.health(), HealthStatus::Unknown);
        registry.breaker_default("only").unwrap().force_open();
        assert_eq!(registry.health(), HealthStatus::Unhealthy);
    }

    #[test]
    fn all_statistics_covers_every_breaker() {
        let registry = CircuitBreakerRegistry::new()
            .with_default_config(CircuitBreakerConfig::default().with_failure_threshold(1));
        registry.breaker_default("api").unwrap().record_failure();
        registry.breaker_default("cache").unwrap();

        let mut stats = registry.all_statistics();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "api");
        assert_eq!(stats[0].state, CircuitState::Open);
        assert_eq!(stats[1].name, "cache");
        assert!(stats[1].is_healthy());
        assert_eq!(registry.names(), vec!["api", "cache"]);
    }

    #[test]
    fn clones_share_entries() {
        let registry = CircuitBreakerRegistry::new();
        let other = registry.clone();
        let a = registry.breaker_default("shared").unwrap();
        let b = other.get("shared").unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn concurrent_first_registration_yields_one_instance() {
        let registry = CircuitBreakerRegistry::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.breaker_default("contended").unwrap())
            })
            .collect();
        let breakers: Vec<CircuitBreaker> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(breakers.iter().all(|b| b.ptr_eq(&breakers[0])));
    }

    #[test]
    fn racing_registrations_keep_one_config() {
        let registry = CircuitBreakerRegistry::new();
        let handles: Vec<_> = (1..=8u32)
            .map(|n| {
                let registry = registry.clone();
                let config = CircuitBreakerConfig::default().with_failure_threshold(n);
                std::thread::spawn(move || registry.breaker("mixed", config).unwrap())
            })
            .collect();
        let breakers: Vec<CircuitBreaker> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let stored = registry.get("mixed").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(breakers.iter().all(|b| b.ptr_eq(&stored)));
        assert!(breakers.iter().all(|b| b.config() == stored.config()));
    }
}
