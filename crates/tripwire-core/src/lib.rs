//! tripwire-core: circuit breaker state machine and breaker registry.
//!
//! # Overview
//!
//! A circuit breaker wraps calls to an unreliable dependency and stops
//! invoking it once it is observed to be failing, giving it time to recover
//! before trying it again. The core crate defines:
//!
//! - [`CircuitBreaker`]: the Closed / Open / Half-Open state machine
//! - [`CircuitBreakerConfig`]: thresholds, windows and named presets
//! - [`CircuitBreakerStatistics`]: point-in-time snapshot for reporting
//! - [`CircuitBreakerRegistry`]: named, shared breakers per dependency
//! - [`BreakerObserver`]: hook for transition and log notifications
//! - [`BreakerError`] / [`ConfigError`]: structured error types
//!
//! ```no_run
//! use tripwire_core::{CircuitBreakerConfig, CircuitBreakerRegistry};
//!
//! # async fn fetch() -> Result<String, std::io::Error> { Ok(String::new()) }
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CircuitBreakerRegistry::new();
//! let breaker = registry.breaker("inventory-api", CircuitBreakerConfig::aggressive())?;
//!
//! match breaker.execute(|| fetch()).await {
//!     Ok(body) => println!("{body}"),
//!     Err(e) if e.is_circuit_open() => println!("inventory unavailable, using cache"),
//!     Err(e) => println!("request failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod config;
pub mod error;
pub mod observer;
pub mod registry;
pub mod stats;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
pub use error::{BreakerError, ConfigError};
pub use observer::{BreakerObserver, NoopObserver, TransitionEvent};
pub use registry::{CircuitBreakerRegistry, HealthStatus};
pub use stats::CircuitBreakerStatistics;
