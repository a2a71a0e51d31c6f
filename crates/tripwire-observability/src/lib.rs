//! # tripwire-observability
//!
//! Logging and transition reporting for tripwire circuit breakers.
//!
//! ## Structured logging
//! Breakers emit `tracing` events on every transition (`warn` when a circuit
//! opens, `info` otherwise) and on rejected calls (`debug`). [`init_tracing`]
//! installs a subscriber with per-component levels, as text or JSON.
//!
//! ## Transition history
//! [`TransitionHistory`] is a [`BreakerObserver`](tripwire_core::BreakerObserver)
//! that keeps the most recent transitions in memory for status pages and
//! debugging.

pub mod history;
pub mod tracing_setup;

pub use history::{TransitionHistory, TransitionRecord};
pub use tracing_setup::{init_tracing, LogConfig};
