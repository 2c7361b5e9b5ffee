//! Safety layer: circuit breakers, latency budgets and emergency rollback.

mod breaker;
mod guard;

pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState, CircuitStatus};
pub use guard::{SafetyLayer, SafetyReport, TierHealth};
