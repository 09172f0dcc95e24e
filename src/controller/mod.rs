pub mod breaker;
pub mod scheduler;

pub use breaker::{CircuitBreaker, CircuitState, HealthGate, StrategyHealth};
pub use scheduler::{retrain_reason, RetrainOutcome, RetrainReason, RetrainScheduler, TaskStatus};
