use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use strum::Display;
use tracing::{error, info, warn};

use crate::config::CircuitBreakerConfig;
use crate::domain::PredictionMethod;
use crate::error::ErrorClass;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    Closed,   // Normal operation - requests pass through
    Open,     // Failure threshold breached - reject all requests
    HalfOpen, // Timeout elapsed - one probe at a time
}

/// Health of a single strategy as seen by its breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyHealth {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerState {
    health: StrategyHealth,
    half_open_successes: u32,
    probe_in_flight: bool,
}

/// Circuit breaker guarding one prediction strategy
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                health: StrategyHealth {
                    state: CircuitState::Closed,
                    consecutive_failures: 0,
                    opened_at: None,
                },
                half_open_successes: 0,
                probe_in_flight: false,
            }),
        }
    }

    pub fn should_allow_request(&self) -> bool {
        self.should_allow_request_at(Utc::now())
    }

    /// False while Open and the timeout has not elapsed. Once it has, the
    /// breaker moves to HalfOpen and admits a single probe; further
    /// requests wait until that probe is recorded.
    pub fn should_allow_request_at(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        match state.health.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = state
                    .health
                    .opened_at
                    .map_or(true, |opened| now - opened >= self.config.open_timeout());
                if !elapsed {
                    return false;
                }
                info!(strategy = %self.name, "Circuit breaker transitioning Open -> HalfOpen (timeout elapsed)");
                state.health.state = CircuitState::HalfOpen;
                state.half_open_successes = 0;
                state.probe_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    false
                } else {
                    state.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match state.health.state {
            CircuitState::HalfOpen => {
                state.probe_in_flight = false;
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.success_threshold {
                    info!(
                        strategy = %self.name,
                        successes = state.half_open_successes,
                        "Circuit breaker transitioning HalfOpen -> Closed"
                    );
                    state.health = StrategyHealth {
                        state: CircuitState::Closed,
                        consecutive_failures: 0,
                        opened_at: None,
                    };
                    state.half_open_successes = 0;
                }
            }
            CircuitState::Closed => {
                state.health.consecutive_failures = 0;
            }
            CircuitState::Open => {
                warn!(strategy = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    pub fn record_failure(&self, class: ErrorClass) {
        self.record_failure_at(class, Utc::now())
    }

    /// Configuration-class failures open the breaker on first occurrence
    pub fn record_failure_at(&self, class: ErrorClass, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.health.consecutive_failures = state.health.consecutive_failures.saturating_add(1);

        match state.health.state {
            CircuitState::Closed => {
                let immediate = class == ErrorClass::Configuration;
                if immediate || state.health.consecutive_failures >= self.config.failure_threshold {
                    error!(
                        strategy = %self.name,
                        failures = state.health.consecutive_failures,
                        configuration_error = immediate,
                        "Circuit breaker transitioning Closed -> Open"
                    );
                    state.health.state = CircuitState::Open;
                    state.health.opened_at = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    strategy = %self.name,
                    "Circuit breaker transitioning HalfOpen -> Open (failure during recovery)"
                );
                state.health.state = CircuitState::Open;
                state.health.opened_at = Some(now);
                state.half_open_successes = 0;
                state.probe_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Hand back an admitted probe that produced no outcome
    pub fn release(&self) {
        self.state.lock().probe_in_flight = false;
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().health.state
    }

    pub fn health(&self) -> StrategyHealth {
        self.state.lock().health.clone()
    }
}

/// One breaker per prediction strategy
#[derive(Debug)]
pub struct HealthGate {
    breakers: BTreeMap<PredictionMethod, CircuitBreaker>,
}

impl HealthGate {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        let breakers = [
            PredictionMethod::Model,
            PredictionMethod::Profile,
            PredictionMethod::Heuristic,
        ]
        .into_iter()
        .map(|method| (method, CircuitBreaker::new(method.to_string(), config.clone())))
        .collect();
        Self { breakers }
    }

    pub fn breaker(&self, method: PredictionMethod) -> Option<&CircuitBreaker> {
        self.breakers.get(&method)
    }

    pub fn snapshot(&self) -> BTreeMap<PredictionMethod, StrategyHealth> {
        self.breakers
            .iter()
            .map(|(method, breaker)| (*method, breaker.health()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("model", CircuitBreakerConfig::default())
    }

    #[test]
    fn test_circuit_opens_after_failures() {
        let cb = breaker();
        for _ in 0..2 {
            cb.record_failure_at(ErrorClass::Transient, t0());
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure_at(ErrorClass::Transient, t0());

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow_request_at(t0() + Duration::seconds(30)));
        assert_eq!(cb.health().opened_at, Some(t0()));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker();
        cb.record_failure_at(ErrorClass::Transient, t0());
        cb.record_failure_at(ErrorClass::Transient, t0());
        cb.record_success();
        cb.record_failure_at(ErrorClass::Transient, t0());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().consecutive_failures, 1);
    }

    #[test]
    fn test_configuration_error_opens_immediately() {
        let cb = breaker();
        cb.record_failure_at(ErrorClass::Configuration, t0());
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow_request_at(t0()));
    }

    #[test]
    fn test_single_probe_after_timeout() {
        let cb = breaker();
        cb.record_failure_at(ErrorClass::Configuration, t0());

        let later = t0() + Duration::seconds(60);
        assert!(cb.should_allow_request_at(later));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.should_allow_request_at(later));
    }

    #[test]
    fn test_half_open_closes_after_successes() {
        let cb = breaker();
        cb.record_failure_at(ErrorClass::Configuration, t0());
        let later = t0() + Duration::seconds(61);

        assert!(cb.should_allow_request_at(later));
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(cb.should_allow_request_at(later));
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.health().consecutive_failures, 0);
        assert_eq!(cb.health().opened_at, None);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker();
        cb.record_failure_at(ErrorClass::Configuration, t0());
        let later = t0() + Duration::seconds(90);

        assert!(cb.should_allow_request_at(later));
        cb.record_failure_at(ErrorClass::Transient, later);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.health().opened_at, Some(later));
        assert!(!cb.should_allow_request_at(later + Duration::seconds(59)));
        assert!(cb.should_allow_request_at(later + Duration::seconds(60)));
    }

    #[test]
    fn test_release_returns_probe() {
        let cb = breaker();
        cb.record_failure_at(ErrorClass::Configuration, t0());
        let later = t0() + Duration::seconds(60);
        assert!(cb.should_allow_request_at(later));
        cb.release();
        assert!(cb.should_allow_request_at(later));
    }

    #[test]
    fn test_health_gate_covers_each_strategy() {
        let gate = HealthGate::new(&CircuitBreakerConfig::default());
        assert!(gate.breaker(PredictionMethod::Model).is_some());
        assert!(gate.breaker(PredictionMethod::ErrorFallback).is_none());

        gate.breaker(PredictionMethod::Model)
            .unwrap()
            .record_failure_at(ErrorClass::Configuration, t0());
        let snapshot = gate.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[&PredictionMethod::Model].state, CircuitState::Open);
        assert_eq!(snapshot[&PredictionMethod::Profile].state, CircuitState::Closed);
    }
}
