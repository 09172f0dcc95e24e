//! Ordered fallback over the prediction strategies

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::features::FeatureVector;
use super::strategy::PredictionStrategy;
use crate::controller::breaker::HealthGate;
use crate::domain::PredictionResult;
use crate::error::ErrorClass;

/// Walks strategies in priority order and returns the first success.
pub struct PredictionOrchestrator<'a> {
    gate: &'a HealthGate,
}

impl<'a> PredictionOrchestrator<'a> {
    pub fn new(gate: &'a HealthGate) -> Self {
        Self { gate }
    }

    /// Never fails. Strategy errors are recorded against that strategy's
    /// breaker; if nothing succeeds the result is a zero-value
    /// `error_fallback`.
    pub fn predict(
        &self,
        strategies: &[&dyn PredictionStrategy],
        features: &FeatureVector,
        now: DateTime<Utc>,
    ) -> PredictionResult {
        for strategy in strategies {
            let method = strategy.method();
            if !strategy.is_available() {
                debug!(strategy = %method, "Strategy unavailable");
                continue;
            }

            let breaker = self.gate.breaker(method);
            if let Some(breaker) = breaker {
                if !breaker.should_allow_request_at(now) {
                    debug!(strategy = %method, "Strategy skipped, circuit open");
                    continue;
                }
            }

            match strategy.predict(features) {
                Ok(result) => {
                    if let Some(breaker) = breaker {
                        breaker.record_success();
                    }
                    return result;
                }
                Err(e) => match e.class() {
                    ErrorClass::Unavailable => {
                        debug!(strategy = %method, "Strategy unavailable");
                        if let Some(breaker) = breaker {
                            breaker.release();
                        }
                    }
                    class => {
                        warn!(strategy = %method, error = %e, "Prediction strategy failed");
                        if let Some(breaker) = breaker {
                            breaker.record_failure_at(class, now);
                        }
                    }
                },
            }
        }

        warn!("All prediction strategies failed, returning error fallback");
        PredictionResult::error_fallback(*features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::controller::breaker::CircuitState;
    use crate::domain::PredictionMethod;
    use crate::error::ForecastError;
    use crate::forecast::strategy::MockPredictionStrategy;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ok(method: PredictionMethod, value: f64) -> MockPredictionStrategy {
        let mut mock = MockPredictionStrategy::new();
        mock.expect_method().return_const(method);
        mock.expect_is_available().return_const(true);
        mock.expect_predict()
            .returning(move |f| Ok(PredictionResult::new(value, 0.5, method, *f)));
        mock
    }

    fn unavailable(method: PredictionMethod) -> MockPredictionStrategy {
        let mut mock = MockPredictionStrategy::new();
        mock.expect_method().return_const(method);
        mock.expect_is_available().return_const(false);
        mock.expect_predict().never();
        mock
    }

    fn failing(method: PredictionMethod, configuration: bool) -> MockPredictionStrategy {
        let mut mock = MockPredictionStrategy::new();
        mock.expect_method().return_const(method);
        mock.expect_is_available().return_const(true);
        mock.expect_predict().returning(move |_| {
            Err(if configuration {
                ForecastError::Configuration("weight count mismatch".into())
            } else {
                ForecastError::InvalidData("bad input".into())
            })
        });
        mock
    }

    #[test]
    fn test_first_success_wins() {
        let gate = HealthGate::new(&CircuitBreakerConfig::default());
        let model = ok(PredictionMethod::Model, 3.0);
        let mut profile = MockPredictionStrategy::new();
        profile.expect_method().return_const(PredictionMethod::Profile);
        profile.expect_is_available().never();
        profile.expect_predict().never();

        let result = PredictionOrchestrator::new(&gate).predict(
            &[&model, &profile],
            &FeatureVector::neutral(),
            now(),
        );
        assert_eq!(result.method, PredictionMethod::Model);
        assert_eq!(result.value, 3.0);
    }

    #[test]
    fn test_falls_back_to_heuristic() {
        let gate = HealthGate::new(&CircuitBreakerConfig::default());
        let model = unavailable(PredictionMethod::Model);
        let profile = unavailable(PredictionMethod::Profile);
        let heuristic = ok(PredictionMethod::Heuristic, 1.5);

        let result = PredictionOrchestrator::new(&gate).predict(
            &[&model, &profile, &heuristic],
            &FeatureVector::neutral(),
            now(),
        );
        assert_eq!(result.method, PredictionMethod::Heuristic);
        // unavailability is not a breaker failure
        assert_eq!(gate.snapshot()[&PredictionMethod::Model].consecutive_failures, 0);
    }

    #[test]
    fn test_failures_feed_the_breaker() {
        let gate = HealthGate::new(&CircuitBreakerConfig::default());
        let model = failing(PredictionMethod::Model, false);
        let profile = ok(PredictionMethod::Profile, 2.0);
        let orchestrator = PredictionOrchestrator::new(&gate);

        for _ in 0..3 {
            let result = orchestrator.predict(&[&model, &profile], &FeatureVector::neutral(), now());
            assert_eq!(result.method, PredictionMethod::Profile);
        }
        let model_breaker = gate.breaker(PredictionMethod::Model).unwrap();
        assert_eq!(model_breaker.state(), CircuitState::Open);
        assert!(!model_breaker.should_allow_request_at(now() + Duration::seconds(10)));
    }

    #[test]
    fn test_open_breaker_skips_strategy() {
        let gate = HealthGate::new(&CircuitBreakerConfig::default());
        let model = failing(PredictionMethod::Model, true);
        let profile = ok(PredictionMethod::Profile, 2.0);
        let orchestrator = PredictionOrchestrator::new(&gate);

        orchestrator.predict(&[&model, &profile], &FeatureVector::neutral(), now());
        assert_eq!(gate.breaker(PredictionMethod::Model).unwrap().state(), CircuitState::Open);

        let mut skipped = MockPredictionStrategy::new();
        skipped.expect_method().return_const(PredictionMethod::Model);
        skipped.expect_is_available().return_const(true);
        skipped.expect_predict().never();
        let result = orchestrator.predict(
            &[&skipped, &profile],
            &FeatureVector::neutral(),
            now() + Duration::seconds(5),
        );
        assert_eq!(result.method, PredictionMethod::Profile);
    }

    #[test]
    fn test_all_failing_returns_error_fallback() {
        let gate = HealthGate::new(&CircuitBreakerConfig::default());
        let model = failing(PredictionMethod::Model, false);
        let profile = failing(PredictionMethod::Profile, false);
        let heuristic = failing(PredictionMethod::Heuristic, false);

        let result = PredictionOrchestrator::new(&gate).predict(
            &[&model, &profile, &heuristic],
            &FeatureVector::neutral(),
            now(),
        );
        assert_eq!(result.method, PredictionMethod::ErrorFallback);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.confidence, 0.0);
    }
}
