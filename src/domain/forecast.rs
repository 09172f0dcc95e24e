use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::forecast::FeatureVector;

/// Forecast confidence level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ForecastConfidence {
    High,   // > 90% accuracy expected
    Medium, // 70-90% accuracy expected
    Low,    // < 70% accuracy expected
}

impl std::fmt::Display for ForecastConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl ForecastConfidence {
    /// Create from a numerical accuracy value (0.0 - 1.0)
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.9 {
            Self::High
        } else if accuracy >= 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Which source produced a prediction
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionMethod {
    Model,
    Profile,
    Heuristic,
    /// Every strategy failed; value and confidence are zero
    ErrorFallback,
}

/// Outcome of a single prediction call
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Predicted production for the interval (kWh), never negative
    pub value: f64,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub method: PredictionMethod,
    pub features_used: FeatureVector,
}

impl PredictionResult {
    pub fn new(value: f64, confidence: f64, method: PredictionMethod, features_used: FeatureVector) -> Self {
        Self {
            value: if value.is_finite() { value.max(0.0) } else { 0.0 },
            confidence: if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 },
            method,
            features_used,
        }
    }

    pub fn error_fallback(features_used: FeatureVector) -> Self {
        Self::new(0.0, 0.0, PredictionMethod::ErrorFallback, features_used)
    }

    pub fn band(&self) -> ForecastConfidence {
        ForecastConfidence::from_accuracy(self.confidence)
    }
}

/// Report of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub success: bool,
    /// R² of the final fit, clamped to 0.0 - 1.0
    pub accuracy: f64,
    pub samples_used: usize,
    pub lambda: Option<f64>,
    /// Best held-out R² seen during the lambda search, if one ran
    pub validation_r2: Option<f64>,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    pub error: Option<String>,
}

impl TrainingResult {
    pub fn failed(samples_used: usize, error: impl ToString) -> Self {
        Self {
            success: false,
            samples_used,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_from_accuracy() {
        assert_eq!(ForecastConfidence::from_accuracy(0.95), ForecastConfidence::High);
        assert_eq!(ForecastConfidence::from_accuracy(0.75), ForecastConfidence::Medium);
        assert_eq!(ForecastConfidence::from_accuracy(0.3), ForecastConfidence::Low);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(PredictionMethod::ErrorFallback.to_string(), "error_fallback");
        assert_eq!("profile".parse::<PredictionMethod>().unwrap(), PredictionMethod::Profile);
    }

    #[test]
    fn test_result_sanitizes_values() {
        let features = FeatureVector::neutral();
        let result = PredictionResult::new(-2.0, 1.4, PredictionMethod::Heuristic, features);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.confidence, 1.0);

        let result = PredictionResult::new(f64::NAN, f64::NAN, PredictionMethod::Model, features);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_error_fallback() {
        let result = PredictionResult::error_fallback(FeatureVector::neutral());
        assert_eq!(result.method, PredictionMethod::ErrorFallback);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.band(), ForecastConfidence::Low);
    }
}
