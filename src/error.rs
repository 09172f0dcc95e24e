use thiserror::Error;

use crate::domain::PredictionMethod;

/// How a failure should be treated by the health gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Structurally broken input or model; not worth retrying
    Configuration,
    /// Data or numeric hiccup that may clear on its own
    Transient,
    /// Preconditions not met; drives fallback, not a failure
    Unavailable,
}

/// Errors produced by the forecasting engine
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Insufficient training data: {available} samples available, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Regularized normal equations are singular for lambda={lambda}")]
    NumericInstability { lambda: f64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Strategy unavailable: {0}")]
    StrategyUnavailable(PredictionMethod),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Model codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ForecastError::Configuration(_) | ForecastError::Codec(_) => ErrorClass::Configuration,
            ForecastError::StrategyUnavailable(_) => ErrorClass::Unavailable,
            ForecastError::InsufficientData { .. }
            | ForecastError::NumericInstability { .. }
            | ForecastError::InvalidData(_) => ErrorClass::Transient,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }
}

pub type ForecastResult<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            ForecastError::Configuration("bad".into()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            ForecastError::NumericInstability { lambda: 0.1 }.class(),
            ErrorClass::Transient
        );
        assert_eq!(
            ForecastError::StrategyUnavailable(PredictionMethod::Model).class(),
            ErrorClass::Unavailable
        );

        let codec = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(ForecastError::from(codec).is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = ForecastError::InsufficientData {
            available: 12,
            required: 50,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient training data: 12 samples available, 50 required"
        );
    }
}
