//! Forecast Metrics and Evaluation
//!
//! Accuracy metrics used when fitting and scoring the production model.
//! R² is the headline accuracy figure; MAE and RMSE are reported alongside.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target variance below this is treated as "no variance"
pub const MIN_TOTAL_VARIANCE: f64 = 1e-8;

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// R² (coefficient of determination); 0.0 when the targets have no variance
    pub r2: f64,
    /// Number of samples evaluated
    pub sample_count: usize,
    /// Maximum absolute error observed
    pub max_error: f64,
}

impl ForecastMetrics {
    /// Calculate metrics from actual and predicted values
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        if actual.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let max_error = errors.iter().map(|e| e.abs()).fold(0.0f64, f64::max);

        Ok(ForecastMetrics {
            mae,
            rmse: mse.sqrt(),
            r2: r_squared(actual, predicted).unwrap_or(0.0),
            sample_count: actual.len(),
            max_error,
        })
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics: MAE={:.3}, RMSE={:.3}, R²={:.3}, n={}",
            self.mae, self.rmse, self.r2, self.sample_count
        )
    }
}

/// Total sum of squares around the mean
pub fn total_sum_of_squares(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum()
}

/// R² of `predicted` against `actual`.
///
/// `None` when the slices are empty, of different length, or `actual`
/// has no variance. The raw value may be negative.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let ss_tot = total_sum_of_squares(actual);
    if ss_tot < MIN_TOTAL_VARIANCE {
        return None;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

/// Forecast metrics calculation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}
