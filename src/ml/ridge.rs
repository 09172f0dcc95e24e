//! Ridge regression by normal equations
//!
//! Solves `(XᵀX + λI) w = Xᵀy` with a bias column appended to `X`. The
//! regularization strength is picked on a chronological hold-out split and
//! the chosen λ is then refit on every row.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::config::TrainingConfig;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::metrics::{r_squared, total_sum_of_squares, ForecastMetrics, MIN_TOTAL_VARIANCE};

/// Fitted coefficients plus fit statistics
#[derive(Debug, Clone)]
pub struct RidgeFit {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub lambda: f64,
    /// R² of the final fit on all rows, clamped to 0.0 - 1.0
    pub accuracy: f64,
    /// Best hold-out R² from the lambda search, if one was scored
    pub validation_r2: Option<f64>,
    pub metrics: Option<ForecastMetrics>,
}

impl RidgeFit {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

pub struct RidgeTrainer {
    config: TrainingConfig,
    max_output: f64,
}

impl RidgeTrainer {
    pub fn new(config: TrainingConfig, max_output: f64) -> Self {
        Self { config, max_output }
    }

    /// Fit on `rows` (n×k) against `targets` (n).
    ///
    /// Rows must be in chronological order. The same input always yields
    /// the same coefficients.
    pub fn train<R: AsRef<[f64]>>(&self, rows: &[R], targets: &[f64]) -> ForecastResult<RidgeFit> {
        let n = rows.len();
        if n < self.config.min_samples {
            return Err(ForecastError::InsufficientData {
                available: n,
                required: self.config.min_samples,
            });
        }
        if targets.len() != n {
            return Err(ForecastError::InvalidData(format!(
                "{} feature rows but {} targets",
                n,
                targets.len()
            )));
        }
        let k = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if k == 0 || rows.iter().any(|r| r.as_ref().len() != k) {
            return Err(ForecastError::Configuration(
                "feature rows must share one non-zero width".into(),
            ));
        }
        if rows.iter().flat_map(|r| r.as_ref()).any(|v| !v.is_finite())
            || targets.iter().any(|v| !v.is_finite())
        {
            return Err(ForecastError::InvalidData("non-finite training value".into()));
        }

        let x = DMatrix::from_fn(n, k + 1, |i, j| if j < k { rows[i].as_ref()[j] } else { 1.0 });
        let y = DVector::from_column_slice(targets);

        let (lambda, validation_r2) = self.select_lambda(&x, &y);
        let coefficients = solve(&x, &y, lambda)?;

        let predictions: Vec<f64> = (&x * &coefficients)
            .iter()
            .map(|p| p.clamp(0.0, self.max_output))
            .collect();

        let accuracy = if total_sum_of_squares(targets) < MIN_TOTAL_VARIANCE {
            warn!(
                condition = "no_variance",
                samples = n,
                "Training targets have no variance, accuracy set to 0"
            );
            0.0
        } else {
            r_squared(targets, &predictions).unwrap_or(0.0).clamp(0.0, 1.0)
        };

        Ok(RidgeFit {
            weights: coefficients.iter().take(k).copied().collect(),
            bias: coefficients[k],
            lambda,
            accuracy,
            validation_r2,
            metrics: ForecastMetrics::calculate(targets, &predictions).ok(),
        })
    }

    /// Pick λ by hold-out R². Ties keep the earlier candidate.
    fn select_lambda(&self, x: &DMatrix<f64>, y: &DVector<f64>) -> (f64, Option<f64>) {
        let n = x.nrows();
        let split = (n as f64 * self.config.train_ratio).floor() as usize;
        let validation_rows = n.saturating_sub(split);

        if split == 0 || validation_rows < self.config.min_validation_rows {
            debug!(
                validation_rows,
                lambda = self.config.default_lambda,
                "Too few validation rows, using default lambda"
            );
            return (self.config.default_lambda, None);
        }

        let x_train = x.rows(0, split).into_owned();
        let y_train = y.rows(0, split).into_owned();
        let x_val = x.rows(split, validation_rows).into_owned();
        let y_val: Vec<f64> = y.rows(split, validation_rows).iter().copied().collect();

        let mut best: Option<(f64, f64)> = None;
        for &lambda in &self.config.lambda_candidates {
            let w = match solve(&x_train, &y_train, lambda) {
                Ok(w) => w,
                Err(e) => {
                    warn!(lambda, error = %e, "Skipping lambda candidate");
                    continue;
                }
            };
            let predicted: Vec<f64> = (&x_val * &w)
                .iter()
                .map(|p| p.clamp(0.0, self.max_output))
                .collect();
            let Some(score) = r_squared(&y_val, &predicted) else {
                continue;
            };
            debug!(lambda, r2 = score, "Scored lambda candidate");
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((lambda, score));
            }
        }

        match best {
            Some((lambda, score)) => (lambda, Some(score)),
            None => (self.config.default_lambda, None),
        }
    }
}

/// Solve the regularized normal equations; Cholesky first, LU as fallback
fn solve(x: &DMatrix<f64>, y: &DVector<f64>, lambda: f64) -> ForecastResult<DVector<f64>> {
    let p = x.ncols();
    let xtx = x.tr_mul(x) + DMatrix::<f64>::identity(p, p) * lambda;
    let xty = x.tr_mul(y);

    let solution = match xtx.clone().cholesky() {
        Some(chol) => Some(chol.solve(&xty)),
        None => xtx.lu().solve(&xty),
    };

    match solution {
        Some(w) if w.iter().all(|v| v.is_finite()) => Ok(w),
        _ => Err(ForecastError::NumericInstability { lambda }),
    }
}
