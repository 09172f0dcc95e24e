//! Training pipeline
//!
//! Builds the dataset from history, fits the scaler and ridge model, and
//! rebuilds the hourly profile from the same records.

use chrono::{DateTime, Utc};
use tracing::info;

use super::models::{HourlyProfile, LearnedModel};
use super::ridge::RidgeTrainer;
use super::scaler::StandardScaler;
use crate::config::Config;
use crate::domain::{HistoryRecord, TrainingResult};
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::{FeatureExtractor, FeatureVector, FEATURE_COUNT};

/// Feature rows and targets in chronological order
#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    pub features: Vec<FeatureVector>,
    pub targets: Vec<f64>,
}

impl TrainingDataset {
    pub fn new(features: Vec<FeatureVector>, targets: Vec<f64>) -> ForecastResult<Self> {
        if features.len() != targets.len() {
            return Err(ForecastError::InvalidData(format!(
                "Feature and target count mismatch: {} features, {} targets",
                features.len(),
                targets.len()
            )));
        }
        Ok(Self { features, targets })
    }

    /// One row per record with a usable actual. Each row only sees the
    /// history that preceded its own timestamp.
    pub fn from_history(extractor: &FeatureExtractor, history: &[HistoryRecord]) -> Self {
        let mut dataset = Self::default();
        for record in history {
            let Some(actual) = record.actual() else {
                continue;
            };
            let features = extractor.extract(record.timestamp, &record.weather, &record.sensors, history);
            dataset.features.push(features);
            dataset.targets.push(actual);
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Artifacts of a successful run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub result: TrainingResult,
    pub model: LearnedModel,
    pub profile: HourlyProfile,
}

/// Model Trainer
pub struct ModelTrainer {
    extractor: FeatureExtractor,
    ridge: RidgeTrainer,
}

impl ModelTrainer {
    pub fn new(config: &Config) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            ridge: RidgeTrainer::new(config.training.clone(), config.plant.max_output_kwh),
        }
    }

    /// Fit a new model and profile from `history`.
    ///
    /// Records may arrive in any order. Nothing is kept between calls, so
    /// the same history yields the same coefficients.
    pub fn train(&self, history: &[HistoryRecord], now: DateTime<Utc>) -> ForecastResult<TrainingOutcome> {
        let mut records = history.to_vec();
        records.sort_by_key(|r| r.timestamp);

        let dataset = TrainingDataset::from_history(&self.extractor, &records);
        let scaler = StandardScaler::fit(&dataset.features);
        let rows: Vec<[f64; FEATURE_COUNT]> = dataset.features.iter().map(|f| scaler.transform(f)).collect();

        let fit = self.ridge.train(&rows, &dataset.targets)?;

        let mut weights = [0.0; FEATURE_COUNT];
        weights.copy_from_slice(&fit.weights);

        let model = LearnedModel::new(
            weights,
            fit.bias,
            scaler,
            fit.accuracy,
            dataset.len(),
            now,
            fit.lambda,
        );
        let profile = HourlyProfile::from_records(&records, now);

        info!(
            model_id = %model.model_id,
            samples = dataset.len(),
            accuracy = fit.accuracy,
            lambda = fit.lambda,
            "Model trained"
        );

        Ok(TrainingOutcome {
            result: TrainingResult {
                success: true,
                accuracy: fit.accuracy,
                samples_used: dataset.len(),
                lambda: Some(fit.lambda),
                validation_r2: fit.validation_r2,
                mae: fit.metrics.as_ref().map(|m| m.mae),
                rmse: fit.metrics.as_ref().map(|m| m.rmse),
                error: None,
            },
            model,
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Snapshot;
    use crate::forecast::features::keys;
    use crate::forecast::Feature;
    use chrono::{Duration, TimeZone};

    fn history(days: i64) -> Vec<HistoryRecord> {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        (0..days)
            .map(|d| {
                let cloud = ((d * 37) % 100) as f64;
                let temp = 15.0 + (d % 10) as f64;
                let weather = Snapshot::new()
                    .with(keys::CLOUDINESS, cloud)
                    .with(keys::TEMPERATURE, temp);
                HistoryRecord::new(start + Duration::days(d), 0.0, weather, Snapshot::new())
                    .with_actual(10.0 * (1.0 - cloud / 100.0))
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_dataset_skips_pending_records() {
        let mut records = history(5);
        records.push(HistoryRecord::new(
            records[4].timestamp + Duration::days(1),
            3.0,
            Snapshot::new(),
            Snapshot::new(),
        ));
        let extractor = FeatureExtractor::new(Default::default());
        let dataset = TrainingDataset::from_history(&extractor, &records);
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.targets[0], 10.0);
    }

    #[test]
    fn test_dataset_length_mismatch() {
        assert!(TrainingDataset::new(vec![FeatureVector::neutral()], vec![]).is_err());
    }

    #[test]
    fn test_train_on_daily_history() {
        let trainer = ModelTrainer::new(&Config::default());
        let outcome = trainer.train(&history(60), now()).unwrap();

        assert!(outcome.result.success);
        assert_eq!(outcome.result.samples_used, 60);
        assert!(outcome.result.accuracy > 0.9);
        assert!(outcome.result.mae.is_some());
        assert_eq!(outcome.model.training_samples, 60);
        assert!(outcome.model.weight(Feature::Cloudiness) < 0.0);
        assert_eq!(outcome.profile.sample_count, 60);
    }

    #[test]
    fn test_train_is_order_independent() {
        let trainer = ModelTrainer::new(&Config::default());
        let ordered = trainer.train(&history(60), now()).unwrap();
        let mut shuffled = history(60);
        shuffled.reverse();
        let reversed = trainer.train(&shuffled, now()).unwrap();

        assert!(ordered
            .model
            .weights()
            .zip(reversed.model.weights())
            .all(|((_, a), (_, b))| a == b));
        assert_eq!(ordered.result.accuracy, reversed.result.accuracy);
    }

    #[test]
    fn test_train_requires_minimum_samples() {
        let trainer = ModelTrainer::new(&Config::default());
        let err = trainer.train(&history(20), now()).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { available: 20, required: 50 }
        ));
    }
}
