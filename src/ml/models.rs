//! Learned artifacts: the ridge model and the hourly production profile
//!
//! Both serialize to JSON with named keys so a stored model can be checked
//! against the current feature schema before it is used.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::scaler::StandardScaler;
use crate::domain::HistoryRecord;
use crate::error::{ForecastError, ForecastResult};
use crate::forecast::{Feature, FeatureVector, FEATURE_COUNT};

/// Bumped when the stored layout changes
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Linear model over the standardized feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedModel {
    pub model_id: String,
    weights: [f64; FEATURE_COUNT],
    pub bias: f64,
    scaler: StandardScaler,
    /// R² on the training rows, 0.0 - 1.0
    pub accuracy: f64,
    pub training_samples: usize,
    pub trained_at: DateTime<Utc>,
    pub regularization_lambda: f64,
}

/// Same training run, same id
fn model_id(trained_at: DateTime<Utc>, training_samples: usize, lambda: f64) -> String {
    let key = format!("{}/{}/{}", trained_at.to_rfc3339(), training_samples, lambda.to_bits());
    format!("ridge_{}", uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes()))
}

impl LearnedModel {
    pub fn new(
        weights: [f64; FEATURE_COUNT],
        bias: f64,
        scaler: StandardScaler,
        accuracy: f64,
        training_samples: usize,
        trained_at: DateTime<Utc>,
        regularization_lambda: f64,
    ) -> Self {
        Self {
            model_id: model_id(trained_at, training_samples, regularization_lambda),
            weights,
            bias,
            scaler,
            accuracy: if accuracy.is_finite() { accuracy.clamp(0.0, 1.0) } else { 0.0 },
            training_samples,
            trained_at,
            regularization_lambda,
        }
    }

    pub fn weight(&self, feature: Feature) -> f64 {
        self.weights[feature.index()]
    }

    pub fn weights(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.weights[f.index()]))
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Unclamped model output
    pub fn raw_output(&self, features: &FeatureVector) -> f64 {
        let scaled = self.scaler.transform(features);
        self.bias
            + self
                .weights
                .iter()
                .zip(scaled.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// Every coefficient finite
    pub fn is_usable(&self) -> bool {
        self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.trained_at
    }

    pub fn to_bytes(&self) -> ForecastResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.to_record())?)
    }

    /// Decode and check the stored weights against the feature schema
    pub fn from_bytes(bytes: &[u8]) -> ForecastResult<Self> {
        let record: LearnedModelRecord = serde_json::from_slice(bytes)?;
        Self::from_record(record)
    }

    fn to_record(&self) -> LearnedModelRecord {
        LearnedModelRecord {
            format_version: MODEL_FORMAT_VERSION,
            model_id: self.model_id.clone(),
            weights: named(&self.weights),
            bias: self.bias,
            feature_means: named(self.scaler.means()),
            feature_stds: named(self.scaler.stds()),
            accuracy: self.accuracy,
            training_samples: self.training_samples,
            trained_at: self.trained_at,
            regularization_lambda: self.regularization_lambda,
        }
    }

    fn from_record(record: LearnedModelRecord) -> ForecastResult<Self> {
        if record.format_version != MODEL_FORMAT_VERSION {
            return Err(ForecastError::Configuration(format!(
                "unsupported model format version {}",
                record.format_version
            )));
        }
        if !record.bias.is_finite() {
            return Err(ForecastError::Configuration("model bias is not finite".into()));
        }
        let weights = from_named(&record.weights, "weights")?;
        let scaler = StandardScaler::from_parts(
            from_named(&record.feature_means, "feature_means")?,
            from_named(&record.feature_stds, "feature_stds")?,
        )?;

        Ok(Self {
            model_id: record.model_id,
            weights,
            bias: record.bias,
            scaler,
            accuracy: if record.accuracy.is_finite() { record.accuracy.clamp(0.0, 1.0) } else { 0.0 },
            training_samples: record.training_samples,
            trained_at: record.trained_at,
            regularization_lambda: record.regularization_lambda,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LearnedModelRecord {
    format_version: u32,
    model_id: String,
    weights: BTreeMap<String, f64>,
    bias: f64,
    feature_means: BTreeMap<String, f64>,
    feature_stds: BTreeMap<String, f64>,
    accuracy: f64,
    training_samples: usize,
    trained_at: DateTime<Utc>,
    regularization_lambda: f64,
}

fn named(values: &[f64; FEATURE_COUNT]) -> BTreeMap<String, f64> {
    Feature::ALL
        .iter()
        .map(|f| (f.name().to_string(), values[f.index()]))
        .collect()
}

fn from_named(map: &BTreeMap<String, f64>, what: &str) -> ForecastResult<[f64; FEATURE_COUNT]> {
    if map.len() != FEATURE_COUNT {
        return Err(ForecastError::Configuration(format!(
            "{what}: expected {FEATURE_COUNT} entries, found {}",
            map.len()
        )));
    }
    let mut out = [0.0; FEATURE_COUNT];
    for (name, value) in map {
        let feature = Feature::from_str(name)
            .map_err(|_| ForecastError::Configuration(format!("{what}: unknown feature '{name}'")))?;
        if !value.is_finite() {
            return Err(ForecastError::Configuration(format!(
                "{what}: value for '{name}' is not finite"
            )));
        }
        out[feature.index()] = *value;
    }
    Ok(out)
}

/// Average positive production per hour of day
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyProfile {
    hourly_average: [f64; 24],
    /// Positive actuals that went into the profile
    pub sample_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl HourlyProfile {
    /// Hours without a positive actual stay at 0
    pub fn from_records(records: &[HistoryRecord], now: DateTime<Utc>) -> Self {
        let mut sums = [0.0; 24];
        let mut counts = [0usize; 24];
        let mut sample_count = 0;

        for (record, actual) in records.iter().filter_map(|r| r.actual().map(|a| (r, a))) {
            if actual > 0.0 {
                let hour = record.timestamp.hour() as usize;
                sums[hour] += actual;
                counts[hour] += 1;
                sample_count += 1;
            }
        }

        let mut hourly_average = [0.0; 24];
        for hour in 0..24 {
            if counts[hour] > 0 {
                hourly_average[hour] = sums[hour] / counts[hour] as f64;
            }
        }

        Self {
            hourly_average,
            sample_count,
            updated_at: now,
        }
    }

    pub fn average(&self, hour: u32) -> f64 {
        self.hourly_average.get(hour as usize).copied().unwrap_or(0.0)
    }

    pub fn to_bytes(&self) -> ForecastResult<Vec<u8>> {
        let record = HourlyProfileRecord {
            hourly_average: (0..24u32)
                .map(|h| (h.to_string(), self.hourly_average[h as usize]))
                .collect(),
            sample_count: self.sample_count,
            updated_at: self.updated_at,
        };
        Ok(serde_json::to_vec_pretty(&record)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ForecastResult<Self> {
        let record: HourlyProfileRecord = serde_json::from_slice(bytes)?;
        let mut hourly_average = [0.0; 24];
        for (key, value) in &record.hourly_average {
            let hour = key
                .parse::<usize>()
                .ok()
                .filter(|h| *h < 24)
                .ok_or_else(|| ForecastError::Configuration(format!("invalid profile hour '{key}'")))?;
            if !value.is_finite() || *value < 0.0 {
                return Err(ForecastError::Configuration(format!(
                    "invalid profile average for hour {hour}"
                )));
            }
            hourly_average[hour] = *value;
        }
        Ok(Self {
            hourly_average,
            sample_count: record.sample_count,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HourlyProfileRecord {
    hourly_average: BTreeMap<String, f64>,
    sample_count: usize,
    updated_at: DateTime<Utc>,
}
