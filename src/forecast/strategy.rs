//! Prediction strategies, highest priority first: learned model, hourly
//! profile, closed-form daylight curve.

use crate::config::{PlantConfig, StrategyConfig};
use crate::domain::{PredictionMethod, PredictionResult};
use crate::error::{ForecastError, ForecastResult};
use crate::ml::{HourlyProfile, LearnedModel};

use super::features::{Feature, FeatureVector};

/// Fixed confidence of the profile fallback
pub const PROFILE_CONFIDENCE: f64 = 0.6;
/// Fixed confidence of the daylight curve
pub const HEURISTIC_CONFIDENCE: f64 = 0.3;
/// Applied when yesterday's same-hour production is known
const SAME_HOUR_CONFIDENCE_BOOST: f64 = 1.1;

/// One source of production estimates
#[cfg_attr(test, mockall::automock)]
pub trait PredictionStrategy: Send + Sync {
    fn method(&self) -> PredictionMethod;

    /// Whether the strategy's own preconditions hold
    fn is_available(&self) -> bool;

    fn predict(&self, features: &FeatureVector) -> ForecastResult<PredictionResult>;
}

fn cloud_factor(features: &FeatureVector) -> f64 {
    ((100.0 - features[Feature::Cloudiness]) / 100.0).clamp(0.0, 1.0)
}

/// Ridge model over the full feature vector
pub struct ModelStrategy<'a> {
    model: Option<&'a LearnedModel>,
    max_output: f64,
}

impl<'a> ModelStrategy<'a> {
    pub fn new(model: Option<&'a LearnedModel>, plant: &PlantConfig) -> Self {
        Self {
            model,
            max_output: plant.max_output_kwh,
        }
    }

    fn confidence(model: &LearnedModel, features: &FeatureVector) -> f64 {
        let mut confidence = model.accuracy;
        if features[Feature::ProductionSameHour1d] != 0.0 {
            confidence *= SAME_HOUR_CONFIDENCE_BOOST;
        }
        confidence *= 0.8 + 0.2 * features[Feature::WeatherStability];
        confidence.clamp(0.0, 1.0)
    }
}

impl PredictionStrategy for ModelStrategy<'_> {
    fn method(&self) -> PredictionMethod {
        PredictionMethod::Model
    }

    fn is_available(&self) -> bool {
        self.model.is_some()
    }

    fn predict(&self, features: &FeatureVector) -> ForecastResult<PredictionResult> {
        let model = self
            .model
            .ok_or(ForecastError::StrategyUnavailable(PredictionMethod::Model))?;
        if !model.is_usable() {
            return Err(ForecastError::Configuration(format!(
                "model {} has non-finite coefficients",
                model.model_id
            )));
        }
        if !features.is_finite() {
            return Err(ForecastError::InvalidData("feature vector is not finite".into()));
        }

        let raw = model.raw_output(features);
        if !raw.is_finite() {
            return Err(ForecastError::InvalidData("model output is not finite".into()));
        }

        Ok(PredictionResult::new(
            raw.clamp(0.0, self.max_output),
            Self::confidence(model, features),
            PredictionMethod::Model,
            *features,
        ))
    }
}

/// Average production for the hour, scaled by clouds and season
pub struct ProfileStrategy<'a> {
    profile: Option<&'a HourlyProfile>,
    min_samples: usize,
    max_output: f64,
}

impl<'a> ProfileStrategy<'a> {
    pub fn new(profile: Option<&'a HourlyProfile>, strategies: &StrategyConfig, plant: &PlantConfig) -> Self {
        Self {
            profile,
            min_samples: strategies.profile_min_samples,
            max_output: plant.max_output_kwh,
        }
    }
}

impl PredictionStrategy for ProfileStrategy<'_> {
    fn method(&self) -> PredictionMethod {
        PredictionMethod::Profile
    }

    fn is_available(&self) -> bool {
        self.profile
            .is_some_and(|p| p.sample_count >= self.min_samples)
    }

    fn predict(&self, features: &FeatureVector) -> ForecastResult<PredictionResult> {
        let profile = self
            .profile
            .filter(|p| p.sample_count >= self.min_samples)
            .ok_or(ForecastError::StrategyUnavailable(PredictionMethod::Profile))?;

        let hour = features[Feature::HourOfDay];
        if !hour.is_finite() {
            return Err(ForecastError::InvalidData("hour of day is not finite".into()));
        }
        let average = profile.average(hour.floor().clamp(0.0, 23.0) as u32);
        let value = average * cloud_factor(features) * (0.5 + features[Feature::SeasonalFactor]);

        Ok(PredictionResult::new(
            value.clamp(0.0, self.max_output),
            PROFILE_CONFIDENCE,
            PredictionMethod::Profile,
            *features,
        ))
    }
}

/// Sine-shaped daylight curve; always available
pub struct HeuristicStrategy {
    peak_output: f64,
    daylight_start: f64,
    daylight_hours: f64,
}

impl HeuristicStrategy {
    pub fn new(strategies: &StrategyConfig, plant: &PlantConfig) -> Self {
        Self {
            peak_output: plant.peak_output_kwh,
            daylight_start: strategies.daylight_start_hour,
            daylight_hours: strategies.daylight_hours,
        }
    }

    fn estimate(&self, features: &FeatureVector) -> f64 {
        let hour = features[Feature::HourOfDay];
        let since_start = hour - self.daylight_start;
        if !(since_start >= 0.0 && since_start <= self.daylight_hours) || self.daylight_hours <= 0.0 {
            return 0.0;
        }
        let curve = (since_start * std::f64::consts::PI / self.daylight_hours).sin().max(0.0);
        self.peak_output * curve * cloud_factor(features) * features[Feature::SeasonalFactor]
    }
}

impl PredictionStrategy for HeuristicStrategy {
    fn method(&self) -> PredictionMethod {
        PredictionMethod::Heuristic
    }

    fn is_available(&self) -> bool {
        true
    }

    fn predict(&self, features: &FeatureVector) -> ForecastResult<PredictionResult> {
        Ok(PredictionResult::new(
            self.estimate(features),
            HEURISTIC_CONFIDENCE,
            PredictionMethod::Heuristic,
            *features,
        ))
    }
}
