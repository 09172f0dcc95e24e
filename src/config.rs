use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_history_floor"))]
pub struct Config {
    #[validate(nested)]
    pub plant: PlantConfig,
    #[validate(nested)]
    pub features: FeatureConfig,
    #[validate(nested)]
    pub training: TrainingConfig,
    #[validate(nested)]
    pub strategies: StrategyConfig,
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[validate(nested)]
    pub retrain: RetrainConfig,
    #[validate(nested)]
    pub history: HistoryConfig,
    pub host: HostConfig,
}

/// Physical limits of the installation
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PlantConfig {
    /// Upper clamp for any prediction (kWh per forecast interval)
    #[validate(range(min = 0.001))]
    pub max_output_kwh: f64,
    /// Peak of the heuristic bell curve (kWh per forecast interval)
    #[validate(range(min = 0.0))]
    pub peak_output_kwh: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            max_output_kwh: 12.0,
            peak_output_kwh: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct FeatureConfig {
    /// Span of history required before time-series features are computed
    #[validate(range(min = 1))]
    pub min_history_days: i64,
    pub default_temperature_c: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub default_humidity_percent: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub default_cloudiness_percent: f64,
    #[validate(range(min = 0.0))]
    pub default_wind_speed_ms: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_history_days: 7,
            default_temperature_c: 15.0,
            default_humidity_percent: 60.0,
            default_cloudiness_percent: 50.0,
            default_wind_speed_ms: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    /// Minimum number of ground-truth records before training may run
    #[validate(range(min = 5))]
    pub min_samples: usize,
    #[validate(length(min = 1))]
    pub lambda_candidates: Vec<f64>,
    #[validate(range(min = 0.0))]
    pub default_lambda: f64,
    /// Chronological share of rows used for fitting during the lambda search
    #[validate(range(min = 0.05, max = 0.95))]
    pub train_ratio: f64,
    /// Below this many validation rows the lambda search is skipped
    #[validate(range(min = 1))]
    pub min_validation_rows: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: 50,
            lambda_candidates: vec![0.001, 0.01, 0.1, 1.0, 10.0],
            default_lambda: 0.1,
            train_ratio: 0.8,
            min_validation_rows: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct StrategyConfig {
    /// ProfileStrategy needs at least this many samples in the hourly profile
    pub profile_min_samples: usize,
    #[validate(range(min = 0.0, max = 23.0))]
    pub daylight_start_hour: f64,
    #[validate(range(min = 1.0, max = 24.0))]
    pub daylight_hours: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            profile_min_samples: 10,
            daylight_start_hour: 6.0,
            daylight_hours: 14.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    #[validate(range(min = 1))]
    pub failure_threshold: u32,
    #[validate(range(min = 1))]
    pub success_threshold: u32,
    #[validate(range(min = 1))]
    pub open_timeout_seconds: u64,
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.open_timeout_seconds as i64)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RetrainConfig {
    /// Retrain when the served model's accuracy drops below this
    #[validate(range(min = 0.0, max = 1.0))]
    pub accuracy_floor: f64,
    #[validate(range(min = 1))]
    pub max_model_age_days: i64,
    /// Relative growth of ground-truth samples that forces a retrain
    #[validate(range(min = 0.0))]
    pub sample_growth_ratio: f64,
    #[validate(range(min = 1))]
    pub check_interval_seconds: u64,
    /// Hour of day (UTC) of the daily forced run
    #[validate(range(max = 23))]
    pub daily_training_hour: u32,
}

impl RetrainConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(1))
    }

    pub fn max_model_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_model_age_days)
    }
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            accuracy_floor: 0.675,
            max_model_age_days: 7,
            sample_growth_ratio: 0.2,
            check_interval_seconds: 3600,
            daily_training_hour: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct HistoryConfig {
    #[validate(range(min = 1))]
    pub max_records: usize,
    #[validate(range(min = 1))]
    pub max_age_days: i64,
}

impl HistoryConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_age_days)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_records: 24 * 30,
            max_age_days: 30,
        }
    }
}

/// Settings used only by the host binary
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub model_path: Option<PathBuf>,
    pub profile_path: Option<PathBuf>,
}

/// The history window must be able to hold a full training set
fn validate_history_floor(cfg: &Config) -> Result<(), ValidationError> {
    if cfg.history.max_records < cfg.training.min_samples {
        let mut err = ValidationError::new("history_below_training_floor");
        err.message = Some(
            format!(
                "history.max_records ({}) is below training.min_samples ({})",
                cfg.history.max_records, cfg.training.min_samples
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SFML__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}
