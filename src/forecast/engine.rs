use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::features::FeatureExtractor;
use super::orchestrator::PredictionOrchestrator;
use super::strategy::{HeuristicStrategy, ModelStrategy, ProfileStrategy};
use crate::config::Config;
use crate::controller::breaker::{HealthGate, StrategyHealth};
use crate::domain::{HistoryBuffer, HistoryRecord, PredictionMethod, PredictionResult, Snapshot, TrainingResult};
use crate::error::ForecastResult;
use crate::ml::{HourlyProfile, LearnedModel, ModelTrainer, TrainingOutcome};

/// The artifacts currently serving predictions. Replaced as a whole,
/// never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    pub model: Option<LearnedModel>,
    pub profile: Option<HourlyProfile>,
}

/// Latency samples kept for the rolling average
const LATENCY_WINDOW: usize = 100;

/// Counters over every `predict` call since start-up
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionStats {
    pub total_predictions: u64,
    /// Answered by any strategy, not the error fallback
    pub successful_predictions: u64,
    /// Answered by something other than the learned model
    pub degraded_predictions: u64,
    pub error_fallbacks: u64,
    pub error_rate: f64,
    pub avg_prediction_ms: f64,
}

#[derive(Debug, Default)]
struct StatsTracker {
    stats: PredictionStats,
    latencies_ms: VecDeque<f64>,
}

impl StatsTracker {
    fn record(&mut self, method: PredictionMethod, elapsed_ms: f64) {
        let stats = &mut self.stats;
        stats.total_predictions += 1;
        match method {
            PredictionMethod::Model => stats.successful_predictions += 1,
            PredictionMethod::ErrorFallback => {
                stats.error_fallbacks += 1;
                stats.degraded_predictions += 1;
            }
            PredictionMethod::Profile | PredictionMethod::Heuristic => {
                stats.successful_predictions += 1;
                stats.degraded_predictions += 1;
            }
        }
        stats.error_rate = stats.error_fallbacks as f64 / stats.total_predictions as f64;

        if self.latencies_ms.len() == LATENCY_WINDOW {
            self.latencies_ms.pop_front();
        }
        self.latencies_ms.push_back(elapsed_ms);
        stats.avg_prediction_ms = self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64;
    }
}

/// Point-in-time view for host diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub model_id: Option<String>,
    pub model_accuracy: Option<f64>,
    pub model_trained_at: Option<DateTime<Utc>>,
    pub model_training_samples: Option<usize>,
    pub profile_samples: usize,
    pub history_records: usize,
    pub eligible_samples: usize,
    pub strategies: BTreeMap<PredictionMethod, StrategyHealth>,
    pub predictions: PredictionStats,
}

/// Production forecast engine: history window, current artifacts and
/// strategy health behind one handle.
pub struct ForecastEngine {
    config: Config,
    extractor: FeatureExtractor,
    trainer: ModelTrainer,
    heuristic: HeuristicStrategy,
    history: RwLock<HistoryBuffer>,
    artifacts: RwLock<Arc<ModelSnapshot>>,
    gate: HealthGate,
    stats: Mutex<StatsTracker>,
}

impl ForecastEngine {
    pub fn new(config: Config) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            trainer: ModelTrainer::new(&config),
            heuristic: HeuristicStrategy::new(&config.strategies, &config.plant),
            history: RwLock::new(HistoryBuffer::new(
                config.history.max_records,
                config.history.max_age(),
            )),
            artifacts: RwLock::new(Arc::new(ModelSnapshot::default())),
            gate: HealthGate::new(&config.circuit_breaker),
            stats: Mutex::new(StatsTracker::default()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forecast the interval starting at `now`. Always returns a result;
    /// degraded quality shows up in `method` and `confidence`.
    pub fn predict(&self, now: DateTime<Utc>, weather: &Snapshot, sensors: &Snapshot) -> PredictionResult {
        let started = Instant::now();
        let features = {
            let history = self.history.read();
            self.extractor.extract(now, weather, sensors, history.as_slice())
        };
        let snapshot = self.current();

        let model = ModelStrategy::new(snapshot.model.as_ref(), &self.config.plant);
        let profile = ProfileStrategy::new(snapshot.profile.as_ref(), &self.config.strategies, &self.config.plant);

        let result =
            PredictionOrchestrator::new(&self.gate).predict(&[&model, &profile, &self.heuristic], &features, now);
        self.stats
            .lock()
            .record(result.method, started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    pub fn prediction_stats(&self) -> PredictionStats {
        self.stats.lock().stats.clone()
    }

    pub fn push_record(&self, record: HistoryRecord) {
        self.history.write().push(record);
    }

    /// Attach ground truth to a held record; false if none matches
    pub fn record_actual(&self, timestamp: DateTime<Utc>, actual: f64) -> bool {
        self.history.write().record_actual(timestamp, actual)
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.read().to_vec()
    }

    pub fn eligible_samples(&self) -> usize {
        self.history.read().eligible_count()
    }

    /// Fit without touching the served artifacts
    pub fn fit(&self, history: &[HistoryRecord], now: DateTime<Utc>) -> ForecastResult<TrainingOutcome> {
        self.trainer.train(history, now)
    }

    /// Swap in a freshly trained model and profile. A profile without any
    /// positive actuals does not replace the current one.
    pub fn install(&self, outcome: TrainingOutcome) -> TrainingResult {
        let TrainingOutcome { result, model, profile } = outcome;
        info!(
            model_id = %model.model_id,
            accuracy = model.accuracy,
            samples = model.training_samples,
            "Installing new model"
        );
        let mut artifacts = self.artifacts.write();
        let profile = if profile.sample_count > 0 {
            Some(profile)
        } else {
            artifacts.profile.clone()
        };
        *artifacts = Arc::new(ModelSnapshot {
            model: Some(model),
            profile,
        });
        result
    }

    pub fn train(&self, history: &[HistoryRecord]) -> TrainingResult {
        self.train_at(history, Utc::now())
    }

    /// Train on `history`; the served model only changes on success
    pub fn train_at(&self, history: &[HistoryRecord], now: DateTime<Utc>) -> TrainingResult {
        match self.fit(history, now) {
            Ok(outcome) => self.install(outcome),
            Err(e) => {
                let samples = history.iter().filter(|r| !r.is_pending()).count();
                warn!(error = %e, samples, "Training failed, keeping current model");
                TrainingResult::failed(samples, e)
            }
        }
    }

    pub fn current(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.artifacts.read())
    }

    /// Restore a stored model; the current profile is kept
    pub fn load_model(&self, bytes: &[u8]) -> ForecastResult<()> {
        let model = LearnedModel::from_bytes(bytes)?;
        info!(model_id = %model.model_id, accuracy = model.accuracy, "Model restored");
        let mut artifacts = self.artifacts.write();
        *artifacts = Arc::new(ModelSnapshot {
            model: Some(model),
            profile: artifacts.profile.clone(),
        });
        Ok(())
    }

    /// Restore a stored profile; the current model is kept
    pub fn load_profile(&self, bytes: &[u8]) -> ForecastResult<()> {
        let profile = HourlyProfile::from_bytes(bytes)?;
        let mut artifacts = self.artifacts.write();
        *artifacts = Arc::new(ModelSnapshot {
            model: artifacts.model.clone(),
            profile: Some(profile),
        });
        Ok(())
    }

    pub fn model_bytes(&self) -> ForecastResult<Option<Vec<u8>>> {
        self.current().model.as_ref().map(LearnedModel::to_bytes).transpose()
    }

    pub fn profile_bytes(&self) -> ForecastResult<Option<Vec<u8>>> {
        self.current().profile.as_ref().map(HourlyProfile::to_bytes).transpose()
    }

    pub fn health(&self) -> EngineHealth {
        let snapshot = self.current();
        let (history_records, eligible_samples) = {
            let history = self.history.read();
            (history.len(), history.eligible_count())
        };
        let model = snapshot.model.as_ref();
        EngineHealth {
            model_id: model.map(|m| m.model_id.clone()),
            model_accuracy: model.map(|m| m.accuracy),
            model_trained_at: model.map(|m| m.trained_at),
            model_training_samples: model.map(|m| m.training_samples),
            profile_samples: snapshot.profile.as_ref().map_or(0, |p| p.sample_count),
            history_records,
            eligible_samples,
            strategies: self.gate.snapshot(),
            predictions: self.prediction_stats(),
        }
    }

    pub fn gate(&self) -> &HealthGate {
        &self.gate
    }
}
