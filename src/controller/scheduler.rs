use chrono::{DateTime, NaiveDate, Timelike, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use tokio::sync::{Notify, RwLock};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RetrainConfig;
use crate::domain::TrainingResult;
use crate::forecast::ForecastEngine;
use crate::ml::LearnedModel;

/// Task status tracking
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_result: Option<TrainingResult>,
}

/// Why a retrain was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RetrainReason {
    NoModel,
    AccuracyBelowFloor,
    ModelExpired,
    SampleGrowth,
    DailySchedule,
    Requested,
}

/// Result of one scheduler pass
#[derive(Debug, Clone, PartialEq)]
pub enum RetrainOutcome {
    Trained(TrainingResult),
    Failed(TrainingResult),
    /// Below the training floor; nothing was attempted
    Skipped { available: usize, required: usize },
    /// Shutdown arrived first; the served model is untouched
    Cancelled,
}

/// Retrain decision for the currently served model
pub fn retrain_reason(
    model: Option<&LearnedModel>,
    eligible_samples: usize,
    config: &RetrainConfig,
    now: DateTime<Utc>,
) -> Option<RetrainReason> {
    let Some(model) = model else {
        return Some(RetrainReason::NoModel);
    };
    if model.accuracy < config.accuracy_floor {
        return Some(RetrainReason::AccuracyBelowFloor);
    }
    if model.age(now) > config.max_model_age() {
        return Some(RetrainReason::ModelExpired);
    }
    let growth_limit = model.training_samples as f64 * (1.0 + config.sample_growth_ratio);
    if eligible_samples as f64 > growth_limit {
        return Some(RetrainReason::SampleGrowth);
    }
    None
}

/// Background retraining: periodic checks, a daily forced run and
/// on-demand triggers.
pub struct RetrainScheduler {
    engine: Arc<ForecastEngine>,
    config: RetrainConfig,
    min_samples: usize,
    status: RwLock<TaskStatus>,
    trigger: Notify,
    last_daily_run: Mutex<Option<NaiveDate>>,
}

impl RetrainScheduler {
    pub fn new(engine: Arc<ForecastEngine>) -> Self {
        let config = engine.config().retrain.clone();
        let min_samples = engine.config().training.min_samples;
        Self {
            engine,
            config,
            min_samples,
            status: RwLock::new(TaskStatus::default()),
            trigger: Notify::new(),
            last_daily_run: Mutex::new(None),
        }
    }

    pub fn should_retrain(&self, now: DateTime<Utc>) -> Option<RetrainReason> {
        let snapshot = self.engine.current();
        retrain_reason(
            snapshot.model.as_ref(),
            self.engine.eligible_samples(),
            &self.config,
            now,
        )
    }

    /// Forced run once per day at the configured hour
    fn daily_due(&self, now: DateTime<Utc>) -> bool {
        if now.hour() != self.config.daily_training_hour {
            return false;
        }
        let mut last = self.last_daily_run.lock();
        if *last == Some(now.date_naive()) {
            return false;
        }
        *last = Some(now.date_naive());
        true
    }

    /// Ask the running loop for an immediate retrain
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }

    /// Train on the engine's current history and swap the result in.
    ///
    /// The numeric work runs on the blocking pool. If `cancel` fires first
    /// the pending fit is abandoned and the served model stays as it was.
    pub async fn run_once(&self, reason: RetrainReason, cancel: &CancellationToken) -> RetrainOutcome {
        let now = Utc::now();
        {
            let mut status = self.status.write().await;
            status.last_run = Some(now);
            status.run_count += 1;
        }

        let history = self.engine.history();
        let available = history.iter().filter(|r| !r.is_pending()).count();
        if available < self.min_samples {
            info!(
                %reason,
                available,
                required = self.min_samples,
                "Skipping retrain, not enough ground truth yet"
            );
            return RetrainOutcome::Skipped {
                available,
                required: self.min_samples,
            };
        }

        info!(%reason, samples = available, "Running model retrain");
        let engine = Arc::clone(&self.engine);
        let fit = tokio::task::spawn_blocking(move || engine.fit(&history, now));

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Retrain abandoned on shutdown");
                return RetrainOutcome::Cancelled;
            }
            joined = fit => joined,
        };

        let mut status = self.status.write().await;
        match joined {
            Ok(Ok(outcome)) => {
                let result = self.engine.install(outcome);
                status.last_success = Some(now);
                status.success_count += 1;
                status.last_error = None;
                status.last_result = Some(result.clone());
                info!(accuracy = result.accuracy, samples = result.samples_used, "Retrain completed successfully");
                RetrainOutcome::Trained(result)
            }
            Ok(Err(e)) => {
                let result = TrainingResult::failed(available, &e);
                status.error_count += 1;
                status.last_error = Some(e.to_string());
                status.last_result = Some(result.clone());
                error!(error = %e, "Retrain failed, keeping current model");
                RetrainOutcome::Failed(result)
            }
            Err(e) => {
                let result = TrainingResult::failed(available, &e);
                status.error_count += 1;
                status.last_error = Some(e.to_string());
                status.last_result = Some(result.clone());
                error!(error = %e, "Retrain task panicked, keeping current model");
                RetrainOutcome::Failed(result)
            }
        }
    }

    /// Run until `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.check_interval());
        info!(
            check_interval_secs = self.config.check_interval_seconds,
            daily_hour = self.config.daily_training_hour,
            "Retrain scheduler started"
        );

        loop {
            let reason = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.trigger.notified() => Some(RetrainReason::Requested),
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if self.daily_due(now) {
                        Some(RetrainReason::DailySchedule)
                    } else {
                        self.should_retrain(now)
                    }
                }
            };

            match reason {
                Some(reason) => {
                    if self.run_once(reason, &cancel).await == RetrainOutcome::Cancelled {
                        break;
                    }
                }
                None => debug!("Model is current, no retrain needed"),
            }
        }

        info!("Retrain scheduler stopped");
    }
}
