use anyhow::{Context, Result};
use solar_forecast_ml::{config, controller, forecast, telemetry};
use config::Config;
use controller::RetrainScheduler;
use forecast::ForecastEngine;
use std::path::Path;
use std::sync::Arc;
use telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    let engine = Arc::new(ForecastEngine::new(cfg.clone()));

    if let Some(path) = &cfg.host.model_path {
        restore(path, "model", |bytes| engine.load_model(bytes)).await;
    }
    if let Some(path) = &cfg.host.profile_path {
        restore(path, "profile", |bytes| engine.load_profile(bytes)).await;
    }

    let scheduler = Arc::new(RetrainScheduler::new(Arc::clone(&engine)));
    let cancel = CancellationToken::new();
    let retrain_task = tokio::spawn(Arc::clone(&scheduler).run(cancel.clone()));

    info!(health = ?engine.health(), "starting solar forecast engine");

    telemetry::shutdown_signal().await;
    cancel.cancel();
    if let Err(e) = retrain_task.await {
        warn!(error = %e, "retrain task ended abnormally");
    }

    if let Some(path) = &cfg.host.model_path {
        if let Some(bytes) = engine.model_bytes()? {
            tokio::fs::write(path, bytes)
                .await
                .with_context(|| format!("writing model to {}", path.display()))?;
        }
    }
    if let Some(path) = &cfg.host.profile_path {
        if let Some(bytes) = engine.profile_bytes()? {
            tokio::fs::write(path, bytes)
                .await
                .with_context(|| format!("writing profile to {}", path.display()))?;
        }
    }

    warn!("shutdown complete");
    Ok(())
}

/// Load a stored artifact; a missing or rejected file is not fatal
async fn restore<F>(path: &Path, what: &str, load: F)
where
    F: FnOnce(&[u8]) -> solar_forecast_ml::ForecastResult<()>,
{
    match tokio::fs::read(path).await {
        Ok(bytes) => match load(&bytes) {
            Ok(()) => info!(path = %path.display(), what, "restored stored artifact"),
            Err(e) => warn!(path = %path.display(), what, error = %e, "stored artifact rejected"),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), what, "no stored artifact, starting fresh")
        }
        Err(e) => warn!(path = %path.display(), what, error = %e, "failed to read stored artifact"),
    }
}
