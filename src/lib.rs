//! Solar production forecasting with a self-training ridge model.
//!
//! The [`forecast::ForecastEngine`] turns weather and sensor snapshots into
//! a production estimate, falling back from the learned model to an hourly
//! profile and finally to a daylight curve. [`controller::RetrainScheduler`]
//! keeps the model fresh in the background.

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod telemetry;

pub use error::{ErrorClass, ForecastError, ForecastResult};
