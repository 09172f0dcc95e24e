//! Machine Learning Module
//!
//! Ridge regression over the engineered feature vector:
//! - Standardization fitted per training run
//! - Normal-equation solver with a hold-out search over λ
//! - Hourly production profile rebuilt alongside every model

pub mod models;
pub mod ridge;
pub mod scaler;
pub mod training;

pub use models::{HourlyProfile, LearnedModel};
pub use ridge::{RidgeFit, RidgeTrainer};
pub use scaler::StandardScaler;
pub use training::{ModelTrainer, TrainingDataset, TrainingOutcome};
