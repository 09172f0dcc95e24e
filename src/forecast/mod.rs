pub mod engine;
pub mod features;
pub mod metrics;
pub mod orchestrator;
pub mod strategy;

pub use engine::*;
pub use features::{Feature, FeatureExtractor, FeatureGroup, FeatureVector, FEATURE_COUNT};
pub use orchestrator::PredictionOrchestrator;
pub use strategy::{HeuristicStrategy, ModelStrategy, PredictionStrategy, ProfileStrategy};
