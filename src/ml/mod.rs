//! ML module - Next-weight prediction and plateau analysis
//!
//! Features:
//! - Feature extraction from workout history (simple and advanced modes)
//! - Weighted ensemble of ridge, random forest, gradient boosting and MLP
//! - Statistical plateau detection
//! - Orchestrated prediction with graceful fallback

pub mod ensemble;
pub mod features;
pub mod orchestrator;
pub mod plateau;
pub mod stats;

pub use ensemble::{EnsembleRegressor, ModelKind, TrainingReport};
pub use features::{FeatureExtractor, FeatureMode};
pub use orchestrator::{PredictionOrchestrator, PredictionRequest, PredictionResult, PredictionTier, TrainingRequest};
pub use plateau::{PlateauAnalyzer, PlateauDetector, PlateauReport};
