//! liftcast - Next-weight prediction for strength training logs
//!
//! Predicts the working weight for an exercise's next session from its
//! history, flags training plateaus and always answers, falling back to
//! a conservative increment when the models cannot.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ml;
pub mod tracking;
pub mod workout;

pub use config::PipelineConfig;
pub use ml::PredictionOrchestrator;
