//! Pipeline configuration
//!
//! Every section defaults to the production constants, so a config file only
//! needs the fields it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ml::ensemble::ModelKind;
use crate::ml::features::FeatureMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub feature_mode: FeatureMode,
    pub plateau: PlateauConfig,
    pub validation: ValidationConfig,
    pub ensemble: EnsembleConfig,
    pub fallback: FallbackConfig,
}

impl PipelineConfig {
    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Plateau detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateauConfig {
    /// Sessions required before an exercise is analyzed
    pub min_sessions: usize,
    /// Weight change (kg) below which a session counts as no progress
    pub progression_tolerance: f64,
    pub confidence_level: f64,
    /// Coefficient of variation of the last weights under which the rank test
    /// fallback reports a plateau
    pub cv_threshold: f64,
    /// Window for the coefficient of variation fallback
    pub cv_window: usize,
    /// Significance level of the volume trend slope
    pub volume_significance: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            min_sessions: 6,
            progression_tolerance: 0.5,
            confidence_level: 0.95,
            cv_threshold: 0.02,
            cv_window: 5,
            volume_significance: 0.05,
        }
    }
}

/// Bounds applied to a raw model prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_increment: f64,
    pub max_increment: f64,
    /// Increment used when the raw one exceeds `max_increment`
    pub realistic_progression: f64,
    /// Allowed increments, in tie-break order
    pub increment_ladder: Vec<f64>,
    /// Floor for a prediction when the user has no current weight
    pub minimum_start_weight: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_increment: 0.5,
            max_increment: 5.0,
            realistic_progression: 2.5,
            increment_ladder: vec![0.5, 1.0, 1.25, 2.5, 5.0],
            minimum_start_weight: 5.0,
        }
    }
}

/// Ensemble members and their hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub models: Vec<ModelKind>,
    pub seed: u64,
    /// Weight given to members with non-positive validation R²
    pub weight_floor: f64,
    pub validation_fraction: f64,
    /// Below this many samples, members are scored in-sample
    pub min_validation_samples: usize,
    pub ridge_alpha: f64,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub boosting_rounds: usize,
    pub boosting_learning_rate: f64,
    pub boosting_max_depth: usize,
    pub mlp_hidden: usize,
    pub mlp_epochs: usize,
    pub mlp_learning_rate: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            models: ModelKind::all().to_vec(),
            seed: 42,
            weight_floor: 0.1,
            validation_fraction: 0.2,
            min_validation_samples: 5,
            ridge_alpha: 1.0,
            forest_trees: 30,
            forest_max_depth: 8,
            boosting_rounds: 50,
            boosting_learning_rate: 0.1,
            boosting_max_depth: 3,
            mlp_hidden: 16,
            mlp_epochs: 300,
            mlp_learning_rate: 0.05,
        }
    }
}

/// Rule-based predictions used when the model path is unavailable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub default_increment: f64,
    /// Prediction for a user with no current weight
    pub starting_weight: f64,
    pub confidence: f64,
    pub emergency_weight: f64,
    pub emergency_confidence: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            default_increment: 2.5,
            starting_weight: 10.0,
            confidence: 0.3,
            emergency_weight: 10.0,
            emergency_confidence: 0.1,
        }
    }
}
