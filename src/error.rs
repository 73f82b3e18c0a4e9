//! Error types shared across the prediction pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while training, running, or persisting the ensemble.
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// predict/feature_importance/save called before any successful training
    #[error("ensemble is not trained; call train() first")]
    NotTrained,

    #[error("insufficient training samples: need at least {required}, got {got}")]
    InsufficientSamples { required: usize, got: usize },

    /// X and y disagree on the number of samples
    #[error("shape mismatch: {samples} feature rows but {targets} targets")]
    ShapeMismatch { samples: usize, targets: usize },

    #[error("feature mismatch: model expects {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    /// Same width, different column order or names
    #[error("feature schema mismatch at column {column}: expected '{expected}', got '{got}'")]
    SchemaMismatch { column: usize, expected: String, got: String },

    #[error("numerical failure in {model}: {reason}")]
    Numerical { model: String, reason: String },

    #[error("model file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EnsembleError {
    pub fn numerical(model: &str, reason: impl Into<String>) -> Self {
        EnsembleError::Numerical {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by plateau analysis.
#[derive(Debug, Error)]
pub enum PlateauError {
    #[error("non-finite {statistic} for exercise '{exercise}'")]
    Numerical { exercise: String, statistic: String },
}

/// Errors raised by a metrics sink. Always logged and ignored by callers.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("tracker database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another writer holds the tracker; the record was dropped
    #[error("tracker busy, record dropped")]
    Busy,

    #[error("tracker serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the training and analytics entry points.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ML service unavailable: ensemble has never been trained")]
    Unavailable,

    #[error("training failed: {0}")]
    Training(#[from] EnsembleError),
}

/// Errors raised while loading a pipeline config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
