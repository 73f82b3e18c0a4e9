//! Weighted ensemble regressor
//!
//! Members are scored on a held-out split, weighted by their validation R²
//! (non-positive R² gets a floor weight), then refit on every sample. The
//! blended prediction is the weight-averaged member prediction.
//!
//! `train` builds the new member set off to the side and only installs it
//! once every member has fit, so a failed retrain leaves the previous state
//! untouched.

pub mod forest;
pub mod linear;
pub mod mlp;
pub mod tree;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EnsembleConfig;
use crate::error::EnsembleError;

pub use forest::{GradientBoostingRegressor, RandomForestRegressor};
pub use linear::RidgeRegressor;
pub use mlp::MlpRegressor;
pub use tree::RegressionTree;

/// Ensemble member types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Ridge,
    RandomForest,
    GradientBoosting,
    Mlp,
}

impl ModelKind {
    pub fn all() -> &'static [ModelKind] {
        &[
            ModelKind::Ridge,
            ModelKind::RandomForest,
            ModelKind::GradientBoosting,
            ModelKind::Mlp,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "ridge",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::Mlp => "mlp",
        }
    }

    /// Whether inputs are standardized before reaching the estimator
    fn scales_inputs(&self) -> bool {
        matches!(self, ModelKind::Ridge | ModelKind::Mlp)
    }
}

/// Inference contract every member implements
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EnsembleError>;

    fn predict(&self, x: &Array2<f64>) -> Array1<f64>;

    /// Impurity-based importances; only tree models have them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    Ridge(RidgeRegressor),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    Mlp(MlpRegressor),
}

impl Estimator {
    pub fn new(kind: ModelKind, config: &EnsembleConfig) -> Self {
        match kind {
            ModelKind::Ridge => Estimator::Ridge(RidgeRegressor::new(config.ridge_alpha)),
            ModelKind::RandomForest => Estimator::RandomForest(RandomForestRegressor::new(
                config.forest_trees,
                config.forest_max_depth,
                config.seed,
            )),
            ModelKind::GradientBoosting => Estimator::GradientBoosting(GradientBoostingRegressor::new(
                config.boosting_rounds,
                config.boosting_learning_rate,
                config.boosting_max_depth,
                config.seed,
            )),
            ModelKind::Mlp => Estimator::Mlp(MlpRegressor::new(
                config.mlp_hidden,
                config.mlp_epochs,
                config.mlp_learning_rate,
                config.seed,
            )),
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EnsembleError> {
        match self {
            Estimator::Ridge(m) => m.fit(x, y),
            Estimator::RandomForest(m) => m.fit(x, y),
            Estimator::GradientBoosting(m) => m.fit(x, y),
            Estimator::Mlp(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        match self {
            Estimator::Ridge(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::GradientBoosting(m) => m.predict(x),
            Estimator::Mlp(m) => m.predict(x),
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Estimator::RandomForest(m) => Some(m.feature_importances()),
            Estimator::GradientBoosting(m) => Some(m.feature_importances()),
            Estimator::Ridge(_) | Estimator::Mlp(_) => None,
        }
    }
}

/// Per-column standardization; constant columns keep scale 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 && s.is_finite() { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

/// Validation scores of one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub mse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub kind: ModelKind,
    estimator: Estimator,
    scaler: Option<StandardScaler>,
    pub score: ModelScore,
    pub weight: f64,
}

impl Member {
    fn fit(kind: ModelKind, config: &EnsembleConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self, EnsembleError> {
        let scaler = kind.scales_inputs().then(|| StandardScaler::fit(x));
        let inputs = match &scaler {
            Some(s) => s.transform(x),
            None => x.clone(),
        };

        let mut estimator = Estimator::new(kind, config);
        estimator.fit(&inputs, y)?;
        Ok(Self {
            kind,
            estimator,
            scaler,
            score: ModelScore { mse: 0.0, r2: 0.0 },
            weight: 0.0,
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        match &self.scaler {
            Some(s) => self.estimator.predict(&s.transform(x)),
            None => self.estimator.predict(x),
        }
    }
}

/// Outcome of one `train` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub models: BTreeMap<String, ModelScore>,
    pub ensemble: ModelScore,
    pub weights: BTreeMap<String, f64>,
    pub samples: usize,
    pub features: usize,
    /// Whether members were scored on a held-out split or in-sample
    pub held_out: bool,
}

/// One successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub timestamp: DateTime<Utc>,
    pub samples: usize,
    pub features: usize,
    pub r2: f64,
    pub mse: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRegressor {
    config: EnsembleConfig,
    feature_names: Vec<String>,
    members: Vec<Member>,
    score: Option<ModelScore>,
    history: Vec<TrainingRecord>,
}

impl EnsembleRegressor {
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn is_trained(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        self.members.iter().map(|m| m.kind.as_str()).collect()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Validation R² of the blended prediction
    pub fn r2_score(&self) -> Option<f64> {
        self.score.map(|s| s.r2)
    }

    pub fn mse_score(&self) -> Option<f64> {
        self.score.map(|s| s.mse)
    }

    pub fn training_history(&self) -> &[TrainingRecord] {
        &self.history
    }

    /// Train every configured member on `x`/`y`.
    ///
    /// With fewer than 2 samples only a ridge baseline is trained. On error the
    /// previously trained state is kept.
    pub fn train(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[&str],
    ) -> Result<TrainingReport, EnsembleError> {
        let (n_samples, n_features) = x.dim();
        if n_samples != y.len() {
            return Err(EnsembleError::ShapeMismatch {
                samples: n_samples,
                targets: y.len(),
            });
        }
        if n_samples == 0 {
            return Err(EnsembleError::InsufficientSamples { required: 1, got: 0 });
        }
        if feature_names.len() != n_features {
            return Err(EnsembleError::FeatureMismatch {
                expected: feature_names.len(),
                got: n_features,
            });
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(EnsembleError::numerical("ensemble", "non-finite training data"));
        }

        // Members are keyed by kind, so each kind trains once
        let mut kinds: Vec<ModelKind> = Vec::with_capacity(self.config.models.len());
        for kind in &self.config.models {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        if n_samples < 2 || kinds.is_empty() {
            kinds = vec![ModelKind::Ridge];
        }

        info!(samples = n_samples, features = n_features, models = kinds.len(), "training ensemble");

        let (train_idx, val_idx) = self.split(n_samples);
        let held_out = train_idx.len() < n_samples;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_val = x.select(Axis(0), &val_idx);
        let y_val = y.select(Axis(0), &val_idx);

        let mut members = Vec::with_capacity(kinds.len());
        let mut val_predictions = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let scored = Member::fit(kind, &self.config, &x_train, &y_train)?;
            let pred = scored.predict(&x_val);
            if pred.iter().any(|v| !v.is_finite()) {
                return Err(EnsembleError::numerical(kind.as_str(), "non-finite validation prediction"));
            }
            let score = ModelScore {
                mse: mse(&pred, &y_val),
                r2: r2(&pred, &y_val),
            };

            let mut member = if held_out {
                Member::fit(kind, &self.config, x, y)?
            } else {
                scored
            };
            member.score = score;
            debug!(model = kind.as_str(), r2 = score.r2, mse = score.mse, "member trained");
            members.push(member);
            val_predictions.push(pred);
        }

        let raw: Vec<f64> = members
            .iter()
            .map(|m| if m.score.r2 > 0.0 { m.score.r2 } else { self.config.weight_floor.max(1e-6) })
            .collect();
        let total: f64 = raw.iter().sum();
        for (member, w) in members.iter_mut().zip(&raw) {
            member.weight = w / total;
        }

        let mut blended = Array1::<f64>::zeros(y_val.len());
        for (member, pred) in members.iter().zip(&val_predictions) {
            blended.scaled_add(member.weight, pred);
        }
        let ensemble = ModelScore {
            mse: mse(&blended, &y_val),
            r2: r2(&blended, &y_val),
        };

        let report = TrainingReport {
            models: members.iter().map(|m| (m.kind.as_str().to_string(), m.score)).collect(),
            ensemble,
            weights: members.iter().map(|m| (m.kind.as_str().to_string(), m.weight)).collect(),
            samples: n_samples,
            features: n_features,
            held_out,
        };

        self.members = members;
        self.feature_names = feature_names.iter().map(|s| s.to_string()).collect();
        self.score = Some(ensemble);
        self.history.push(TrainingRecord {
            timestamp: Utc::now(),
            samples: n_samples,
            features: n_features,
            r2: ensemble.r2,
            mse: ensemble.mse,
        });

        info!(r2 = ensemble.r2, mse = ensemble.mse, "ensemble trained");
        Ok(report)
    }

    /// Seeded shuffle holding out `validation_fraction` (at least one sample)
    /// once there are enough samples; otherwise train and score on everything.
    fn split(&self, n_samples: usize) -> (Vec<usize>, Vec<usize>) {
        let all: Vec<usize> = (0..n_samples).collect();
        if n_samples < self.config.min_validation_samples.max(2) {
            return (all.clone(), all);
        }

        let mut shuffled = all;
        shuffled.shuffle(&mut StdRng::seed_from_u64(self.config.seed));
        let n_val = ((n_samples as f64 * self.config.validation_fraction).round() as usize).clamp(1, n_samples - 1);
        let train = shuffled.split_off(n_val);
        (train, shuffled)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EnsembleError> {
        if !self.is_trained() {
            return Err(EnsembleError::NotTrained);
        }
        if x.ncols() != self.feature_names.len() {
            return Err(EnsembleError::FeatureMismatch {
                expected: self.feature_names.len(),
                got: x.ncols(),
            });
        }

        let mut blended = Array1::<f64>::zeros(x.nrows());
        for member in &self.members {
            blended.scaled_add(member.weight, &member.predict(x));
        }
        if blended.iter().any(|v| !v.is_finite()) {
            return Err(EnsembleError::numerical("ensemble", "non-finite prediction"));
        }
        Ok(blended)
    }

    /// Normalized member weights, summing to 1
    pub fn ensemble_weights(&self) -> Result<BTreeMap<String, f64>, EnsembleError> {
        if !self.is_trained() {
            return Err(EnsembleError::NotTrained);
        }
        Ok(self
            .members
            .iter()
            .map(|m| (m.kind.as_str().to_string(), m.weight))
            .collect())
    }

    /// Weight-averaged importances of the tree members.
    ///
    /// `None` when no trained member exposes importances.
    pub fn feature_importance(&self) -> Result<Option<BTreeMap<String, f64>>, EnsembleError> {
        if !self.is_trained() {
            return Err(EnsembleError::NotTrained);
        }

        let mut total = vec![0.0; self.feature_names.len()];
        let mut contributed = false;
        for member in &self.members {
            if let Some(importances) = member.estimator.feature_importances() {
                contributed = true;
                for (acc, v) in total.iter_mut().zip(importances) {
                    *acc += member.weight * v;
                }
            }
        }
        if !contributed {
            return Ok(None);
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|v| *v /= sum);
        }
        Ok(Some(self.feature_names.iter().cloned().zip(total).collect()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnsembleError> {
        if !self.is_trained() {
            return Err(EnsembleError::NotTrained);
        }
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnsembleError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EnsembleError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        info!(path = %path.as_ref().display(), "ensemble saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnsembleError> {
        let bytes = std::fs::read(path.as_ref())?;
        let ensemble = Self::from_bytes(&bytes)?;
        info!(path = %path.as_ref().display(), models = ensemble.members.len(), "ensemble loaded");
        Ok(ensemble)
    }
}

pub fn mse(pred: &Array1<f64>, truth: &Array1<f64>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    pred.iter().zip(truth).map(|(p, t)| (t - p).powi(2)).sum::<f64>() / truth.len() as f64
}

/// Coefficient of determination; a constant target scores 1 only when it is
/// matched exactly.
pub fn r2(pred: &Array1<f64>, truth: &Array1<f64>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mean = truth.mean().unwrap_or(0.0);
    let ss_res: f64 = pred.iter().zip(truth).map(|(p, t)| (t - p).powi(2)).sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= 1e-12 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const NAMES: &[&str] = &["weight", "reps", "session"];

    fn create_dataset(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => 60.0 + 2.5 * i as f64,
            1 => (5 + i % 4) as f64,
            _ => i as f64,
        });
        let y = x.column(0).mapv(|w| w + 2.5);
        (x, y)
    }

    fn create_fast_config() -> EnsembleConfig {
        EnsembleConfig {
            forest_trees: 10,
            boosting_rounds: 20,
            mlp_epochs: 100,
            ..EnsembleConfig::default()
        }
    }

    #[test]
    fn test_predict_before_train_fails() {
        let ensemble = EnsembleRegressor::new(EnsembleConfig::default());
        let result = ensemble.predict(&array![[1.0, 2.0, 3.0]]);
        assert!(matches!(result, Err(EnsembleError::NotTrained)));
        assert!(ensemble.ensemble_weights().is_err());
        assert!(ensemble.feature_importance().is_err());
        assert!(!ensemble.is_trained());
    }

    #[test]
    fn test_weights_sum_to_one() {
        let (x, y) = create_dataset(30);
        let mut ensemble = EnsembleRegressor::new(create_fast_config());
        let report = ensemble.train(&x, &y, NAMES).unwrap();

        let weights = ensemble.ensemble_weights().unwrap();
        assert_eq!(weights.len(), 4);
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(report.held_out);
        assert_eq!(report.models.len(), 4);
        assert_eq!(ensemble.training_history().len(), 1);
    }

    #[test]
    fn test_predictions_track_target() {
        let (x, y) = create_dataset(30);
        let mut ensemble = EnsembleRegressor::new(create_fast_config());
        ensemble.train(&x, &y, NAMES).unwrap();

        let pred = ensemble.predict(&x).unwrap();
        assert_eq!(pred.len(), 30);
        assert!(r2(&pred, &y) > 0.8);
    }

    #[test]
    fn test_single_sample_trains_ridge_baseline() {
        let x = array![[80.0, 5.0, 1.0]];
        let y = array![82.5];
        let mut ensemble = EnsembleRegressor::new(EnsembleConfig::default());
        let report = ensemble.train(&x, &y, NAMES).unwrap();

        assert_eq!(ensemble.model_names(), vec!["ridge"]);
        assert!(!report.held_out);
        assert_eq!(ensemble.ensemble_weights().unwrap()["ridge"], 1.0);
        assert_eq!(ensemble.predict(&x).unwrap()[0], 82.5);
    }

    #[test]
    fn test_empty_training_set_is_error() {
        let x = Array2::<f64>::zeros((0, 3));
        let y = Array1::<f64>::zeros(0);
        let mut ensemble = EnsembleRegressor::new(EnsembleConfig::default());
        assert!(matches!(
            ensemble.train(&x, &y, NAMES),
            Err(EnsembleError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn test_failed_retrain_keeps_previous_model() {
        let (x, y) = create_dataset(10);
        let mut ensemble = EnsembleRegressor::new(create_fast_config());
        ensemble.train(&x, &y, NAMES).unwrap();
        let before = ensemble.predict(&x).unwrap();

        let mut bad = x.clone();
        bad[[0, 0]] = f64::NAN;
        assert!(ensemble.train(&bad, &y, NAMES).is_err());
        assert!(ensemble.train(&x, &array![1.0, 2.0], NAMES).is_err());

        assert_eq!(ensemble.predict(&x).unwrap(), before);
        assert_eq!(ensemble.training_history().len(), 1);
    }

    #[test]
    fn test_feature_mismatch_on_predict() {
        let (x, y) = create_dataset(10);
        let mut ensemble = EnsembleRegressor::new(create_fast_config());
        ensemble.train(&x, &y, NAMES).unwrap();
        assert!(matches!(
            ensemble.predict(&array![[1.0, 2.0]]),
            Err(EnsembleError::FeatureMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_feature_importance_only_from_trees() {
        let (x, y) = create_dataset(20);

        let mut linear_only = EnsembleRegressor::new(EnsembleConfig {
            models: vec![ModelKind::Ridge, ModelKind::Mlp],
            ..create_fast_config()
        });
        linear_only.train(&x, &y, NAMES).unwrap();
        assert_eq!(linear_only.feature_importance().unwrap(), None);

        let mut with_trees = EnsembleRegressor::new(create_fast_config());
        with_trees.train(&x, &y, NAMES).unwrap();
        let importance = with_trees.feature_importance().unwrap().unwrap();
        assert_eq!(importance.len(), 3);
        assert!((importance.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_load_round_trip() {
        let (x, y) = create_dataset(15);
        let mut ensemble = EnsembleRegressor::new(create_fast_config());
        ensemble.train(&x, &y, NAMES).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ensemble.json");
        ensemble.save(&path).unwrap();
        let restored = EnsembleRegressor::load(&path).unwrap();

        assert_eq!(restored.predict(&x).unwrap(), ensemble.predict(&x).unwrap());
        assert_eq!(restored.model_names(), ensemble.model_names());
        assert_eq!(restored.r2_score(), ensemble.r2_score());
    }

    #[test]
    fn test_save_untrained_fails() {
        let ensemble = EnsembleRegressor::new(EnsembleConfig::default());
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ensemble.save(dir.path().join("x.json")),
            Err(EnsembleError::NotTrained)
        ));
    }

    #[test]
    fn test_load_garbage_fails() {
        assert!(EnsembleRegressor::from_bytes(b"not json").is_err());
    }

    #[test]
    fn test_floor_weight_for_poor_models() {
        // targets unrelated to features: every member scores badly
        let x = Array2::from_shape_fn((12, 3), |(i, j)| ((i * (j + 3)) % 7) as f64);
        let y = Array1::from_shape_fn(12, |i| if i % 2 == 0 { 50.0 } else { 70.0 });
        let mut ensemble = EnsembleRegressor::new(create_fast_config());
        ensemble.train(&x, &y, NAMES).unwrap();

        let weights = ensemble.ensemble_weights().unwrap();
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(weights.values().all(|w| *w > 0.0));
    }

    #[test]
    fn test_duplicate_model_kinds_train_once() {
        let (x, y) = create_dataset(10);
        let mut ensemble = EnsembleRegressor::new(EnsembleConfig {
            models: vec![ModelKind::Ridge, ModelKind::Ridge, ModelKind::RandomForest, ModelKind::Ridge],
            ..create_fast_config()
        });
        let report = ensemble.train(&x, &y, NAMES).unwrap();

        assert_eq!(ensemble.model_names(), vec!["ridge", "random_forest"]);
        let weights = ensemble.ensemble_weights().unwrap();
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!((report.weights.values().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_r2_constant_target() {
        let truth = array![5.0, 5.0];
        assert_eq!(r2(&array![5.0, 5.0], &truth), 1.0);
        assert_eq!(r2(&array![5.0, 6.0], &truth), 0.0);
    }

    #[test]
    fn test_scaler_handles_constant_column() {
        let x = array![[1.0, 7.0], [3.0, 7.0]];
        let scaled = StandardScaler::fit(&x).transform(&x);
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
    }
}
