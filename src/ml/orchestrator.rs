//! Prediction orchestrator
//!
//! Runs extraction, inference, plateau analysis, validation and confidence
//! scoring for one request and always answers:
//! - `Success`: the ensemble produced a prediction
//! - `Fallback`: no history, no features, untrained or failing ensemble;
//!   the user's current weight plus a fixed increment
//! - `EmergencyFallback`: anything unexpected (panic, non-finite output);
//!   a fixed starting weight at minimum confidence
//!
//! Retraining happens on a private copy of the ensemble which is swapped in
//! only after it fully succeeds, so readers see either the old or the new
//! model.

use std::collections::BTreeMap;
use std::iter;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{EnsembleError, ServiceError};
use crate::ml::ensemble::{EnsembleRegressor, TrainingRecord, TrainingReport};
use crate::ml::features::{FeatureExtractor, rows_to_matrix};
use crate::ml::plateau::{PlateauAnalyzer, PlateauDetector, PlateauReport};
use crate::tracking::MetricsSink;
use crate::workout::{UserProfile, WorkoutSession, exercise_names, history_for_exercise};

const SEVERE_PLATEAU: f64 = 0.7;
const MODERATE_PLATEAU: f64 = 0.4;
/// Feature rows at which the data-sufficiency factor saturates
const SUFFICIENT_ROWS: f64 = 10.0;
/// Largest increment (kg) still considered plausible
const PLAUSIBLE_INCREMENT: f64 = 5.0;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionRequest {
    pub exercise_name: String,
    #[serde(alias = "user_data")]
    pub user: UserProfile,
    pub workout_history: Vec<WorkoutSession>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingRequest {
    pub user_id: Option<String>,
    #[serde(alias = "user_data")]
    pub user: UserProfile,
    pub workout_history: Vec<WorkoutSession>,
    pub retrain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResponse {
    pub success: bool,
    pub user_id: Option<String>,
    pub samples_trained: usize,
    pub report: Option<TrainingReport>,
    pub error: Option<String>,
}

impl TrainingResponse {
    fn failed(user_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            user_id,
            samples_trained: 0,
            report: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionTier {
    Success,
    Fallback,
    EmergencyFallback,
}

impl PredictionTier {
    pub fn model_tag(&self) -> &'static str {
        match self {
            PredictionTier::Success => "ensemble",
            PredictionTier::Fallback => "fallback",
            PredictionTier::EmergencyFallback => "emergency_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub exercise_name: String,
    pub predicted_weight: f64,
    pub confidence: f64,
    pub plateau_analysis: PlateauReport,
    pub model_used: String,
    pub recommendations: Vec<String>,
    pub tier: PredictionTier,
    /// Why a fallback tier was used
    pub error: Option<String>,
    pub features_used: usize,
    /// Ensemble output before validation
    pub raw_prediction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub ensemble_r2: Option<f64>,
    pub ensemble_mse: Option<f64>,
    pub feature_importance: Option<BTreeMap<String, f64>>,
    pub model_weights: BTreeMap<String, f64>,
    pub training_history: Vec<TrainingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionAccuracy {
    pub r2_score: f64,
    pub mse_score: f64,
    pub model_count: usize,
    pub trained_samples: usize,
    pub last_trained: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub is_trained: bool,
    pub models: Vec<&'static str>,
    pub extractor: &'static str,
    pub feature_count: usize,
    pub tracking_enabled: bool,
    pub trainings: usize,
}

pub struct PredictionOrchestrator {
    config: PipelineConfig,
    extractor: Box<dyn FeatureExtractor>,
    detector: Box<dyn PlateauAnalyzer>,
    ensemble: RwLock<Arc<EnsembleRegressor>>,
    /// Serializes retraining and model loading
    training: Mutex<()>,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl PredictionOrchestrator {
    /// Build every component from `config`
    pub fn new(config: PipelineConfig) -> Self {
        let extractor = config.feature_mode.extractor();
        let detector = Box::new(PlateauDetector::new(config.plateau.clone()));
        let ensemble = EnsembleRegressor::new(config.ensemble.clone());
        Self::with_components(config, extractor, detector, ensemble)
    }

    pub fn with_components(
        config: PipelineConfig,
        extractor: Box<dyn FeatureExtractor>,
        detector: Box<dyn PlateauAnalyzer>,
        ensemble: EnsembleRegressor,
    ) -> Self {
        Self {
            config,
            extractor,
            detector,
            ensemble: RwLock::new(Arc::new(ensemble)),
            training: Mutex::new(()),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Snapshot of the installed ensemble
    pub fn ensemble(&self) -> Arc<EnsembleRegressor> {
        Arc::clone(&self.ensemble.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn install(&self, ensemble: EnsembleRegressor) {
        *self.ensemble.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(ensemble);
    }

    pub fn is_trained(&self) -> bool {
        self.ensemble().is_trained()
    }

    // ---- prediction ----

    /// Predict the next weight for one exercise. Never fails.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        info!(exercise = %request.exercise_name, sessions = request.workout_history.len(), "prediction requested");

        match catch_unwind(AssertUnwindSafe(|| self.predict_tiered(request))) {
            Ok(result) if result.predicted_weight.is_finite() && result.confidence.is_finite() => result,
            Ok(result) => {
                error!(weight = result.predicted_weight, "non-finite prediction");
                self.emergency_fallback(&request.exercise_name, "non-finite prediction")
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(%reason, "prediction panicked");
                self.emergency_fallback(&request.exercise_name, &reason)
            }
        }
    }

    fn predict_tiered(&self, request: &PredictionRequest) -> PredictionResult {
        let history = &request.workout_history;
        let profile = &request.user;
        let current = profile.current_weight;
        let plateau = self.plateau_report(history);

        if history.is_empty() {
            return self.fallback(request, plateau, "no workout history");
        }

        let exercise_history = if request.exercise_name.trim().is_empty() {
            history.clone()
        } else {
            history_for_exercise(history, &request.exercise_name)
        };
        let frame = self.extractor.extract(&exercise_history, profile);
        let latest = self.extractor.latest(&exercise_history, profile);
        let features = match latest {
            Some(features) if !frame.is_empty() => features,
            _ => return self.fallback(request, plateau, "could not extract features"),
        };

        let ensemble = self.ensemble();
        if !ensemble.is_trained() {
            return self.fallback(request, plateau, "models not trained");
        }

        let x = rows_to_matrix(features.len(), iter::once(&features));
        let raw = match ensemble.predict(&x) {
            Ok(pred) => pred.first().copied().unwrap_or(0.0),
            Err(e) => {
                warn!(error = %e, "ensemble inference failed");
                return self.fallback(request, plateau, &e.to_string());
            }
        };

        let predicted = self.validate_prediction(raw, current);
        let confidence = confidence(frame.n_rows(), predicted, current, ensemble.r2_score());
        let recommendations = recommendations(predicted, current, &plateau);

        self.log_prediction(&request.exercise_name, predicted, confidence, raw);
        info!(raw, predicted, confidence, "prediction ready");

        PredictionResult {
            exercise_name: request.exercise_name.clone(),
            predicted_weight: predicted,
            confidence,
            plateau_analysis: plateau,
            model_used: PredictionTier::Success.model_tag().to_string(),
            recommendations,
            tier: PredictionTier::Success,
            error: None,
            features_used: frame.n_features(),
            raw_prediction: Some(raw),
        }
    }

    fn plateau_report(&self, history: &[WorkoutSession]) -> PlateauReport {
        match catch_unwind(AssertUnwindSafe(|| self.detector.detect(history))) {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(error = %e, "plateau detection failed");
                PlateauReport::degraded(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(%reason, "plateau detection panicked");
                PlateauReport::degraded(reason)
            }
        }
    }

    /// Clamp and quantize a raw prediction to a realistic gym increment.
    ///
    /// Negative increments become the minimum increment, increments above
    /// the maximum become the realistic progression, and the result snaps to
    /// the nearest ladder step (earliest step on ties).
    pub fn validate_prediction(&self, raw: f64, current_weight: f64) -> f64 {
        let rules = &self.config.validation;
        if current_weight <= 0.0 {
            return raw.max(rules.minimum_start_weight);
        }

        let mut increment = raw - current_weight;
        if increment < 0.0 {
            increment = rules.min_increment;
        } else if increment > rules.max_increment {
            increment = rules.realistic_progression;
        }

        current_weight + snap_to_ladder(increment, &rules.increment_ladder)
    }

    fn fallback(&self, request: &PredictionRequest, plateau: PlateauReport, reason: &str) -> PredictionResult {
        warn!(exercise = %request.exercise_name, reason, "using fallback prediction");
        let rules = &self.config.fallback;
        let current = request.user.current_weight;
        let predicted = if current > 0.0 {
            current + rules.default_increment
        } else {
            rules.starting_weight
        };

        PredictionResult {
            exercise_name: request.exercise_name.clone(),
            predicted_weight: predicted,
            confidence: rules.confidence,
            plateau_analysis: plateau,
            model_used: PredictionTier::Fallback.model_tag().to_string(),
            recommendations: vec![
                format!("Recommended weight: {predicted:.1} kg"),
                "Fallback prediction - log more workouts".to_string(),
            ],
            tier: PredictionTier::Fallback,
            error: Some(reason.to_string()),
            features_used: 0,
            raw_prediction: None,
        }
    }

    fn emergency_fallback(&self, exercise_name: &str, reason: &str) -> PredictionResult {
        let rules = &self.config.fallback;
        PredictionResult {
            exercise_name: exercise_name.to_string(),
            predicted_weight: rules.emergency_weight,
            confidence: rules.emergency_confidence,
            plateau_analysis: PlateauReport::degraded(reason),
            model_used: PredictionTier::EmergencyFallback.model_tag().to_string(),
            recommendations: vec!["Prediction error - using the default weight".to_string()],
            tier: PredictionTier::EmergencyFallback,
            error: Some(reason.to_string()),
            features_used: 0,
            raw_prediction: None,
        }
    }

    // ---- training ----

    /// Train a fresh copy of the ensemble and install it on success.
    pub fn train(&self, request: &TrainingRequest) -> TrainingResponse {
        let user_id = request.user_id.clone();
        match catch_unwind(AssertUnwindSafe(|| self.train_serialized(request))) {
            Ok(response) => response,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(%reason, "training panicked");
                TrainingResponse::failed(user_id, reason)
            }
        }
    }

    fn train_serialized(&self, request: &TrainingRequest) -> TrainingResponse {
        let _guard = self.training.lock().unwrap_or_else(PoisonError::into_inner);
        let user_id = request.user_id.clone();
        info!(user = ?user_id, sessions = request.workout_history.len(), retrain = request.retrain, "training requested");

        if request.workout_history.is_empty() {
            return TrainingResponse::failed(user_id, "no workout history provided");
        }

        // Targets never cross exercises; unnamed records (flat rows) form one series
        let mut series = exercise_names(&request.workout_history);
        let has_unnamed = request
            .workout_history
            .iter()
            .flat_map(|s| &s.exercises)
            .any(|e| e.name.trim().is_empty());
        if has_unnamed {
            series.push(String::new());
        }
        let samples: Vec<_> = series
            .iter()
            .flat_map(|name| {
                let history = history_for_exercise(&request.workout_history, name);
                self.extractor.training_samples(&history, &request.user)
            })
            .collect();
        if samples.is_empty() {
            return TrainingResponse::failed(user_id, "could not build training samples");
        }

        let names = self.extractor.feature_names();
        let x = rows_to_matrix(names.len(), samples.iter().map(|s| &s.features));
        let y: Array1<f64> = samples.iter().map(|s| s.target).collect();

        let mut next = self.ensemble().as_ref().clone();
        match next.train(&x, &y, names) {
            Ok(report) => {
                let bytes = next.to_bytes().ok();
                self.install(next);
                self.log_training(&report, request.retrain, bytes.as_deref());
                TrainingResponse {
                    success: true,
                    user_id,
                    samples_trained: samples.len(),
                    report: Some(report),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "training failed");
                TrainingResponse::failed(user_id, e.to_string())
            }
        }
    }

    // ---- analytics ----

    fn trained_ensemble(&self) -> Result<Arc<EnsembleRegressor>, ServiceError> {
        let ensemble = self.ensemble();
        if ensemble.is_trained() { Ok(ensemble) } else { Err(ServiceError::Unavailable) }
    }

    pub fn performance_metrics(&self) -> Result<PerformanceMetrics, ServiceError> {
        let ensemble = self.trained_ensemble()?;
        Ok(PerformanceMetrics {
            ensemble_r2: ensemble.r2_score(),
            ensemble_mse: ensemble.mse_score(),
            feature_importance: ensemble.feature_importance()?,
            model_weights: ensemble.ensemble_weights()?,
            training_history: ensemble.training_history().to_vec(),
        })
    }

    pub fn feature_importance(&self) -> Result<Option<BTreeMap<String, f64>>, ServiceError> {
        Ok(self.trained_ensemble()?.feature_importance()?)
    }

    pub fn training_history(&self) -> Result<Vec<TrainingRecord>, ServiceError> {
        Ok(self.trained_ensemble()?.training_history().to_vec())
    }

    pub fn prediction_accuracy(&self) -> Result<PredictionAccuracy, ServiceError> {
        let ensemble = self.trained_ensemble()?;
        let last = ensemble.training_history().last();
        Ok(PredictionAccuracy {
            r2_score: ensemble.r2_score().unwrap_or(0.0),
            mse_score: ensemble.mse_score().unwrap_or(0.0),
            model_count: ensemble.model_names().len(),
            trained_samples: last.map_or(0, |r| r.samples),
            last_trained: last.map(|r| r.timestamp),
        })
    }

    pub fn status(&self) -> ServiceStatus {
        let ensemble = self.ensemble();
        ServiceStatus {
            is_trained: ensemble.is_trained(),
            models: ensemble.model_names(),
            extractor: self.extractor.name(),
            feature_count: self.extractor.feature_names().len(),
            tracking_enabled: self.sink.is_some(),
            trainings: ensemble.training_history().len(),
        }
    }

    // ---- persistence ----

    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<(), EnsembleError> {
        self.ensemble().save(path)
    }

    /// Replace the installed ensemble with a trained one from disk whose
    /// feature schema matches the extractor. On error the current model stays
    /// in place.
    pub fn load_model(&self, path: impl AsRef<Path>) -> Result<(), EnsembleError> {
        let _guard = self.training.lock().unwrap_or_else(PoisonError::into_inner);
        let loaded = EnsembleRegressor::load(path)?;
        if !loaded.is_trained() {
            return Err(EnsembleError::NotTrained);
        }

        let expected = self.extractor.feature_names();
        let got = loaded.feature_names();
        if got.len() != expected.len() {
            return Err(EnsembleError::FeatureMismatch {
                expected: expected.len(),
                got: got.len(),
            });
        }
        if let Some((column, (want, have))) = expected.iter().zip(got).enumerate().find(|(_, (w, h))| **w != h.as_str()) {
            return Err(EnsembleError::SchemaMismatch {
                column,
                expected: want.to_string(),
                got: have.clone(),
            });
        }
        self.install(loaded);
        Ok(())
    }

    // ---- tracking ----

    fn log_training(&self, report: &TrainingReport, retrain: bool, artifact: Option<&[u8]>) {
        let Some(sink) = &self.sink else { return };

        let params: BTreeMap<String, Value> = BTreeMap::from([
            ("n_samples".to_string(), json!(report.samples)),
            ("n_features".to_string(), json!(report.features)),
            ("retrain".to_string(), json!(retrain)),
            ("extractor".to_string(), json!(self.extractor.name())),
        ]);
        let mut metrics = BTreeMap::new();
        for (name, score) in &report.models {
            metrics.insert(format!("{name}_mse"), score.mse);
            metrics.insert(format!("{name}_r2"), score.r2);
        }
        metrics.insert("ensemble_mse".to_string(), report.ensemble.mse);
        metrics.insert("ensemble_r2".to_string(), report.ensemble.r2);

        let run = "model_training";
        if let Err(e) = sink.log_params(run, &params) {
            warn!(error = %e, "failed to log training params");
        }
        if let Err(e) = sink.log_metrics(run, &metrics) {
            warn!(error = %e, "failed to log training metrics");
        }
        if let Some(bytes) = artifact {
            if let Err(e) = sink.log_artifact(run, "ensemble.json", bytes) {
                warn!(error = %e, "failed to log model artifact");
            }
        }
    }

    fn log_prediction(&self, exercise: &str, prediction: f64, confidence: f64, raw: f64) {
        let Some(sink) = &self.sink else { return };
        let metrics = BTreeMap::from([
            ("prediction".to_string(), prediction),
            ("confidence".to_string(), confidence),
            ("raw_prediction".to_string(), raw),
        ]);
        if let Err(e) = sink.log_metrics(&format!("prediction:{exercise}"), &metrics) {
            warn!(error = %e, "failed to log prediction");
        }
    }
}

/// Nearest ladder step by absolute distance; the earliest step wins ties.
pub fn snap_to_ladder(increment: f64, ladder: &[f64]) -> f64 {
    let mut best: Option<f64> = None;
    for &step in ladder {
        let closer = best.is_none_or(|b| (step - increment).abs() < (b - increment).abs());
        if closer {
            best = Some(step);
        }
    }
    best.unwrap_or(increment)
}

/// Mean of data sufficiency, increment plausibility (only with a current
/// weight) and model quality, clamped to [0.1, 0.95].
fn confidence(feature_rows: usize, predicted: f64, current: f64, r2: Option<f64>) -> f64 {
    let mut factors = vec![(feature_rows as f64 / SUFFICIENT_ROWS).min(1.0)];
    if current > 0.0 {
        let plausible = (predicted - current).abs() <= PLAUSIBLE_INCREMENT;
        factors.push(if plausible { 0.8 } else { 0.4 });
    }
    factors.push(match r2 {
        Some(r2) if r2.is_finite() => r2.clamp(0.3, 0.9),
        _ => 0.3,
    });

    let mean = factors.iter().sum::<f64>() / factors.len() as f64;
    mean.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

fn recommendations(predicted: f64, current: f64, plateau: &PlateauReport) -> Vec<String> {
    let increment = predicted - current;
    let mut out = vec![if increment > 0.0 {
        format!("Recommended weight: {predicted:.1} kg (+{increment:.1} kg)")
    } else {
        format!("Keep the current weight: {current:.1} kg")
    }];

    if plateau.severity_score > SEVERE_PLATEAU {
        out.push("Plateau detected - vary the exercises".to_string());
        out.push("Increase intensity or volume".to_string());
    } else if plateau.severity_score > MODERATE_PLATEAU {
        out.push("Progress is slowing - review the programming".to_string());
    }
    out
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unexpected failure".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnsembleConfig;
    use crate::error::PlateauError;
    use crate::ml::ensemble::ModelKind;
    use crate::ml::features::{FeatureFrame, FeatureMode, FeatureVector, TrainingSample};
    use crate::tracking::SqliteTracker;
    use crate::workout::{ExerciseRecord, SetRecord};
    use chrono::{Duration, NaiveDate};
    use ndarray::Array2;
    use std::time::Instant;

    const SCRIPTED_NAMES: &[&str] = &["x"];

    /// One-column extractor emitting a fixed value, or panicking on extract
    struct ScriptedExtractor {
        value: f64,
        panic_with: Option<&'static str>,
    }

    impl ScriptedExtractor {
        fn row(&self) -> FeatureVector {
            FeatureVector::from_lookup(SCRIPTED_NAMES, |_| Some(self.value))
        }
    }

    impl FeatureExtractor for ScriptedExtractor {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn feature_names(&self) -> &'static [&'static str] {
            SCRIPTED_NAMES
        }

        fn extract(&self, history: &[WorkoutSession], _profile: &UserProfile) -> FeatureFrame {
            if let Some(message) = self.panic_with {
                panic!("{message}");
            }
            FeatureFrame {
                names: SCRIPTED_NAMES,
                rows: history.iter().map(|_| self.row()).collect(),
            }
        }

        fn latest(&self, _history: &[WorkoutSession], _profile: &UserProfile) -> Option<FeatureVector> {
            Some(self.row())
        }

        fn training_samples(&self, _history: &[WorkoutSession], _profile: &UserProfile) -> Vec<TrainingSample> {
            Vec::new()
        }
    }

    struct FailingDetector;

    impl PlateauAnalyzer for FailingDetector {
        fn detect(&self, _history: &[WorkoutSession]) -> Result<PlateauReport, PlateauError> {
            Err(PlateauError::Numerical {
                exercise: "Bench".to_string(),
                statistic: "severity".to_string(),
            })
        }
    }

    struct PanickingDetector;

    impl PlateauAnalyzer for PanickingDetector {
        fn detect(&self, _history: &[WorkoutSession]) -> Result<PlateauReport, PlateauError> {
            panic!("detector exploded")
        }
    }

    /// Ridge on y = 1000x over a single column
    fn create_linear_ensemble() -> EnsembleRegressor {
        let mut ensemble = EnsembleRegressor::new(EnsembleConfig {
            models: vec![ModelKind::Ridge],
            ..EnsembleConfig::default()
        });
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(10, |i| 1000.0 * i as f64);
        ensemble.train(&x, &y, SCRIPTED_NAMES).unwrap();
        ensemble
    }

    fn create_scripted(value: f64, panic_with: Option<&'static str>) -> PredictionOrchestrator {
        PredictionOrchestrator::with_components(
            PipelineConfig::default(),
            Box::new(ScriptedExtractor { value, panic_with }),
            Box::new(PlateauDetector::default()),
            create_linear_ensemble(),
        )
    }

    fn create_session(name: &str, day: i64, weight: f64) -> WorkoutSession {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(18, 0, 0).unwrap();
        let sets = vec![SetRecord::new(weight, 8.0), SetRecord::new(weight, 6.0)];
        WorkoutSession::new(Some(start + Duration::days(day)), vec![ExerciseRecord::new(name, sets)])
    }

    fn create_history(name: &str, sessions: usize) -> Vec<WorkoutSession> {
        (0..sessions)
            .map(|i| create_session(name, 2 * i as i64, 60.0 + 2.5 * (i / 2) as f64))
            .collect()
    }

    fn create_request(name: &str, current: f64, history: Vec<WorkoutSession>) -> PredictionRequest {
        PredictionRequest {
            exercise_name: name.to_string(),
            user: UserProfile::with_current_weight(current),
            workout_history: history,
        }
    }

    fn create_config(mode: FeatureMode) -> PipelineConfig {
        PipelineConfig {
            feature_mode: mode,
            ensemble: EnsembleConfig {
                forest_trees: 8,
                boosting_rounds: 15,
                mlp_epochs: 60,
                ..EnsembleConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn create_trained(mode: FeatureMode) -> PredictionOrchestrator {
        let orchestrator = PredictionOrchestrator::new(create_config(mode));
        let response = orchestrator.train(&TrainingRequest {
            workout_history: create_history("Bench", 12),
            ..TrainingRequest::default()
        });
        assert!(response.success, "training failed: {:?}", response.error);
        orchestrator
    }

    #[test]
    fn test_empty_history_falls_back() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        let result = orchestrator.predict(&create_request("Bench", 80.0, Vec::new()));

        assert_eq!(result.tier, PredictionTier::Fallback);
        assert_eq!(result.model_used, "fallback");
        assert_eq!(result.predicted_weight, 82.5);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.error.as_deref(), Some("no workout history"));
    }

    #[test]
    fn test_fallback_without_current_weight_uses_starting_weight() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        let result = orchestrator.predict(&create_request("Bench", 0.0, Vec::new()));
        assert_eq!(result.predicted_weight, 10.0);
    }

    #[test]
    fn test_untrained_ensemble_falls_back() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        let result = orchestrator.predict(&create_request("Bench", 80.0, create_history("Bench", 8)));

        assert_eq!(result.tier, PredictionTier::Fallback);
        assert_eq!(result.error.as_deref(), Some("models not trained"));
        // plateau analysis still runs
        assert!(result.plateau_analysis.exercise("Bench").is_some());
    }

    #[test]
    fn test_unknown_exercise_falls_back() {
        let orchestrator = create_trained(FeatureMode::Simple);
        let result = orchestrator.predict(&create_request("Deadlift", 100.0, create_history("Bench", 8)));
        assert_eq!(result.tier, PredictionTier::Fallback);
        assert_eq!(result.error.as_deref(), Some("could not extract features"));
    }

    #[test]
    fn test_trained_prediction_is_validated() {
        let orchestrator = create_trained(FeatureMode::Simple);
        let result = orchestrator.predict(&create_request("bench", 72.5, create_history("Bench", 12)));

        assert_eq!(result.tier, PredictionTier::Success);
        assert_eq!(result.model_used, "ensemble");
        assert!(result.raw_prediction.is_some());
        assert_eq!(result.features_used, 10);

        let increment = result.predicted_weight - 72.5;
        assert!(
            [0.5, 1.0, 1.25, 2.5, 5.0].contains(&increment),
            "increment {increment} not on the ladder"
        );
        assert!((0.1..=0.95).contains(&result.confidence));
        assert!(result.recommendations[0].starts_with("Recommended weight"));
    }

    #[test]
    fn test_advanced_mode_end_to_end() {
        let orchestrator = create_trained(FeatureMode::Advanced);
        let result = orchestrator.predict(&create_request("Bench", 72.5, create_history("Bench", 12)));
        assert_eq!(result.tier, PredictionTier::Success);
        assert_eq!(result.features_used, 51);
    }

    #[test]
    fn test_large_increment_clamped_to_realistic_progression() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        assert_eq!(orchestrator.validate_prediction(107.0, 100.0), 102.5);
    }

    #[test]
    fn test_validation_rules() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        // regression becomes the minimum increment
        assert_eq!(orchestrator.validate_prediction(90.0, 100.0), 100.5);
        // nearest ladder step
        assert_eq!(orchestrator.validate_prediction(101.2, 100.0), 101.25);
        assert_eq!(orchestrator.validate_prediction(104.0, 100.0), 105.0);
        // no current weight: at least the minimum start weight
        assert_eq!(orchestrator.validate_prediction(3.0, 0.0), 5.0);
        assert_eq!(orchestrator.validate_prediction(42.0, 0.0), 42.0);
    }

    #[test]
    fn test_snap_ties_go_to_earliest_step() {
        // 0.75 is equidistant from 0.5 and 1.0
        assert_eq!(snap_to_ladder(0.75, &[0.5, 1.0, 1.25, 2.5, 5.0]), 0.5);
        assert_eq!(snap_to_ladder(0.75, &[1.0, 0.5]), 1.0);
        assert_eq!(snap_to_ladder(3.75, &[0.5, 1.0, 1.25, 2.5, 5.0]), 2.5);
        assert_eq!(snap_to_ladder(3.0, &[]), 3.0);
    }

    #[test]
    fn test_confidence_factors() {
        // 10 rows, plausible, r2 0.9 -> (1 + 0.8 + 0.9) / 3
        assert!((confidence(10, 82.5, 80.0, Some(0.95)) - 0.9).abs() < 1e-12);
        // implausible, low r2
        assert!((confidence(5, 90.0, 80.0, Some(-1.0)) - (0.5 + 0.4 + 0.3) / 3.0).abs() < 1e-12);
        // no current weight drops the plausibility factor
        assert!((confidence(1, 20.0, 0.0, None) - 0.2).abs() < 1e-12);
        assert_eq!(confidence(0, 20.0, 0.0, None), 0.15);
    }

    #[test]
    fn test_recommendations_follow_plateau_severity() {
        let mut plateau = PlateauReport::default();
        plateau.severity_score = 0.8;
        let recs = recommendations(102.5, 100.0, &plateau);
        assert_eq!(recs[0], "Recommended weight: 102.5 kg (+2.5 kg)");
        assert_eq!(recs.len(), 3);

        plateau.severity_score = 0.5;
        assert_eq!(recommendations(100.0, 100.0, &plateau).len(), 2);
        assert_eq!(recommendations(100.0, 100.0, &plateau)[0], "Keep the current weight: 100.0 kg");
    }

    #[test]
    fn test_large_history_completes_quickly() {
        let orchestrator = create_trained(FeatureMode::Advanced);
        let history = create_history("Bench", 120);

        let started = Instant::now();
        let result = orchestrator.predict(&create_request("Bench", 150.0, history));
        assert!(started.elapsed().as_secs() < 10);
        assert_eq!(result.tier, PredictionTier::Success);
        assert!(result.predicted_weight.is_finite());
    }

    #[test]
    fn test_analytics_unavailable_before_training() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        assert!(matches!(orchestrator.performance_metrics(), Err(ServiceError::Unavailable)));
        assert!(matches!(orchestrator.feature_importance(), Err(ServiceError::Unavailable)));
        assert!(matches!(orchestrator.training_history(), Err(ServiceError::Unavailable)));
        assert!(matches!(orchestrator.prediction_accuracy(), Err(ServiceError::Unavailable)));

        let status = orchestrator.status();
        assert!(!status.is_trained);
        assert_eq!(status.extractor, "simple");
    }

    #[test]
    fn test_analytics_after_training() {
        let orchestrator = create_trained(FeatureMode::Simple);
        let metrics = orchestrator.performance_metrics().unwrap();
        assert!((metrics.model_weights.values().sum::<f64>() - 1.0).abs() < 1e-6);
        assert_eq!(metrics.training_history.len(), 1);

        let accuracy = orchestrator.prediction_accuracy().unwrap();
        assert_eq!(accuracy.model_count, 4);
        assert!(accuracy.trained_samples > 0);
        assert!(orchestrator.feature_importance().unwrap().is_some());
        assert!(orchestrator.status().is_trained);
    }

    #[test]
    fn test_training_without_history_fails_cleanly() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        let response = orchestrator.train(&TrainingRequest {
            user_id: Some("u1".to_string()),
            ..TrainingRequest::default()
        });
        assert!(!response.success);
        assert_eq!(response.user_id.as_deref(), Some("u1"));
        assert!(response.error.is_some());
        assert!(!orchestrator.is_trained());
    }

    #[test]
    fn test_training_samples_stay_within_exercise() {
        let orchestrator = PredictionOrchestrator::new(create_config(FeatureMode::Simple));
        let mut history = create_history("Bench", 3);
        history.extend(create_history("Squat", 3));
        let response = orchestrator.train(&TrainingRequest {
            workout_history: history,
            ..TrainingRequest::default()
        });
        // 6 sets per exercise -> 5 samples each, none spanning both
        assert_eq!(response.samples_trained, 10);
    }

    #[test]
    fn test_save_and_load_model() {
        let trained = create_trained(FeatureMode::Simple);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        trained.save_model(&path).unwrap();

        let fresh = PredictionOrchestrator::new(create_config(FeatureMode::Simple));
        fresh.load_model(&path).unwrap();
        let request = create_request("Bench", 72.5, create_history("Bench", 12));
        assert_eq!(fresh.predict(&request).predicted_weight, trained.predict(&request).predicted_weight);

        // feature schema must match the extractor
        let advanced = PredictionOrchestrator::new(create_config(FeatureMode::Advanced));
        assert!(matches!(advanced.load_model(&path), Err(EnsembleError::FeatureMismatch { .. })));
        assert!(!advanced.is_trained());
    }

    #[test]
    fn test_concurrent_predictions_during_retrain() {
        let orchestrator = create_trained(FeatureMode::Simple);
        let request = create_request("Bench", 72.5, create_history("Bench", 12));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        let result = orchestrator.predict(&request);
                        assert_eq!(result.tier, PredictionTier::Success);
                    }
                });
            }
            scope.spawn(|| {
                let response = orchestrator.train(&TrainingRequest {
                    workout_history: create_history("Bench", 16),
                    retrain: true,
                    ..TrainingRequest::default()
                });
                assert!(response.success);
            });
        });

        assert_eq!(orchestrator.training_history().unwrap().len(), 2);
    }

    #[test]
    fn test_sink_receives_training_metrics() {
        let tracker = Arc::new(SqliteTracker::open_in_memory("test").unwrap());
        let orchestrator = PredictionOrchestrator::new(PipelineConfig {
            ensemble: EnsembleConfig {
                models: vec![ModelKind::Ridge],
                ..EnsembleConfig::default()
            },
            ..PipelineConfig::default()
        })
        .with_sink(tracker.clone());

        let response = orchestrator.train(&TrainingRequest {
            workout_history: create_history("Bench", 8),
            ..TrainingRequest::default()
        });
        assert!(response.success);

        let metrics = tracker.metrics("model_training").unwrap();
        assert!(metrics.contains_key("ridge_mse"));
        assert!(metrics.contains_key("ridge_r2"));
        assert!(tracker.artifact("model_training", "ensemble.json").unwrap().is_some());

        orchestrator.predict(&create_request("Bench", 72.5, create_history("Bench", 8)));
        assert!(tracker.metrics("prediction:Bench").unwrap().contains_key("confidence"));
    }

    #[test]
    fn test_result_serializes_with_tier() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        let result = orchestrator.predict(&create_request("Bench", 80.0, Vec::new()));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["tier"], "fallback");
        assert_eq!(value["model_used"], "fallback");
    }

    #[test]
    fn test_request_accepts_user_data_alias() {
        let request: PredictionRequest = serde_json::from_value(json!({
            "exercise_name": "Bench",
            "user_data": {"current_weight": 80},
            "workout_history": []
        }))
        .unwrap();
        assert_eq!(request.user.current_weight, 80.0);
    }

    #[test]
    fn test_extractor_panic_becomes_emergency_fallback() {
        let orchestrator = create_scripted(5.0, Some("boom"));
        let result = orchestrator.predict(&create_request("Bench", 80.0, create_history("Bench", 4)));

        assert_eq!(result.tier, PredictionTier::EmergencyFallback);
        assert_eq!(result.model_used, "emergency_fallback");
        assert_eq!(result.predicted_weight, 10.0);
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.plateau_analysis.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_non_finite_result_becomes_emergency_fallback() {
        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        let request = PredictionRequest {
            exercise_name: "Bench".to_string(),
            user: UserProfile {
                current_weight: f64::INFINITY,
                ..UserProfile::default()
            },
            workout_history: Vec::new(),
        };
        let result = orchestrator.predict(&request);

        assert_eq!(result.tier, PredictionTier::EmergencyFallback);
        assert_eq!(result.predicted_weight, 10.0);
        assert_eq!(result.confidence, 0.1);
        assert_eq!(result.error.as_deref(), Some("non-finite prediction"));
    }

    #[test]
    fn test_inference_error_falls_back_with_reason() {
        let history = create_history("Bench", 4);
        let healthy = create_scripted(5.0, None).predict(&create_request("Bench", 80.0, history.clone()));
        assert_eq!(healthy.tier, PredictionTier::Success);

        // the ridge output overflows for this input
        let result = create_scripted(f64::MAX, None).predict(&create_request("Bench", 80.0, history));
        assert_eq!(result.tier, PredictionTier::Fallback);
        assert_eq!(result.predicted_weight, 82.5);
        assert!(result.raw_prediction.is_none());
        let reason = result.error.unwrap();
        assert!(reason.contains("non-finite"), "unexpected reason: {reason}");
    }

    #[test]
    fn test_detector_error_degrades_plateau_report() {
        let orchestrator = PredictionOrchestrator::with_components(
            PipelineConfig::default(),
            FeatureMode::Simple.extractor(),
            Box::new(FailingDetector),
            EnsembleRegressor::default(),
        );
        let result = orchestrator.predict(&create_request("Bench", 80.0, create_history("Bench", 8)));

        assert_eq!(result.tier, PredictionTier::Fallback);
        assert_eq!(result.error.as_deref(), Some("models not trained"));
        let reason = result.plateau_analysis.error.unwrap();
        assert!(reason.contains("severity"), "unexpected reason: {reason}");
        assert!(result.plateau_analysis.exercises.is_empty());
    }

    #[test]
    fn test_detector_panic_degrades_plateau_report() {
        let orchestrator = PredictionOrchestrator::with_components(
            PipelineConfig::default(),
            Box::new(ScriptedExtractor { value: 5.0, panic_with: None }),
            Box::new(PanickingDetector),
            create_linear_ensemble(),
        );
        let result = orchestrator.predict(&create_request("Bench", 80.0, create_history("Bench", 4)));

        // inference is unaffected by the detector
        assert_eq!(result.tier, PredictionTier::Success);
        assert_eq!(result.plateau_analysis.error.as_deref(), Some("detector exploded"));
    }

    #[test]
    fn test_unnamed_flat_rows_are_trainable() {
        let history: Vec<WorkoutSession> = (0..4)
            .map(|i| {
                serde_json::from_value(json!({
                    "date": format!("2024-01-{:02}", 1 + 2 * i),
                    "weight": 60.0 + 2.5 * i as f64,
                    "reps": 8,
                    "sets": 3
                }))
                .unwrap()
            })
            .collect();
        let orchestrator = PredictionOrchestrator::new(create_config(FeatureMode::Simple));

        let response = orchestrator.train(&TrainingRequest {
            workout_history: history.clone(),
            ..TrainingRequest::default()
        });
        assert!(response.success, "training failed: {:?}", response.error);
        // 12 set observations in one series
        assert_eq!(response.samples_trained, 11);

        let result = orchestrator.predict(&create_request("", 67.5, history));
        assert_eq!(result.tier, PredictionTier::Success);
    }

    #[test]
    fn test_load_rejects_untrained_blob() {
        let orchestrator = create_trained(FeatureMode::Simple);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, serde_json::to_vec(&EnsembleRegressor::default()).unwrap()).unwrap();

        assert!(matches!(orchestrator.load_model(&path), Err(EnsembleError::NotTrained)));
        assert!(orchestrator.is_trained());
    }

    #[test]
    fn test_load_rejects_reordered_schema() {
        let simple_names = FeatureMode::Simple.extractor().feature_names();
        let reversed: Vec<&str> = simple_names.iter().rev().copied().collect();
        let x = Array2::from_shape_fn((8, reversed.len()), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(8, |i| 60.0 + i as f64);
        let mut ensemble = EnsembleRegressor::new(EnsembleConfig {
            models: vec![ModelKind::Ridge],
            ..EnsembleConfig::default()
        });
        ensemble.train(&x, &y, &reversed).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reordered.json");
        ensemble.save(&path).unwrap();

        let orchestrator = PredictionOrchestrator::new(PipelineConfig::default());
        assert!(matches!(
            orchestrator.load_model(&path),
            Err(EnsembleError::SchemaMismatch { column: 0, .. })
        ));
        assert!(!orchestrator.is_trained());
    }
}
