//! Plateau detection
//!
//! Analyzes each exercise's per-session (max weight, volume) series for
//! stalled progression. Four signals feed the severity score:
//! 1. Trailing run of sessions whose weight moved less than the tolerance
//! 2. Whether the last significant weight change is itself tiny
//! 3. Volume trend (significance of a linear fit against session index)
//! 4. Kendall rank correlation between session index and weight, or a
//!    coefficient-of-variation check when the rank test is unavailable
//!
//! Only the signals that fire are averaged, so a missing factor lowers
//! nothing.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlateauConfig;
use crate::error::PlateauError;
use crate::ml::stats;
use crate::workout::{WorkoutSession, exercise_names, history_for_exercise};

/// Last significant weight change under this (kg) counts as stalled
const STALLED_PROGRESSION: f64 = 0.5;
/// Sessions at which the duration factor saturates
const DURATION_SATURATION: f64 = 10.0;
const SEVERE: f64 = 0.7;
const MODERATE: f64 = 0.4;
const FOCUS_SEVERITY: f64 = 0.6;
const MAX_FOCUS_EXERCISES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAnalysis {
    pub plateau_detected: bool,
    /// Consecutive trailing sessions without progression
    pub plateau_duration: usize,
    /// Most recent weight change at or above the tolerance, 0 if none
    pub last_progression: f64,
    pub total_progression: f64,
    pub avg_progression: f64,
    pub progression_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAnalysis {
    pub trend: VolumeTrend,
    pub slope: f64,
    pub r_squared: f64,
    pub progression: f64,
    /// Percent change from the first session, relative to max(1, first volume)
    pub relative_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalPatterns {
    pub sessions_per_week: f64,
    pub consistency: f64,
    pub avg_interval_days: f64,
    pub total_period_days: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum StatisticalTest {
    KendallTau { tau: f64, p_value: f64 },
    CoefficientOfVariation { cv: f64 },
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalAnalysis {
    pub plateau_detected: bool,
    pub confidence: f64,
    pub test: StatisticalTest,
}

/// Plateau analysis for one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauAnalysis {
    pub exercise_name: String,
    pub detected: bool,
    pub severity: f64,
    pub duration: usize,
    pub statistical_confidence: f64,
    pub weight: WeightAnalysis,
    pub volume: VolumeAnalysis,
    /// Present when every session is dated
    pub temporal: Option<TemporalPatterns>,
    pub statistical: StatisticalAnalysis,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExerciseAssessment {
    Analyzed(PlateauAnalysis),
    InsufficientData { sessions: usize, required: usize },
}

impl ExerciseAssessment {
    pub fn analysis(&self) -> Option<&PlateauAnalysis> {
        match self {
            ExerciseAssessment::Analyzed(a) => Some(a),
            ExerciseAssessment::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalAnalysis {
    pub global_plateau: bool,
    pub affected_exercises: usize,
    pub analyzed_exercises: usize,
    pub total_exercises: usize,
    pub plateau_percentage: f64,
}

/// Plateau findings across a whole history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlateauReport {
    pub exercises: BTreeMap<String, ExerciseAssessment>,
    pub global: GlobalAnalysis,
    /// Mean severity over analyzed exercises
    pub severity_score: f64,
    pub recommendations: Vec<String>,
    /// Set when detection failed and this report is a placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlateauReport {
    /// Neutral report standing in for a failed detection
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn exercise(&self, name: &str) -> Option<&ExerciseAssessment> {
        let wanted = crate::workout::normalize_name(name);
        self.exercises
            .iter()
            .find(|(k, _)| crate::workout::normalize_name(k) == wanted)
            .map(|(_, v)| v)
    }
}

/// One session of one exercise
#[derive(Debug, Clone, Copy)]
struct SessionPoint {
    date: Option<NaiveDateTime>,
    weight: f64,
    volume: f64,
}

/// Plateau analysis as seen by the orchestrator
pub trait PlateauAnalyzer: Send + Sync {
    fn detect(&self, history: &[WorkoutSession]) -> Result<PlateauReport, PlateauError>;
}

#[derive(Debug, Clone, Default)]
pub struct PlateauDetector {
    config: PlateauConfig,
}

impl PlateauDetector {
    pub fn new(config: PlateauConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlateauConfig {
        &self.config
    }

    /// Analyze every exercise in `history` and roll the results up.
    pub fn detect(&self, history: &[WorkoutSession]) -> Result<PlateauReport, PlateauError> {
        let names = exercise_names(history);
        let mut exercises = BTreeMap::new();
        for name in &names {
            let assessment = self.assess_exercise(name, history)?;
            exercises.insert(name.clone(), assessment);
        }

        let analyzed: Vec<&PlateauAnalysis> = exercises.values().filter_map(ExerciseAssessment::analysis).collect();
        let affected = analyzed.iter().filter(|a| a.detected).count();
        let plateau_share = affected as f64 / analyzed.len().max(1) as f64;
        let global = GlobalAnalysis {
            global_plateau: !analyzed.is_empty() && plateau_share > 0.5,
            affected_exercises: affected,
            analyzed_exercises: analyzed.len(),
            total_exercises: names.len(),
            plateau_percentage: plateau_share * 100.0,
        };

        let severity_score = if analyzed.is_empty() {
            0.0
        } else {
            analyzed.iter().map(|a| a.severity).sum::<f64>() / analyzed.len() as f64
        };
        let recommendations = global_recommendations(&analyzed, &global);

        info!(
            exercises = names.len(),
            analyzed = analyzed.len(),
            affected,
            severity = severity_score,
            "plateau detection finished"
        );

        Ok(PlateauReport {
            exercises,
            global,
            severity_score,
            recommendations,
            error: None,
        })
    }

    /// Analyze one exercise, or report how far it is from enough data.
    pub fn assess_exercise(&self, name: &str, history: &[WorkoutSession]) -> Result<ExerciseAssessment, PlateauError> {
        let points = session_points(&history_for_exercise(history, name));
        let required = self.config.min_sessions.max(2);
        if points.len() < required {
            debug!(exercise = name, sessions = points.len(), required, "not enough sessions for plateau analysis");
            return Ok(ExerciseAssessment::InsufficientData {
                sessions: points.len(),
                required,
            });
        }
        self.analyze(name, &points).map(ExerciseAssessment::Analyzed)
    }

    fn analyze(&self, name: &str, points: &[SessionPoint]) -> Result<PlateauAnalysis, PlateauError> {
        let weights: Vec<f64> = points.iter().map(|p| p.weight).collect();
        let volumes: Vec<f64> = points.iter().map(|p| p.volume).collect();
        let dates: Option<Vec<NaiveDateTime>> = points.iter().map(|p| p.date).collect();

        let weight = self.weight_analysis(&weights);
        let volume = self.volume_analysis(&volumes);
        let temporal = dates.as_deref().and_then(temporal_patterns);
        let statistical = self.statistical_analysis(&weights);
        let severity = severity(&weight, &volume, &statistical);

        if !severity.is_finite() {
            return Err(PlateauError::Numerical {
                exercise: name.to_string(),
                statistic: "severity".to_string(),
            });
        }

        debug!(exercise = name, detected = weight.plateau_detected, severity, "exercise analyzed");
        Ok(PlateauAnalysis {
            exercise_name: name.to_string(),
            detected: weight.plateau_detected,
            severity,
            duration: weight.plateau_duration,
            statistical_confidence: statistical.confidence,
            recommendations: exercise_recommendations(name, &volume, severity),
            weight,
            volume,
            temporal,
            statistical,
        })
    }

    fn weight_analysis(&self, weights: &[f64]) -> WeightAnalysis {
        if weights.len() < 3 {
            return WeightAnalysis::default();
        }

        let tolerance = self.config.progression_tolerance;
        let progressions = stats::diff(weights);

        let plateau_duration = progressions.iter().rev().take_while(|d| d.abs() < tolerance).count();
        let last_progression = progressions
            .iter()
            .rev()
            .find(|d| d.abs() >= tolerance)
            .copied()
            .unwrap_or(0.0);

        WeightAnalysis {
            plateau_detected: plateau_duration >= self.config.min_sessions.saturating_sub(1).max(1),
            plateau_duration,
            last_progression,
            total_progression: weights[weights.len() - 1] - weights[0],
            avg_progression: stats::mean(&progressions),
            progression_std: stats::std_dev(&progressions),
        }
    }

    fn volume_analysis(&self, volumes: &[f64]) -> VolumeAnalysis {
        let (first, last) = match (volumes.first(), volumes.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => (0.0, 0.0),
        };
        let mut analysis = VolumeAnalysis {
            trend: VolumeTrend::InsufficientData,
            slope: 0.0,
            r_squared: 0.0,
            progression: last - first,
            relative_change: (last - first) / first.max(1.0) * 100.0,
        };
        if volumes.len() < 3 {
            return analysis;
        }

        if let Some(trend) = stats::linear_trend(volumes) {
            analysis.slope = trend.slope;
            analysis.r_squared = trend.r_squared;
            analysis.trend = match trend.p_value < self.config.volume_significance {
                true if trend.slope > 0.0 => VolumeTrend::Increasing,
                true if trend.slope < 0.0 => VolumeTrend::Decreasing,
                _ => VolumeTrend::Stable,
            };
        } else {
            analysis.trend = VolumeTrend::Stable;
        }
        analysis
    }

    fn statistical_analysis(&self, weights: &[f64]) -> StatisticalAnalysis {
        let unavailable = StatisticalAnalysis {
            plateau_detected: false,
            confidence: 0.0,
            test: StatisticalTest::Unavailable,
        };
        if weights.len() < self.config.min_sessions {
            return unavailable;
        }

        let index: Vec<f64> = (0..weights.len()).map(|i| i as f64).collect();
        if let Some(kendall) = stats::kendall_tau(&index, weights) {
            return StatisticalAnalysis {
                plateau_detected: kendall.p_value > 1.0 - self.config.confidence_level,
                confidence: 1.0 - kendall.p_value,
                test: StatisticalTest::KendallTau {
                    tau: kendall.tau,
                    p_value: kendall.p_value,
                },
            };
        }

        let recent = &weights[weights.len().saturating_sub(self.config.cv_window)..];
        if recent.len() < 3 {
            return unavailable;
        }
        let mean = stats::mean(recent);
        let cv = if mean > 0.0 { stats::std_dev(recent) / mean } else { 0.0 };
        StatisticalAnalysis {
            plateau_detected: cv < self.config.cv_threshold,
            confidence: (1.0 - cv).clamp(0.0, 1.0),
            test: StatisticalTest::CoefficientOfVariation { cv },
        }
    }
}

impl PlateauAnalyzer for PlateauDetector {
    fn detect(&self, history: &[WorkoutSession]) -> Result<PlateauReport, PlateauError> {
        PlateauDetector::detect(self, history)
    }
}

/// Per-session max weight and volume; sessions without weight are skipped.
fn session_points(history: &[WorkoutSession]) -> Vec<SessionPoint> {
    let mut points: Vec<SessionPoint> = history
        .iter()
        .filter_map(|session| {
            let sets = session.exercises.iter().flat_map(|e| &e.sets);
            let weight = sets.clone().map(|s| s.weight).fold(0.0, f64::max);
            let volume = sets.map(|s| s.volume()).sum();
            (weight > 0.0).then_some(SessionPoint {
                date: session.date,
                weight,
                volume,
            })
        })
        .collect();

    if points.iter().all(|p| p.date.is_some()) {
        points.sort_by_key(|p| p.date);
    }
    points
}

fn temporal_patterns(dates: &[NaiveDateTime]) -> Option<TemporalPatterns> {
    if dates.len() < 3 {
        return None;
    }
    let gaps: Vec<f64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days() as f64).collect();
    let avg_interval = stats::mean(&gaps);
    Some(TemporalPatterns {
        sessions_per_week: if avg_interval > 0.0 { 7.0 / avg_interval } else { 0.0 },
        consistency: 1.0 / (1.0 + stats::std_dev(&gaps)),
        avg_interval_days: avg_interval,
        total_period_days: (dates[dates.len() - 1] - dates[0]).num_days() as f64,
    })
}

/// Mean of the factors that apply, clamped to [0, 1]
fn severity(weight: &WeightAnalysis, volume: &VolumeAnalysis, statistical: &StatisticalAnalysis) -> f64 {
    let mut factors = Vec::with_capacity(4);
    if weight.plateau_detected {
        factors.push((weight.plateau_duration as f64 / DURATION_SATURATION).min(1.0));
    }
    if weight.last_progression.abs() < STALLED_PROGRESSION {
        factors.push(0.8);
    }
    match volume.trend {
        VolumeTrend::Decreasing => factors.push(0.7),
        VolumeTrend::Stable => factors.push(0.5),
        VolumeTrend::Increasing | VolumeTrend::InsufficientData => {}
    }
    if statistical.plateau_detected {
        factors.push(statistical.confidence);
    }

    if factors.is_empty() {
        return 0.0;
    }
    (factors.iter().sum::<f64>() / factors.len() as f64).clamp(0.0, 1.0)
}

fn exercise_recommendations(name: &str, volume: &VolumeAnalysis, severity: f64) -> Vec<String> {
    let mut out = Vec::new();
    if severity > SEVERE {
        out.push(format!("Severe plateau detected on {name}"));
        out.push("Change the training program".to_string());
        out.push("Increase volume or frequency".to_string());
        out.push("Consider a deload period".to_string());
    } else if severity > MODERATE {
        out.push(format!("Moderate plateau on {name}"));
        out.push("Vary intensity techniques".to_string());
        out.push("Adjust the rep ranges".to_string());
    } else {
        out.push(format!("Normal progression on {name}"));
    }

    match volume.trend {
        VolumeTrend::Decreasing => out.push("Volume is dropping - raise it gradually".to_string()),
        VolumeTrend::Stable if severity > 0.5 => out.push("Volume is flat - consider adding sets".to_string()),
        _ => {}
    }
    out
}

fn global_recommendations(analyzed: &[&PlateauAnalysis], global: &GlobalAnalysis) -> Vec<String> {
    if analyzed.is_empty() {
        return vec!["Keep training to collect more data".to_string()];
    }

    let mut out = Vec::new();
    if global.global_plateau {
        out.push("Global plateau detected - rethink the whole program".to_string());
        out.push("Plan a deload week".to_string());
        out.push("Review goals and periodization".to_string());
    }

    let focus: Vec<&str> = analyzed
        .iter()
        .filter(|a| a.severity > FOCUS_SEVERITY)
        .take(MAX_FOCUS_EXERCISES)
        .map(|a| a.exercise_name.as_str())
        .collect();
    if !focus.is_empty() {
        out.push(format!("Focus on: {}", focus.join(", ")));
    }

    out.push("Track progression closely".to_string());
    out.push("Keep training consistently".to_string());
    out
}
