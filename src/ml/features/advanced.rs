//! Aggregate feature row over a whole exercise history
//!
//! Each session contributes one observation (heaviest set, mean reps, set
//! count, volume, tags, date). The row combines basic, temporal, statistical,
//! trend, behavioral, contextual and interaction blocks. Blocks that lack data
//! keep their columns at the block default, so the schema never changes.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDateTime, Timelike};
use tracing::debug;

use super::{FeatureExtractor, FeatureFrame, FeatureVector, TrainingSample};
use crate::catalog::{tag_mentions, Equipment, ExerciseType, MuscleGroup};
use crate::ml::stats;
use crate::workout::{Goal, UserProfile, WorkoutSession};

pub const FEATURE_NAMES: &[&str] = &[
    // basic
    "current_weight",
    "total_volume",
    "avg_intensity",
    "total_sessions",
    "training_frequency",
    // temporal
    "progression_7d",
    "progression_14d",
    "progression_30d",
    "progression_90d",
    "momentum_score",
    "consistency_score",
    // statistical
    "weight_mean",
    "weight_std",
    "weight_skew",
    "weight_kurtosis",
    "weight_p25",
    "weight_p75",
    "weight_iqr",
    "weight_cv",
    "smoothing_residual",
    // trend
    "trend_slope",
    "trend_r_squared",
    "trend_p_value",
    "trend_changes",
    "trend_stability",
    // behavioral
    "preferred_hour",
    "day_regularity",
    "avg_session_duration",
    "experience_level",
    "goal_strength",
    "goal_hypertrophy",
    "goal_endurance",
    // contextual
    "exercise_compound",
    "exercise_isolation",
    "exercise_cardio",
    "exercise_strength",
    "muscle_chest",
    "muscle_back",
    "muscle_legs",
    "muscle_shoulders",
    "muscle_arms",
    "muscle_core",
    "equipment_barbell",
    "equipment_dumbbell",
    "equipment_machine",
    "equipment_bodyweight",
    "equipment_cable",
    "seasonal_factor",
    // interaction
    "weight_frequency_interaction",
    "momentum_consistency_interaction",
    "trend_experience_interaction",
];

const PROGRESSION_WINDOWS: [usize; 4] = [7, 14, 30, 90];
const MOMENTUM_WINDOW: usize = 5;
const SMOOTHING_WINDOW: usize = 5;
const DEFAULT_HOUR: f64 = 12.0;
const DEFAULT_SESSION_MINUTES: f64 = 60.0;

/// One session's worth of a single exercise history
#[derive(Debug, Clone)]
struct Observation {
    date: Option<NaiveDateTime>,
    weight: f64,
    volume: f64,
    duration: Option<f64>,
    exercise_type: Option<String>,
    muscle_group: Option<String>,
    equipment: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdvancedFeatureExtractor;

impl AdvancedFeatureExtractor {
    fn observations(history: &[WorkoutSession]) -> Vec<Observation> {
        let mut observations: Vec<Observation> = history
            .iter()
            .filter_map(|session| {
                let sets: Vec<_> = session.exercises.iter().flat_map(|e| &e.sets).collect();
                if sets.is_empty() {
                    return None;
                }
                let exercises = &session.exercises;
                Some(Observation {
                    date: session.date,
                    weight: sets.iter().map(|s| s.weight).fold(0.0, f64::max),
                    volume: sets.iter().map(|s| s.volume()).sum(),
                    duration: session.duration,
                    exercise_type: exercises.iter().find_map(|e| e.exercise_type.clone()),
                    muscle_group: exercises.iter().find_map(|e| e.muscle_group.clone()),
                    equipment: exercises.iter().find_map(|e| e.equipment.clone()),
                })
            })
            .collect();

        if observations.iter().all(|o| o.date.is_some()) {
            observations.sort_by_key(|o| o.date);
        }
        observations
    }

    fn row(observations: &[Observation], profile: &UserProfile) -> FeatureVector {
        let mut features: BTreeMap<&str, f64> = BTreeMap::new();
        let weights: Vec<f64> = observations.iter().map(|o| o.weight).collect();
        let dates: Option<Vec<NaiveDateTime>> = observations.iter().map(|o| o.date).collect();

        basic_features(&mut features, observations, &weights, dates.as_deref());
        temporal_features(&mut features, &weights, dates.as_deref());
        statistical_features(&mut features, &weights);
        trend_features(&mut features, &weights);
        behavioral_features(&mut features, observations, dates.as_deref(), profile);
        contextual_features(&mut features, observations, dates.as_deref());
        interaction_features(&mut features);

        FeatureVector::from_map(FEATURE_NAMES, &features)
    }
}

fn basic_features(
    features: &mut BTreeMap<&str, f64>,
    observations: &[Observation],
    weights: &[f64],
    dates: Option<&[NaiveDateTime]>,
) {
    let n = weights.len();
    features.insert("current_weight", weights.last().copied().unwrap_or(0.0));
    features.insert("total_volume", observations.iter().map(|o| o.volume).sum());
    features.insert("avg_intensity", stats::mean(weights));
    features.insert("total_sessions", n as f64);

    let frequency = match dates {
        Some(dates) if n > 1 => {
            let span_days = (dates[n - 1] - dates[0]).num_days() as f64;
            n as f64 / (span_days / 7.0).max(1.0)
        }
        _ => 0.0,
    };
    features.insert("training_frequency", frequency);
}

fn temporal_features(features: &mut BTreeMap<&str, f64>, weights: &[f64], dates: Option<&[NaiveDateTime]>) {
    let n = weights.len();

    for (window, name) in PROGRESSION_WINDOWS
        .iter()
        .zip(["progression_7d", "progression_14d", "progression_30d", "progression_90d"])
    {
        let recent = &weights[n.saturating_sub(*window)..];
        let progression = if recent.len() >= 2 {
            (recent[recent.len() - 1] - recent[0]) / recent.len() as f64
        } else {
            0.0
        };
        features.insert(name, progression);
    }

    if n >= 3 {
        let derivative = stats::gradient(weights);
        let tail = &derivative[derivative.len().saturating_sub(MOMENTUM_WINDOW)..];
        features.insert("momentum_score", stats::mean(tail));
    }

    if let Some(dates) = dates.filter(|d| d.len() >= 3) {
        let gaps: Vec<f64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days() as f64).collect();
        features.insert("consistency_score", 1.0 / (1.0 + stats::sample_std_dev(&gaps)));
    }
}

fn statistical_features(features: &mut BTreeMap<&str, f64>, weights: &[f64]) {
    if weights.len() < 3 {
        return;
    }

    let mean = stats::mean(weights);
    let std = stats::std_dev(weights);
    let p25 = stats::percentile(weights, 25.0);
    let p75 = stats::percentile(weights, 75.0);

    features.insert("weight_mean", mean);
    features.insert("weight_std", std);
    features.insert("weight_skew", stats::skewness(weights));
    features.insert("weight_kurtosis", stats::excess_kurtosis(weights));
    features.insert("weight_p25", p25);
    features.insert("weight_p75", p75);
    features.insert("weight_iqr", p75 - p25);
    features.insert("weight_cv", std / mean.max(1.0));
    features.insert("smoothing_residual", stats::smoothing_residual(weights, SMOOTHING_WINDOW));
}

fn trend_features(features: &mut BTreeMap<&str, f64>, weights: &[f64]) {
    if weights.len() < 3 {
        return;
    }

    match stats::linear_trend(weights) {
        Some(trend) => {
            features.insert("trend_slope", trend.slope);
            features.insert("trend_r_squared", trend.r_squared);
            features.insert("trend_p_value", trend.p_value);
        }
        // a failed fit means no evidence of a trend
        None => {
            features.insert("trend_p_value", 1.0);
        }
    }

    if weights.len() >= 5 {
        features.insert("trend_changes", stats::sign_changes(weights) as f64);
        features.insert("trend_stability", 1.0 / (1.0 + stats::std_dev(&stats::diff(weights))));
    }
}

fn behavioral_features(
    features: &mut BTreeMap<&str, f64>,
    observations: &[Observation],
    dates: Option<&[NaiveDateTime]>,
    profile: &UserProfile,
) {
    let mut preferred_hour = DEFAULT_HOUR;
    let mut day_regularity = 0.0;
    let mut avg_duration = DEFAULT_SESSION_MINUTES;

    if let Some(dates) = dates.filter(|d| d.len() >= 3) {
        let mut hours: BTreeMap<u32, usize> = BTreeMap::new();
        let mut weekdays: HashMap<u32, usize> = HashMap::new();
        for date in dates {
            *hours.entry(date.hour()).or_default() += 1;
            *weekdays.entry(date.weekday().num_days_from_monday()).or_default() += 1;
        }

        // Mode, earliest hour on ties
        let top = hours.values().copied().max().unwrap_or(0);
        if let Some((hour, _)) = hours.iter().find(|(_, count)| **count == top) {
            preferred_hour = *hour as f64;
        }
        let busiest_day = weekdays.values().copied().max().unwrap_or(0);
        day_regularity = busiest_day as f64 / dates.len().max(1) as f64;

        let durations: Vec<f64> = observations.iter().filter_map(|o| o.duration).collect();
        if !durations.is_empty() {
            avg_duration = stats::mean(&durations);
        }
    }

    features.insert("preferred_hour", preferred_hour);
    features.insert("day_regularity", day_regularity);
    features.insert("avg_session_duration", avg_duration);
    features.insert("experience_level", profile.level.numeric());

    features.insert("goal_strength", flag(profile.goals.contains(&Goal::Strength)));
    features.insert("goal_hypertrophy", flag(profile.goals.contains(&Goal::Hypertrophy)));
    features.insert("goal_endurance", flag(profile.goals.contains(&Goal::Endurance)));
}

fn contextual_features(
    features: &mut BTreeMap<&str, f64>,
    observations: &[Observation],
    dates: Option<&[NaiveDateTime]>,
) {
    for kind in ExerciseType::all() {
        let present = observations.iter().any(|o| tag_mentions(o.exercise_type.as_deref(), kind.as_str()));
        features.insert(column_name("exercise", kind.as_str()), flag(present));
    }
    for muscle in MuscleGroup::all() {
        let present = observations.iter().any(|o| tag_mentions(o.muscle_group.as_deref(), muscle.as_str()));
        features.insert(column_name("muscle", muscle.as_str()), flag(present));
    }
    for equipment in Equipment::all() {
        let present = observations.iter().any(|o| tag_mentions(o.equipment.as_deref(), equipment.as_str()));
        features.insert(column_name("equipment", equipment.as_str()), flag(present));
    }

    // Last dated observation; undated histories stay neutral
    let last_date = dates
        .and_then(|d| d.last().copied())
        .or_else(|| observations.iter().rev().find_map(|o| o.date));
    if let Some(date) = last_date {
        let seasonal = (2.0 * std::f64::consts::PI * date.month() as f64 / 12.0).sin();
        features.insert("seasonal_factor", seasonal);
    }
}

fn interaction_features(features: &mut BTreeMap<&str, f64>) {
    let get = |features: &BTreeMap<&str, f64>, name: &str| features.get(name).copied().unwrap_or(0.0);

    let weight_frequency = get(features, "current_weight") * get(features, "training_frequency");
    let momentum_consistency = get(features, "momentum_score") * get(features, "consistency_score");
    let trend_experience = get(features, "trend_slope") * get(features, "experience_level");

    features.insert("weight_frequency_interaction", weight_frequency);
    features.insert("momentum_consistency_interaction", momentum_consistency);
    features.insert("trend_experience_interaction", trend_experience);
}

fn flag(present: bool) -> f64 {
    if present { 1.0 } else { 0.0 }
}

/// Resolve `prefix_term` to the static column name in the schema
fn column_name(prefix: &str, term: &str) -> &'static str {
    FEATURE_NAMES
        .iter()
        .copied()
        .find(|name| name.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('_')) == Some(term))
        .unwrap_or("")
}

impl FeatureExtractor for AdvancedFeatureExtractor {
    fn name(&self) -> &'static str {
        "advanced"
    }

    fn feature_names(&self) -> &'static [&'static str] {
        FEATURE_NAMES
    }

    fn extract(&self, history: &[WorkoutSession], profile: &UserProfile) -> FeatureFrame {
        let observations = Self::observations(history);
        if observations.is_empty() {
            return FeatureFrame::empty(FEATURE_NAMES);
        }

        debug!(observations = observations.len(), "extracted advanced features");
        FeatureFrame {
            names: FEATURE_NAMES,
            rows: vec![Self::row(&observations, profile)],
        }
    }

    fn latest(&self, history: &[WorkoutSession], profile: &UserProfile) -> Option<FeatureVector> {
        let observations = Self::observations(history);
        if observations.is_empty() {
            return None;
        }
        Some(Self::row(&observations, profile))
    }

    /// Walk-forward samples: the row over observations `0..=i` targets `i + 1`
    fn training_samples(&self, history: &[WorkoutSession], profile: &UserProfile) -> Vec<TrainingSample> {
        let observations = Self::observations(history);
        if observations.len() < 2 {
            return Vec::new();
        }
        (0..observations.len() - 1)
            .map(|i| TrainingSample {
                features: Self::row(&observations[..=i], profile),
                target: observations[i + 1].weight,
            })
            .collect()
    }
}
