//! Per-set feature rows
//!
//! Every set with a recorded weight is one observation. Row `i` only looks at
//! observations `0..=i`, and its training target is observation `i + 1`.

use tracing::debug;

use super::{FeatureExtractor, FeatureFrame, FeatureVector, TrainingSample};
use crate::workout::{UserProfile, WorkoutSession};

pub const FEATURE_NAMES: &[&str] = &[
    "current_weight",
    "previous_weight",
    "weight_progression",
    "avg_reps",
    "max_weight",
    "min_weight",
    "total_volume",
    "progression_rate",
    "user_weight_ratio",
    "session_number",
];

/// Minimum observations before any row is emitted
const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFeatureExtractor;

impl SimpleFeatureExtractor {
    /// (weight, reps) of every set in log order
    fn observations(history: &[WorkoutSession]) -> Vec<(f64, f64)> {
        history
            .iter()
            .flat_map(|s| &s.exercises)
            .flat_map(|e| &e.sets)
            .map(|set| (set.weight, set.reps))
            .collect()
    }

    /// Features at observation `i`, using nothing after it
    fn row_at(observations: &[(f64, f64)], i: usize, profile: &UserProfile) -> FeatureVector {
        let seen = &observations[..=i];
        let (current_weight, current_reps) = observations[i];

        let avg_reps = seen.iter().map(|(_, r)| r).sum::<f64>() / seen.len() as f64;
        let max_weight = seen.iter().map(|(w, _)| *w).fold(f64::MIN, f64::max);
        let min_weight = seen.iter().map(|(w, _)| *w).fold(f64::MAX, f64::min);

        let (previous_weight, weight_progression, progression_rate) = if i > 0 {
            let previous = observations[i - 1].0;
            let progression = current_weight - previous;
            let rate = if previous > 0.0 { progression / previous } else { 0.0 };
            (previous, progression, rate)
        } else {
            (current_weight, 0.0, 0.0)
        };

        let user_weight_ratio = if profile.body_weight > 0.0 {
            current_weight / profile.body_weight
        } else {
            0.0
        };

        FeatureVector::from_lookup(FEATURE_NAMES, |name| {
            Some(match name {
                "current_weight" => current_weight,
                "previous_weight" => previous_weight,
                "weight_progression" => weight_progression,
                "avg_reps" => avg_reps,
                "max_weight" => max_weight,
                "min_weight" => min_weight,
                "total_volume" => current_weight * current_reps,
                "progression_rate" => progression_rate,
                "user_weight_ratio" => user_weight_ratio,
                "session_number" => (i + 1) as f64,
                _ => return None,
            })
        })
    }
}

impl FeatureExtractor for SimpleFeatureExtractor {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn feature_names(&self) -> &'static [&'static str] {
        FEATURE_NAMES
    }

    fn extract(&self, history: &[WorkoutSession], profile: &UserProfile) -> FeatureFrame {
        let observations = Self::observations(history);
        if observations.len() < MIN_OBSERVATIONS {
            debug!(observations = observations.len(), "not enough weight observations for features");
            return FeatureFrame::empty(FEATURE_NAMES);
        }

        // The last observation is reserved as the implicit target
        let rows = (0..observations.len() - 1)
            .map(|i| Self::row_at(&observations, i, profile))
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), features = FEATURE_NAMES.len(), "extracted simple features");
        FeatureFrame {
            names: FEATURE_NAMES,
            rows,
        }
    }

    fn latest(&self, history: &[WorkoutSession], profile: &UserProfile) -> Option<FeatureVector> {
        let observations = Self::observations(history);
        if observations.len() < MIN_OBSERVATIONS {
            return None;
        }
        Some(Self::row_at(&observations, observations.len() - 1, profile))
    }

    fn training_samples(&self, history: &[WorkoutSession], profile: &UserProfile) -> Vec<TrainingSample> {
        let observations = Self::observations(history);
        if observations.len() < MIN_OBSERVATIONS {
            return Vec::new();
        }
        (0..observations.len() - 1)
            .map(|i| TrainingSample {
                features: Self::row_at(&observations, i, profile),
                target: observations[i + 1].0,
            })
            .collect()
    }
}
