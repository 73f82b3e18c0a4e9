//! Feature extraction - workout history to numeric feature vectors
//!
//! Two extractors share one contract:
//! - `SimpleFeatureExtractor`: one row per set observation, look-ahead free
//! - `AdvancedFeatureExtractor`: one aggregate row over the whole history
//!
//! Neither ever fails. Missing or malformed input yields neutral defaults,
//! and every emitted vector carries the extractor's full, fixed schema.

pub mod advanced;
pub mod simple;

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::workout::{UserProfile, WorkoutSession};

pub use advanced::AdvancedFeatureExtractor;
pub use simple::SimpleFeatureExtractor;

/// Named feature values following a fixed schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    names: &'static [&'static str],
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build a vector for `names`, taking each value from `lookup`.
    ///
    /// Names the lookup does not know, and non-finite values, become 0.
    pub fn from_lookup(names: &'static [&'static str], lookup: impl Fn(&str) -> Option<f64>) -> Self {
        let values = names
            .iter()
            .map(|name| lookup(name).filter(|v| v.is_finite()).unwrap_or(0.0))
            .collect();
        Self { names, values }
    }

    pub fn from_map(names: &'static [&'static str], map: &BTreeMap<&str, f64>) -> Self {
        Self::from_lookup(names, |name| map.get(name).copied())
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names.iter().position(|n| *n == name).map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.names
            .iter()
            .zip(&self.values)
            .map(|(n, v)| (n.to_string(), *v))
            .collect()
    }
}

/// A feature row paired with the chronologically next weight
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub target: f64,
}

/// Rows produced by one extraction call
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub names: &'static [&'static str],
    pub rows: Vec<FeatureVector>,
}

impl FeatureFrame {
    pub fn empty(names: &'static [&'static str]) -> Self {
        Self { names, rows: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Row-major matrix, one row per feature vector
    pub fn to_matrix(&self) -> Array2<f64> {
        rows_to_matrix(self.names.len(), self.rows.iter())
    }
}

pub(crate) fn rows_to_matrix<'a>(
    n_features: usize,
    rows: impl ExactSizeIterator<Item = &'a FeatureVector>,
) -> Array2<f64> {
    let n_rows = rows.len();
    let mut matrix = Array2::<f64>::zeros((n_rows, n_features));
    for (i, row) in rows.enumerate() {
        for (j, v) in row.values().iter().enumerate().take(n_features) {
            matrix[[i, j]] = *v;
        }
    }
    matrix
}

/// Contract shared by the feature extractors
pub trait FeatureExtractor: Send + Sync {
    /// Short identifier used in logs and tracking params
    fn name(&self) -> &'static str;

    /// The fixed output schema
    fn feature_names(&self) -> &'static [&'static str];

    /// Feature rows for the given history; empty when there is not enough data
    fn extract(&self, history: &[WorkoutSession], profile: &UserProfile) -> FeatureFrame;

    /// Row describing the most recent state, used for inference
    fn latest(&self, history: &[WorkoutSession], profile: &UserProfile) -> Option<FeatureVector>;

    /// Rows paired with the next observed weight
    fn training_samples(&self, history: &[WorkoutSession], profile: &UserProfile) -> Vec<TrainingSample>;
}

/// Selects the extractor an orchestrator runs with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureMode {
    #[default]
    Simple,
    Advanced,
}

impl FeatureMode {
    pub fn extractor(self) -> Box<dyn FeatureExtractor> {
        match self {
            FeatureMode::Simple => Box::new(SimpleFeatureExtractor),
            FeatureMode::Advanced => Box::new(AdvancedFeatureExtractor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &["a", "b", "c"];

    #[test]
    fn test_from_lookup_fills_missing_and_non_finite() {
        let v = FeatureVector::from_lookup(NAMES, |name| match name {
            "a" => Some(1.5),
            "b" => Some(f64::NAN),
            _ => None,
        });
        assert_eq!(v.values(), &[1.5, 0.0, 0.0]);
        assert_eq!(v.get("a"), Some(1.5));
        assert_eq!(v.get("zzz"), None);
    }

    #[test]
    fn test_frame_to_matrix() {
        let mut map = BTreeMap::new();
        map.insert("a", 1.0);
        map.insert("c", 3.0);
        let frame = FeatureFrame {
            names: NAMES,
            rows: vec![FeatureVector::from_map(NAMES, &map); 2],
        };
        let m = frame.to_matrix();
        assert_eq!(m.shape(), &[2, 3]);
        assert_eq!(m[[1, 2]], 3.0);
        assert_eq!(m[[0, 1]], 0.0);
    }

    #[test]
    fn test_feature_mode_selects_extractor() {
        assert_eq!(FeatureMode::Simple.extractor().name(), "simple");
        assert_eq!(FeatureMode::Advanced.extractor().name(), "advanced");
    }
}
