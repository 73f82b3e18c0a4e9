//! Tree ensembles: bagged random forest and least-squares gradient boosting

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::RegressionTree;
use crate::error::EnsembleError;

/// Average normalized importances of `trees`, renormalized to sum to 1
fn aggregate_importances(trees: &[RegressionTree], n_features: usize) -> Vec<f64> {
    let mut total = vec![0.0; n_features];
    for tree in trees {
        for (acc, v) in total.iter_mut().zip(tree.feature_importances()) {
            *acc += v;
        }
    }
    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        total.iter_mut().for_each(|v| *v /= sum);
    }
    total
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    max_depth: usize,
    seed: u64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth,
            seed,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    /// Fit every tree on a bootstrap sample, considering a third of the
    /// features at each split.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EnsembleError> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(EnsembleError::InsufficientSamples { required: 1, got: 0 });
        }

        let n_features = x.ncols();
        let max_features = n_features.div_ceil(3).max(1);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees = (0..self.n_estimators)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let mut tree = RegressionTree::new(self.max_depth).with_max_features(max_features);
                tree.fit(x, y, &bootstrap, &mut rng);
                tree
            })
            .collect();

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        if self.trees.is_empty() {
            return Array1::zeros(x.nrows());
        }
        let mut sum = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            sum += &tree.predict(x);
        }
        sum / self.trees.len() as f64
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        aggregate_importances(&self.trees, self.n_features)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    seed: u64,
    n_features: usize,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            max_depth,
            seed,
            n_features: 0,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    /// Start from the target mean, then fit each tree to the current residuals.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EnsembleError> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(EnsembleError::InsufficientSamples { required: 1, got: 0 });
        }

        let init = y.mean().unwrap_or(0.0);
        let mut prediction = Array1::from_elem(n_samples, init);
        let indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals = y - &prediction;
            if residuals.iter().all(|r| r.abs() < 1e-12) {
                break;
            }
            let mut tree = RegressionTree::new(self.max_depth);
            tree.fit(x, &residuals, &indices, &mut rng);
            prediction.scaled_add(self.learning_rate, &tree.predict(x));
            trees.push(tree);
        }

        if prediction.iter().any(|v| !v.is_finite()) {
            return Err(EnsembleError::numerical("gradient_boosting", "non-finite training prediction"));
        }

        self.init = init;
        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut prediction = Array1::from_elem(x.nrows(), self.init);
        for tree in &self.trees {
            prediction.scaled_add(self.learning_rate, &tree.predict(x));
        }
        prediction
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        aggregate_importances(&self.trees, self.n_features)
    }
}
