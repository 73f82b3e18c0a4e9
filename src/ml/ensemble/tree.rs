//! CART regression tree
//!
//! Splits minimize the summed squared error of the two children. The split
//! search sorts each candidate feature once per node and sweeps prefix sums,
//! so a node costs O(features * n log n).

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A node in a regression tree (either a split or a leaf).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        /// Samples with `x[feature] <= threshold` go left
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    /// Leaves have depth 0
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Reduction in summed squared error
    gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Features considered per split; `None` means all
    max_features: Option<usize>,
    importances: Vec<f64>,
}

impl RegressionTree {
    pub fn new(max_depth: usize) -> Self {
        Self {
            root: None,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            importances: Vec::new(),
        }
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf.max(1);
        self
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    /// Grow the tree on the rows of `x` listed in `indices` (repeats allowed).
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize], rng: &mut StdRng) {
        let mut importances = vec![0.0; x.ncols()];
        let root = if indices.is_empty() {
            TreeNode::Leaf {
                value: 0.0,
                n_samples: 0,
            }
        } else {
            self.build(x, y, indices.to_vec(), 0, rng, &mut importances)
        };

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.importances = importances;
        self.root = Some(root);
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        match &self.root {
            Some(root) => x.rows().into_iter().map(|row| root.predict_row(row)).collect(),
            None => Array1::zeros(x.nrows()),
        }
    }

    /// Normalized impurity-decrease importances (empty before fit)
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n = indices.len();
        let leaf = TreeNode::Leaf {
            value: indices.iter().map(|&i| y[i]).sum::<f64>() / n as f64,
            n_samples: n,
        };
        if n < self.min_samples_split || depth >= self.max_depth || sse(y, &indices) < 1e-10 {
            return leaf;
        }

        let Some(split) = self.best_split(x, y, &indices, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);
        if left.len() < self.min_samples_leaf || right.len() < self.min_samples_leaf {
            return leaf;
        }

        importances[split.feature] += split.gain;
        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(x, y, left, depth + 1, rng, importances)),
            right: Box::new(self.build(x, y, right, depth + 1, rng, importances)),
        }
    }

    /// Search a random feature subset first; like CART, keep searching the
    /// remaining features when the subset has no valid split.
    fn best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        match self.max_features.filter(|k| *k < features.len()) {
            Some(k) => {
                features.shuffle(rng);
                let rest = features.split_off(k);
                self.best_split_among(x, y, indices, &features)
                    .or_else(|| self.best_split_among(x, y, indices, &rest))
            }
            None => self.best_split_among(x, y, indices, &features),
        }
    }

    fn best_split_among(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<BestSplit> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let parent_sse = sse(y, indices);
        let min_leaf = self.min_samples_leaf;

        let mut best: Option<BestSplit> = None;
        let mut order = indices.to_vec();
        for &feature in features {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();
            for k in 0..order.len() - 1 {
                let yi = y[order[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let here = x[[order[k], feature]];
                let next = x[[order[k + 1], feature]];
                let n_left = (k + 1) as f64;
                if here == next || k + 1 < min_leaf || order.len() - k - 1 < min_leaf {
                    continue;
                }

                let n_right = n - n_left;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let children_sse =
                    (left_sq - left_sum * left_sum / n_left) + (right_sq - right_sum * right_sum / n_right);
                let gain = parent_sse - children_sse;

                if gain > 1e-12 && best.is_none_or(|b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Summed squared error around the mean of `y[indices]`
fn sse(y: &Array1<f64>, indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
    indices.iter().map(|&i| (y[i] - mean).powi(2)).sum()
}
