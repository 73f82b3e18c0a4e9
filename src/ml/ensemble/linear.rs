//! Ridge regression (closed form)

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::EnsembleError;
use crate::ml::stats::solve_linear_system;

/// L2-regularized least squares.
///
/// The intercept is not penalized. The penalty assumes comparable feature
/// scales, so callers standardize inputs first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegressor {
    alpha: f64,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.max(1e-8),
            coefficients: Array1::zeros(0),
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EnsembleError> {
        let n_features = x.ncols();
        let y_mean = y.mean().unwrap_or(0.0);
        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));

        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut gram = xc.t().dot(&xc);
        for j in 0..n_features {
            gram[[j, j]] += self.alpha;
        }
        let rhs = xc.t().dot(&yc);

        let coefficients = solve_linear_system(gram, rhs)
            .ok_or_else(|| EnsembleError::numerical("ridge", "singular normal equations"))?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = coefficients;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        if self.coefficients.len() != x.ncols() {
            return Array1::from_elem(x.nrows(), self.intercept);
        }
        x.dot(&self.coefficients) + self.intercept
    }
}
