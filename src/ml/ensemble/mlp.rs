//! Single hidden layer perceptron regressor

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::EnsembleError;

/// tanh hidden layer, linear output, full-batch gradient descent on MSE.
///
/// Targets are standardized internally; inputs are expected to be
/// standardized by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpRegressor {
    hidden: usize,
    epochs: usize,
    learning_rate: f64,
    seed: u64,
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array1<f64>,
    b2: f64,
    y_mean: f64,
    y_scale: f64,
}

impl MlpRegressor {
    pub fn new(hidden: usize, epochs: usize, learning_rate: f64, seed: u64) -> Self {
        Self {
            hidden: hidden.max(1),
            epochs,
            learning_rate,
            seed,
            w1: Array2::zeros((0, 0)),
            b1: Array1::zeros(0),
            w2: Array1::zeros(0),
            b2: 0.0,
            y_mean: 0.0,
            y_scale: 1.0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EnsembleError> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(EnsembleError::InsufficientSamples { required: 1, got: 0 });
        }

        let y_mean = y.mean().unwrap_or(0.0);
        let y_std = y.std(0.0);
        let y_scale = if y_std > 1e-12 { y_std } else { 1.0 };
        let ys = (y - y_mean) / y_scale;

        // Glorot uniform init
        let mut rng = StdRng::seed_from_u64(self.seed);
        let limit1 = (6.0 / (n_features + self.hidden) as f64).sqrt();
        let limit2 = (6.0 / (self.hidden + 1) as f64).sqrt();
        let mut w1 = Array2::from_shape_simple_fn((n_features, self.hidden), || rng.gen_range(-limit1..=limit1));
        let mut w2 = Array1::from_shape_simple_fn(self.hidden, || rng.gen_range(-limit2..=limit2));
        let mut b1 = Array1::<f64>::zeros(self.hidden);
        let mut b2 = 0.0;

        let scale = 2.0 / n_samples as f64;
        for _ in 0..self.epochs {
            let h = (x.dot(&w1) + &b1).mapv(f64::tanh);
            let out = h.dot(&w2) + b2;
            let d_out = (out - &ys) * scale;

            let grad_w2 = h.t().dot(&d_out);
            let grad_b2 = d_out.sum();

            let d_hidden = d_out
                .view()
                .insert_axis(Axis(1))
                .dot(&w2.view().insert_axis(Axis(0)))
                * h.mapv(|v| 1.0 - v * v);
            let grad_w1 = x.t().dot(&d_hidden);
            let grad_b1 = d_hidden.sum_axis(Axis(0));

            w1.scaled_add(-self.learning_rate, &grad_w1);
            b1.scaled_add(-self.learning_rate, &grad_b1);
            w2.scaled_add(-self.learning_rate, &grad_w2);
            b2 -= self.learning_rate * grad_b2;
        }

        let finite = w1.iter().chain(&b1).chain(&w2).all(|v| v.is_finite()) && b2.is_finite();
        if !finite {
            return Err(EnsembleError::numerical("mlp", "weights diverged"));
        }

        self.w1 = w1;
        self.b1 = b1;
        self.w2 = w2;
        self.b2 = b2;
        self.y_mean = y_mean;
        self.y_scale = y_scale;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        if self.w1.nrows() != x.ncols() {
            return Array1::from_elem(x.nrows(), self.y_mean);
        }
        let h = (x.dot(&self.w1) + &self.b1).mapv(f64::tanh);
        (h.dot(&self.w2) + self.b2) * self.y_scale + self.y_mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_standardized_line(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| (i as f64 - (n - 1) as f64 / 2.0) / n as f64);
        let y = x.column(0).mapv(|v| 80.0 + 20.0 * v);
        (x, y)
    }

    #[test]
    fn test_learns_linear_trend() {
        let (x, y) = create_standardized_line(30);
        let mut mlp = MlpRegressor::new(8, 500, 0.1, 42);
        mlp.fit(&x, &y).unwrap();

        let pred = mlp.predict(&x);
        let mse = (&pred - &y).mapv(|e| e * e).mean().unwrap();
        let variance = y.var(0.0);
        assert!(mse < variance * 0.2, "mse {mse} vs variance {variance}");
    }

    #[test]
    fn test_constant_target() {
        let x = Array2::from_shape_fn((5, 2), |(i, j)| (i as f64 - 2.0) * 0.5 + j as f64 * 0.1);
        let y = Array1::from_elem(5, 60.0);
        let mut mlp = MlpRegressor::new(4, 300, 0.05, 1);
        mlp.fit(&x, &y).unwrap();

        let pred = mlp.predict(&x);
        assert!(pred.iter().all(|p| p.is_finite()));
        assert!((pred.mean().unwrap() - 60.0).abs() < 0.1);
    }

    #[test]
    fn test_seeded_training_is_deterministic() {
        let (x, y) = create_standardized_line(10);
        let mut a = MlpRegressor::new(4, 100, 0.05, 3);
        let mut b = MlpRegressor::new(4, 100, 0.05, 3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_wrong_width_predicts_mean() {
        let (x, y) = create_standardized_line(10);
        let mut mlp = MlpRegressor::new(4, 10, 0.05, 3);
        mlp.fit(&x, &y).unwrap();
        let wide = Array2::zeros((2, 3));
        assert!(mlp.predict(&wide).iter().all(|p| (p - 80.0).abs() < 1e-9));
    }
}
