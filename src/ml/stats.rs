//! Statistics used by feature extraction and plateau detection
//!
//! Every statistic the pipeline needs lives here as a plain function over
//! `&[f64]`, including the distribution tails behind the p-values, so no
//! caller has to branch on an optional statistics backend.

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};

/// Least-squares line of a series against its index 0..n
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope (t-test with n-2 degrees of freedom)
    pub p_value: f64,
}

/// Kendall rank correlation between two series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KendallTau {
    pub tau: f64,
    pub p_value: f64,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Sample standard deviation (ddof = 1), 0 for fewer than two values
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt()
}

fn central_moment(values: &[f64], order: i32) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64
}

/// Biased sample skewness; 0 for a constant series
pub fn skewness(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m2 = central_moment(values, 2);
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    central_moment(values, 3) / m2.powf(1.5)
}

/// Biased excess kurtosis; 0 for a constant series
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m2 = central_moment(values, 2);
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    central_moment(values, 4) / (m2 * m2) - 3.0
}

/// Percentile with linear interpolation between closest ranks, `q` in [0, 100]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (sorted.len() - 1) as f64 * (q / 100.0).clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// First differences `v[i+1] - v[i]`
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Discrete derivative: central differences inside, one-sided at the edges
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| match i {
            0 => values[1] - values[0],
            i if i == n - 1 => values[n - 1] - values[n - 2],
            i => (values[i + 1] - values[i - 1]) / 2.0,
        })
        .collect()
}

/// Number of sign flips between consecutive first differences
pub fn sign_changes(values: &[f64]) -> usize {
    let signs: Vec<f64> = diff(values).iter().map(|d| sign(*d)).collect();
    signs.windows(2).filter(|w| w[0] != w[1]).count()
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Fit `values` against their index with ordinary least squares.
///
/// Returns `None` for fewer than two points or when the fit fails.
pub fn linear_trend(values: &[f64]) -> Option<LinearTrend> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let x_data: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let records = Array2::from_shape_vec((n, 1), x_data.clone()).ok()?;
    let targets = Array1::from_vec(values.to_vec());
    let dataset = Dataset::new(records, targets);

    let model = LinearRegression::default().fit(&dataset).ok()?;
    let slope = model.params()[0];
    let intercept = model.intercept();

    let y_mean = mean(values);
    let sst: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let sse: f64 = x_data
        .iter()
        .zip(values)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();

    // Constant series: flat line, no evidence of a trend
    if sst <= f64::EPSILON * y_mean.abs().max(1.0) {
        return Some(LinearTrend {
            slope: 0.0,
            intercept: y_mean,
            r_squared: 0.0,
            p_value: 1.0,
        });
    }

    let r_squared = (1.0 - sse / sst).clamp(0.0, 1.0);
    let df = n - 2;
    let p_value = if df == 0 {
        1.0
    } else if sse <= f64::EPSILON * sst {
        // Exact fit with a non-zero slope
        0.0
    } else {
        let x_mean = mean(&x_data);
        let sxx: f64 = x_data.iter().map(|x| (x - x_mean).powi(2)).sum();
        let se_slope = (sse / df as f64).sqrt() / sxx.sqrt();
        student_t_two_sided_p(slope / se_slope, df as f64)
    };

    Some(LinearTrend {
        slope,
        intercept,
        r_squared,
        p_value,
    })
}

/// Kendall's tau-b between `x` and `y` with a two-sided p-value.
///
/// Uses the exact null distribution for untied samples of up to 33 points
/// and the tie-corrected normal approximation otherwise. Returns `None` when
/// either series is constant, where the statistic is undefined.
pub fn kendall_tau(x: &[f64], y: &[f64]) -> Option<KendallTau> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }

    let mut concordant_minus_discordant = 0i64;
    let mut discordant = 0u64;
    for i in 0..n {
        for j in (i + 1)..n {
            let s = sign(x[j] - x[i]) * sign(y[j] - y[i]);
            if s > 0.0 {
                concordant_minus_discordant += 1;
            } else if s < 0.0 {
                concordant_minus_discordant -= 1;
                discordant += 1;
            }
        }
    }

    let (x_tie_pairs, x_t1, x_t2) = tie_counts(&x[..n]);
    let (y_tie_pairs, y_t1, y_t2) = tie_counts(&y[..n]);
    let total = (n * (n - 1) / 2) as f64;

    if x_tie_pairs >= total || y_tie_pairs >= total {
        return None;
    }

    let tau = concordant_minus_discordant as f64
        / ((total - x_tie_pairs).sqrt() * (total - y_tie_pairs).sqrt());

    let no_ties = x_tie_pairs == 0.0 && y_tie_pairs == 0.0;
    let p_value = if no_ties && n <= 33 {
        kendall_exact_p(n, discordant.min(total as u64 - discordant))
    } else if n < 3 {
        1.0
    } else {
        let nf = n as f64;
        let m = nf * (nf - 1.0);
        let var = (m * (2.0 * nf + 5.0) - x_t2 - y_t2) / 18.0
            + (2.0 * x_tie_pairs * y_tie_pairs) / m
            + x_t1 * y_t1 / (9.0 * m * (nf - 2.0));
        if var <= 0.0 {
            return None;
        }
        let z = concordant_minus_discordant as f64 / var.sqrt();
        (2.0 * normal_sf(z.abs())).min(1.0)
    };

    Some(KendallTau {
        tau: tau.clamp(-1.0, 1.0),
        p_value: p_value.clamp(0.0, 1.0),
    })
}

/// Tie statistics of one series: (tied pairs, sum t(t-1)(t-2), sum t(t-1)(2t+5))
fn tie_counts(values: &[f64]) -> (f64, f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut pairs = 0.0;
    let mut t1 = 0.0;
    let mut t2 = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let t = (j - i) as f64;
        if t > 1.0 {
            pairs += t * (t - 1.0) / 2.0;
            t1 += t * (t - 1.0) * (t - 2.0);
            t2 += t * (t - 1.0) * (2.0 * t + 5.0);
        }
        i = j;
    }
    (pairs, t1, t2)
}

/// Exact two-sided p-value: twice the share of permutations of `n` items
/// with at most `c` inversions.
fn kendall_exact_p(n: usize, c: u64) -> f64 {
    let c = c as usize;
    let factorial: f64 = (1..=n).map(|k| k as f64).product();

    let p = if c == 0 {
        2.0 / factorial
    } else if c == 1 {
        2.0 / (factorial / n as f64)
    } else {
        // counts[k] = permutations with exactly k inversions (Mahonian numbers)
        let mut counts = vec![0.0f64; c + 1];
        counts[0] = 1.0;
        counts[1] = 1.0;
        for j in 3..=n {
            let prev = counts.clone();
            for k in 0..=c {
                let lo = (k + 1).saturating_sub(j);
                counts[k] = prev[lo..=k].iter().sum();
            }
        }
        2.0 * counts.iter().sum::<f64>() / factorial
    };
    p.min(1.0)
}

/// Two-sided tail probability of Student's t distribution
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    if df <= 0.0 {
        return 1.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Upper tail of the standard normal distribution
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Complementary error function (Chebyshev fit, relative error < 1.2e-7)
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

/// Natural log of the gamma function (Lanczos approximation)
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.001_208_650_973_866_179,
        -0.000_005_395_239_384_953,
    ];
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for (j, c) in COEFFS.iter().enumerate() {
        ser += c / (x + 1.0 + j as f64);
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized incomplete beta function I_x(a, b)
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta (modified Lentz)
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Mean absolute residual against a local quadratic smoother.
///
/// Each point is compared with a degree-2 least-squares fit over a
/// `window`-sample neighbourhood (centred where possible, pinned to the first
/// or last `window` samples at the edges). Returns 0 when the series is
/// shorter than the window.
pub fn smoothing_residual(values: &[f64], window: usize) -> f64 {
    let n = values.len();
    if window < 3 || n < window {
        return 0.0;
    }

    let half = window / 2;
    let residuals: Vec<f64> = (0..n)
        .map(|i| {
            let start = i.saturating_sub(half).min(n - window);
            let smoothed = quadratic_fit_at(&values[start..start + window], i - start);
            (values[i] - smoothed).abs()
        })
        .collect();
    mean(&residuals)
}

/// Fit `c0 + c1*x + c2*x^2` to `window` (x relative to `at`) and return c0
fn quadratic_fit_at(window: &[f64], at: usize) -> f64 {
    let mut ata = Array2::<f64>::zeros((3, 3));
    let mut aty = Array1::<f64>::zeros(3);
    for (j, y) in window.iter().enumerate() {
        let x = j as f64 - at as f64;
        let row = [1.0, x, x * x];
        for r in 0..3 {
            aty[r] += row[r] * y;
            for c in 0..3 {
                ata[[r, c]] += row[r] * row[c];
            }
        }
    }
    solve_linear_system(ata, aty)
        .map(|coeffs| coeffs[0])
        .unwrap_or(window[at])
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` for a singular (or non-square) system.
pub fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return None;
    }

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_descriptive_stats() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(std_dev(&values), 2.0);
        assert!(approx(sample_std_dev(&values), 2.138_089_935, 1e-6));
        assert_eq!(percentile(&values, 50.0), 4.5);
        assert_eq!(percentile(&values, 25.0), 4.0);
        assert_eq!(percentile(&values, 75.0), 5.5);
    }

    #[test]
    fn test_constant_series_moments_are_zero() {
        let values = [100.0; 6];
        assert_eq!(skewness(&values), 0.0);
        assert_eq!(excess_kurtosis(&values), 0.0);
        assert_eq!(std_dev(&values), 0.0);
    }

    #[test]
    fn test_skewness_sign() {
        assert!(skewness(&[1.0, 1.0, 1.0, 1.0, 10.0]) > 0.0);
        assert!(skewness(&[10.0, 10.0, 10.0, 10.0, 1.0]) < 0.0);
    }

    #[test]
    fn test_gradient_matches_central_differences() {
        let g = gradient(&[1.0, 2.0, 4.0, 7.0, 11.0]);
        assert_eq!(g, vec![1.0, 1.5, 2.5, 3.5, 4.0]);
    }

    #[test]
    fn test_sign_changes() {
        // diffs: +, -, +, 0
        assert_eq!(sign_changes(&[1.0, 2.0, 1.0, 2.0, 2.0]), 3);
        assert_eq!(sign_changes(&[1.0, 2.0, 3.0, 4.0]), 0);
    }

    #[test]
    fn test_linear_trend_perfect_line() {
        let values: Vec<f64> = (0..8).map(|i| 60.0 + 2.5 * i as f64).collect();
        let trend = linear_trend(&values).unwrap();
        assert!(approx(trend.slope, 2.5, 1e-6), "slope {}", trend.slope);
        assert!(approx(trend.intercept, 60.0, 1e-6));
        assert!(trend.r_squared > 0.999);
        assert!(trend.p_value < 1e-6, "p {}", trend.p_value);
    }

    #[test]
    fn test_linear_trend_constant_series() {
        let trend = linear_trend(&[100.0; 10]).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.p_value, 1.0);
    }

    #[test]
    fn test_linear_trend_noisy_flat_series_not_significant() {
        let values = [100.0, 101.0, 99.0, 100.5, 99.5, 100.0, 100.5, 99.5];
        let trend = linear_trend(&values).unwrap();
        assert!(trend.p_value > 0.05, "p {}", trend.p_value);
    }

    #[test]
    fn test_student_t_reference_values() {
        // t = 2.228 with 10 df is the 0.05 two-sided critical value
        assert!(approx(student_t_two_sided_p(2.228, 10.0), 0.05, 1e-3));
        assert!(approx(student_t_two_sided_p(0.0, 5.0), 1.0, 1e-9));
    }

    #[test]
    fn test_normal_sf() {
        assert!(approx(normal_sf(0.0), 0.5, 1e-7));
        assert!(approx(normal_sf(1.959_964), 0.025, 1e-5));
    }

    #[test]
    fn test_kendall_perfect_increase() {
        let x: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let k = kendall_tau(&x, &x).unwrap();
        assert!(approx(k.tau, 1.0, 1e-12));
        // exact: 2 / 8!
        assert!(approx(k.p_value, 2.0 / 40320.0, 1e-12));
    }

    #[test]
    fn test_kendall_exact_small_sample() {
        // one inversion among 4 items: p = 2 * (1 + 3) / 24
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 4.0, 3.0];
        let k = kendall_tau(&x, &y).unwrap();
        assert!(approx(k.tau, 4.0 / 6.0, 1e-12));
        assert!(approx(k.p_value, 2.0 / 6.0, 1e-12), "p {}", k.p_value);
    }

    #[test]
    fn test_kendall_constant_is_unavailable() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(kendall_tau(&x, &[100.0; 10]).is_none());
    }

    #[test]
    fn test_kendall_with_ties_uses_normal_approximation() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = [100.0, 100.0, 102.5, 102.5, 105.0, 105.0, 105.0, 107.5, 107.5, 110.0];
        let k = kendall_tau(&x, &y).unwrap();
        assert!(k.tau > 0.9);
        assert!(k.p_value < 0.01);
    }

    #[test]
    fn test_smoothing_residual_zero_on_quadratic() {
        let values: Vec<f64> = (0..9).map(|i| (i * i) as f64 * 0.5 + 3.0).collect();
        assert!(smoothing_residual(&values, 5) < 1e-9);
    }

    #[test]
    fn test_smoothing_residual_positive_on_zigzag() {
        let values = [100.0, 105.0, 100.0, 105.0, 100.0, 105.0];
        assert!(smoothing_residual(&values, 5) > 0.5);
        assert_eq!(smoothing_residual(&values[..4], 5), 0.0);
    }

    #[test]
    fn test_solve_linear_system() {
        let a = ndarray::array![[2.0, 1.0], [1.0, 3.0]];
        let b = ndarray::array![3.0, 5.0];
        let x = solve_linear_system(a, b).unwrap();
        assert!(approx(x[0], 0.8, 1e-12));
        assert!(approx(x[1], 1.4, 1e-12));

        let singular = ndarray::array![[1.0, 2.0], [2.0, 4.0]];
        assert!(solve_linear_system(singular, ndarray::array![1.0, 2.0]).is_none());
    }
}
