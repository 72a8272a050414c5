//! Shapiro–Wilk normality test (Royston 1995, algorithm AS R94).
//!
//! Coefficients and p-value approximations follow `scipy.stats.shapiro`.
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use super::finite;

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// `c[0] + c[1]·x + c[2]·x² + …`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ci| acc * x + ci)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapiroResult {
    pub w: f64,
    pub p: f64,
    pub n: usize,
}

impl ShapiroResult {
    fn not_computable(n: usize) -> Self {
        Self { w: f64::NAN, p: f64::NAN, n }
    }

    /// `p < alpha`; false when not computable.
    pub fn violated(&self, alpha: f64) -> bool {
        self.p < alpha
    }
}

/// Shapiro–Wilk on the finite values of `x`. Fewer than 3 values, or no
/// spread, gives NaN.
pub fn shapiro(x: &[f64]) -> ShapiroResult {
    let mut v = finite(x);
    let n = v.len();
    if n < 3 {
        return ShapiroResult::not_computable(n);
    }
    v.sort_by(f64::total_cmp);
    let mean = v.iter().sum::<f64>() / n as f64;
    let ssq: f64 = v.iter().map(|x| (x - mean).powi(2)).sum();
    if !(ssq > 0.0) {
        return ShapiroResult::not_computable(n);
    }

    let a = coefficients(n);
    let num: f64 = (0..n / 2).map(|i| a[i] * (v[n - 1 - i] - v[i])).sum();
    let w = (num * num / ssq).min(1.0);
    ShapiroResult { w, p: p_value(w, n), n }
}

/// Upper-half coefficients, largest first.
fn coefficients(n: usize) -> Vec<f64> {
    let half = n / 2;
    if n == 3 {
        return vec![std::f64::consts::FRAC_1_SQRT_2];
    }
    let std_normal = Normal::standard();
    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| std_normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;

    let mut a = vec![0.0; half];
    let first_free;
    let fac;
    if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
            / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
        .sqrt();
        a[1] = a2;
        first_free = 2;
    } else {
        fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
        first_free = 1;
    }
    a[0] = a1;
    for i in first_free..half {
        a[i] = -m[i] / fac;
    }
    a
}

fn p_value(w: f64, n: usize) -> f64 {
    if n == 3 {
        const PI6: f64 = 1.909_859_317_102_74;
        const STQR: f64 = 1.047_197_551_196_6;
        return (PI6 * (w.sqrt().asin() - STQR)).max(0.0);
    }
    let an = n as f64;
    let mut y = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return 1e-99;
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (poly(&C5, xx), poly(&C6, xx).exp())
    };
    Normal::standard().sf((y - m) / s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_values_is_nan() {
        let r = shapiro(&[1.0, f64::NAN, 2.0]);
        assert!(r.p.is_nan());
        assert_eq!(r.n, 2);
        assert!(!r.violated(0.05));
    }

    #[test]
    fn three_equally_spaced_is_perfect() {
        let r = shapiro(&[1.0, 2.0, 3.0]);
        approx::assert_abs_diff_eq!(r.w, 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(r.p, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn normal_scores_pass_and_outlier_fails() {
        let n = 20;
        let nd = Normal::standard();
        let x: Vec<f64> = (1..=n).map(|i| nd.inverse_cdf((i as f64 - 0.375) / (n as f64 + 0.25))).collect();
        let r = shapiro(&x);
        assert!(r.w > 0.95, "w = {}", r.w);
        assert!(r.p > 0.5, "p = {}", r.p);

        let mut skewed = vec![1.0; 9];
        skewed.push(50.0);
        skewed[0] = 1.1;
        let r = shapiro(&skewed);
        assert!(r.p < 0.01, "p = {}", r.p);
    }

    #[test]
    fn constant_input_is_nan() {
        assert!(shapiro(&[2.0; 6]).w.is_nan());
    }
}
