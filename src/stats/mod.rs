//! Group statistics on the per-subject RewP score matrix.
//!
//! Columns are the four reward levels in `LL, ML, MH, HH` order. Missing
//! scores are NaN and are omitted per test, never imputed.
pub mod normality;
pub mod parametric;
pub mod report;
pub mod resampling;

pub use normality::{shapiro, ShapiroResult};
pub use parametric::{friedman, rm_anova_oneway, rm_ttest, AnovaResult, FriedmanResult, TTestResult};
pub use report::{run_parametric, run_robustness, ParametricReport, RobustnessReport, RobustnessSettings};
pub use resampling::{
    paired_bootstrap_ci, paired_permutation_test, Alternative, BootstrapResult, PermStat, PermutationResult,
};

/// Level columns compared by the paired tests: `(ML, LL)` and `(MH, HH)`.
pub const COMPARISONS: [(&str, usize, usize); 2] = [("ML-LL", 1, 0), ("MH-HH", 2, 3)];

pub(crate) fn finite(x: &[f64]) -> Vec<f64> {
    x.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Pairwise differences `x1 - x2`, dropping pairs with a NaN on either side.
pub(crate) fn paired_diffs(x1: &[f64], x2: &[f64]) -> Vec<f64> {
    x1.iter().zip(x2).map(|(a, b)| a - b).filter(|d| d.is_finite()).collect()
}

pub(crate) fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample standard deviation (`ddof = 1`).
pub(crate) fn std_dev(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    (x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (x.len() - 1) as f64).sqrt()
}

/// Quantile of the finite values with linear interpolation; NaN if none.
pub(crate) fn nanquantile(x: &[f64], q: f64) -> f64 {
    let mut v = finite(x);
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(f64::total_cmp);
    let h = (v.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(v.len() - 1);
    v[lo] + (h - lo as f64) * (v[hi] - v[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates() {
        let x = [4.0, 1.0, f64::NAN, 3.0, 2.0];
        assert_eq!(nanquantile(&x, 0.0), 1.0);
        assert_eq!(nanquantile(&x, 1.0), 4.0);
        approx::assert_abs_diff_eq!(nanquantile(&x, 0.5), 2.5);
        approx::assert_abs_diff_eq!(nanquantile(&x, 0.025), 1.075, epsilon = 1e-12);
        assert!(nanquantile(&[f64::NAN], 0.5).is_nan());
    }

    #[test]
    fn diffs_drop_incomplete_pairs() {
        let d = paired_diffs(&[1.0, f64::NAN, 5.0], &[0.5, 1.0, 2.0]);
        assert_eq!(d, vec![0.5, 3.0]);
        approx::assert_abs_diff_eq!(std_dev(&[1.0, 2.0, 3.0, 4.0]), 1.2909944487358056, epsilon = 1e-12);
    }
}
