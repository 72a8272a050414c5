//! Paired t-test, one-way repeated-measures ANOVA and the Friedman test.
use ndarray::{ArrayView2, Axis};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};

use super::normality::shapiro;
use super::{finite, mean, paired_diffs, std_dev};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTestResult {
    pub t: f64,
    pub p: f64,
    pub df: i64,
    pub n: usize,
    pub cohen_d: f64,
    /// Shapiro–Wilk p of the paired differences.
    pub normality_p: f64,
}

/// Paired t-test on `x1 - x2`; pairs with a NaN on either side are omitted.
/// `df = n - 1` and `d = mean(diff) / sd(diff)`.
pub fn rm_ttest(x1: &[f64], x2: &[f64]) -> TTestResult {
    let diff = paired_diffs(x1, x2);
    let n = diff.len();
    let normality = shapiro(&diff);
    log::info!(
        "normality of differences: {} (p={:.4})",
        if normality.violated(0.05) { "violated" } else { "met" },
        normality.p
    );

    let df = n as i64 - 1;
    let m = mean(&diff);
    let sd = std_dev(&diff);
    let (t, p) = if n >= 2 {
        let t = m / (sd / (n as f64).sqrt());
        let p = match StudentsT::new(0.0, 1.0, df as f64) {
            Ok(dist) if t.is_finite() => 2.0 * dist.sf(t.abs()),
            Ok(_) if t.is_infinite() => 0.0,
            _ => f64::NAN,
        };
        (t, p)
    } else {
        (f64::NAN, f64::NAN)
    };
    let cohen_d = if sd > 0.0 { m / sd } else { f64::NAN };
    log::info!("t({df}) = {t:.4}, p = {p:.4}, d = {cohen_d:.4}");
    TTestResult { t, p, df, n, cohen_d, normality_p: normality.p }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FriedmanResult {
    pub chi2: f64,
    pub p: f64,
    /// Complete rows used.
    pub n: usize,
}

/// Friedman chi-square over the rows without NaN, tie-corrected. Needs at
/// least 3 complete rows and 3 conditions, otherwise NaN.
pub fn friedman(x: ArrayView2<f64>) -> FriedmanResult {
    let k = x.ncols();
    let rows: Vec<Vec<f64>> = x
        .outer_iter()
        .filter(|r| r.iter().all(|v| v.is_finite()))
        .map(|r| r.to_vec())
        .collect();
    let n = rows.len();
    if n < 3 || k < 3 {
        return FriedmanResult { chi2: f64::NAN, p: f64::NAN, n };
    }

    let mut rank_sums = vec![0.0; k];
    let mut ties = 0.0;
    for row in &rows {
        let (ranks, tie_term) = average_ranks(row);
        for (s, r) in rank_sums.iter_mut().zip(&ranks) {
            *s += r;
        }
        ties += tie_term;
    }
    let (nf, kf) = (n as f64, k as f64);
    let ssbn: f64 = rank_sums.iter().map(|s| s * s).sum();
    let c = 1.0 - ties / (nf * kf * (kf * kf - 1.0));
    let chi2 = (12.0 / (nf * kf * (kf + 1.0)) * ssbn - 3.0 * nf * (kf + 1.0)) / c;
    let p = ChiSquared::new(kf - 1.0).map_or(f64::NAN, |d| d.sf(chi2));
    FriedmanResult { chi2, p, n }
}

/// 1-based ranks with ties averaged, plus `Σ (t³ - t)` over tie groups.
fn average_ranks(row: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| row[a].total_cmp(&row[b]));
    let mut ranks = vec![0.0; row.len()];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && row[order[j]] == row[order[i]] {
            j += 1;
        }
        let avg = (i + j + 1) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = avg;
        }
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }
    (ranks, tie_term)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnovaResult {
    #[serde(rename = "F")]
    pub f: f64,
    pub p: f64,
    pub df1: i64,
    pub df2: i64,
    pub partial_eta2: f64,
    pub generalized_eta2: f64,
    pub friedman_chi2: f64,
    pub friedman_p: f64,
    pub friedman_n: usize,
}

/// One-way repeated-measures ANOVA over `x` `[n_subjects, n_conditions]`.
///
/// Means and sums skip NaN cells; `n` and `k` are the full matrix shape.
pub fn rm_anova_oneway(x: ArrayView2<f64>) -> AnovaResult {
    let (n, k) = x.dim();
    for (i, col) in x.axis_iter(Axis(1)).enumerate() {
        let sw = shapiro(&col.to_vec());
        log::info!(
            "normality of condition {}: {} (p={:.4})",
            i + 1,
            if sw.violated(0.05) { "violated" } else { "met" },
            sw.p
        );
    }

    let cells: Vec<f64> = x.iter().copied().collect();
    let grand = mean(&finite(&cells));
    let nanmean = |v: Vec<f64>| mean(&finite(&v));
    let cond_means: Vec<f64> = x.axis_iter(Axis(1)).map(|c| nanmean(c.to_vec())).collect();
    let subj_means: Vec<f64> = x.axis_iter(Axis(0)).map(|r| nanmean(r.to_vec())).collect();
    let nansum_sq = |v: &[f64]| v.iter().filter(|d| d.is_finite()).map(|d| (d - grand).powi(2)).sum::<f64>();

    let ss_total = nansum_sq(&cells);
    let ss_cond = n as f64 * nansum_sq(&cond_means);
    let ss_subj = k as f64 * nansum_sq(&subj_means);
    let ss_error = ss_total - ss_cond - ss_subj;

    let df1 = k as i64 - 1;
    let df2 = df1 * (n as i64 - 1);
    let f = (ss_cond / df1 as f64) / (ss_error / df2 as f64);
    let p = match FisherSnedecor::new(df1 as f64, df2 as f64) {
        Ok(dist) if f.is_finite() => 1.0 - dist.cdf(f),
        _ => f64::NAN,
    };
    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { f64::NAN };
    let partial_eta2 = ratio(ss_cond, ss_cond + ss_error);
    let generalized_eta2 = ratio(ss_cond, ss_subj + ss_cond + ss_error);
    log::info!("RM ANOVA: F({df1},{df2}) = {f:.4}, p = {p:.4}");
    log::info!("partial eta^2 = {partial_eta2:.4}, generalized eta^2 = {generalized_eta2:.4}");

    let fr = friedman(x);
    log::info!("Friedman: chi2 = {:.4}, p = {:.4} (n={})", fr.chi2, fr.p, fr.n);

    AnovaResult {
        f,
        p,
        df1,
        df2,
        partial_eta2,
        generalized_eta2,
        friedman_chi2: fr.chi2,
        friedman_p: fr.p,
        friedman_n: fr.n,
    }
}
