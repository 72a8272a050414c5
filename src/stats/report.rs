//! Run the group tests on a score matrix and write the result tables.
//!
//! Each table is a CSV with blank cells where a column does not apply, plus
//! a `<stem>_raw.json` with the full result structure.
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use super::parametric::{rm_anova_oneway, rm_ttest, AnovaResult, TTestResult};
use super::resampling::{
    paired_bootstrap_ci, paired_permutation_test, Alternative, BootstrapResult, PermStat, PermutationResult,
};
use super::COMPARISONS;
use crate::error::{PipelineError, Result};
use crate::scores::{sidecar, RewpScores};
use crate::subjects::SubjectId;

const PARAMETRIC_HEADER: [&str; 14] = [
    "test",
    "comparison",
    "stat",
    "df1",
    "df2",
    "p",
    "cohen_d",
    "n",
    "normality_p",
    "partial_eta2",
    "generalized_eta2",
    "friedman_chi2",
    "friedman_p",
    "friedman_n",
];

const ROBUSTNESS_HEADER: [&str; 15] = [
    "method",
    "comparison",
    "stat_type",
    "stat_obs",
    "p_perm",
    "n_perm",
    "n",
    "mean_diff",
    "d",
    "ci_mean_low",
    "ci_mean_high",
    "ci_d_low",
    "ci_d_high",
    "ci",
    "n_boot",
];

fn check_shape(scores: &RewpScores) -> Result<()> {
    if scores.scores.ncols() != 4 {
        return Err(PipelineError::ShapeMismatch(format!(
            "score matrix must be [n_subjects, 4], got {:?}",
            scores.scores.dim()
        )));
    }
    Ok(())
}

fn column(scores: &RewpScores, j: usize) -> Vec<f64> {
    scores.scores.column(j).to_vec()
}

/// A CSV row keyed by header name; absent keys are written blank.
struct Row<'h> {
    header: &'h [&'static str],
    cells: Vec<String>,
}

impl<'h> Row<'h> {
    fn new(header: &'h [&'static str]) -> Self {
        Self { header, cells: vec![String::new(); header.len()] }
    }

    fn set(mut self, key: &str, value: impl ToString) -> Self {
        if let Some(i) = self.header.iter().position(|h| *h == key) {
            self.cells[i] = value.to_string();
        }
        self
    }
}

fn write_table(path: &Path, header: &[&str], rows: &[Row<'_>], raw: &impl Serialize) -> anyhow::Result<PathBuf> {
    let path = path.with_extension("csv");
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut w = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    w.write_record(header)?;
    for row in rows {
        w.write_record(&row.cells)?;
    }
    w.flush()?;

    let raw_path = sidecar(&path, "raw.json");
    std::fs::write(&raw_path, serde_json::to_string_pretty(raw)?)
        .with_context(|| format!("writing {}", raw_path.display()))?;
    log::info!("saved {} -> {}", path.display(), raw_path.display());
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParametricReport {
    pub anova: AnovaResult,
    pub ttest_ml_ll: TTestResult,
    pub ttest_mh_hh: TTestResult,
    pub subjects: Vec<SubjectId>,
}

/// rmANOVA over the four levels, then paired t-tests ML vs LL and MH vs HH.
pub fn run_parametric(scores: &RewpScores) -> Result<ParametricReport> {
    check_shape(scores)?;
    log::info!("RewP score matrix {:?}", scores.scores.dim());
    if let Some(km) = &scores.key_map {
        log::info!("condition mapping: {km:?}");
    }
    log::info!("=== rmANOVA on RewP diffs (LL, ML, MH, HH) ===");
    let anova = rm_anova_oneway(scores.scores.view());

    let [(_, a1, b1), (_, a2, b2)] = COMPARISONS;
    log::info!("=== rmTTest: Mid-Low vs Low-Low ===");
    let ttest_ml_ll = rm_ttest(&column(scores, a1), &column(scores, b1));
    log::info!("=== rmTTest: Mid-High vs High-High ===");
    let ttest_mh_hh = rm_ttest(&column(scores, a2), &column(scores, b2));

    Ok(ParametricReport { anova, ttest_ml_ll, ttest_mh_hh, subjects: scores.subjects.clone() })
}

impl ParametricReport {
    pub fn save(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let h = &PARAMETRIC_HEADER[..];
        let a = &self.anova;
        let mut rows = vec![Row::new(h)
            .set("test", "rmANOVA")
            .set("comparison", "LL/ML/MH/HH")
            .set("stat", a.f)
            .set("df1", a.df1)
            .set("df2", a.df2)
            .set("p", a.p)
            .set("partial_eta2", a.partial_eta2)
            .set("generalized_eta2", a.generalized_eta2)
            .set("friedman_chi2", a.friedman_chi2)
            .set("friedman_p", a.friedman_p)
            .set("friedman_n", a.friedman_n)];
        for ((label, _, _), t) in COMPARISONS.iter().zip([&self.ttest_ml_ll, &self.ttest_mh_hh]) {
            rows.push(
                Row::new(h)
                    .set("test", "rmTTest")
                    .set("comparison", label)
                    .set("stat", t.t)
                    .set("df1", t.df)
                    .set("p", t.p)
                    .set("cohen_d", t.cohen_d)
                    .set("n", t.n)
                    .set("normality_p", t.normality_p),
            );
        }
        write_table(path, h, &rows, self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobustnessSettings {
    pub n_perm: usize,
    pub n_boot: usize,
    pub seed: u64,
    pub stat: PermStat,
    pub alternative: Alternative,
    pub ci: f64,
}

impl Default for RobustnessSettings {
    fn default() -> Self {
        Self {
            n_perm: 10_000,
            n_boot: 10_000,
            seed: 0,
            stat: PermStat::T,
            alternative: Alternative::TwoSided,
            ci: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobustnessReport {
    pub perm_ml_ll: PermutationResult,
    pub perm_mh_hh: PermutationResult,
    pub boot_ml_ll: BootstrapResult,
    pub boot_mh_hh: BootstrapResult,
}

/// Permutation tests and bootstrap intervals for ML−LL (seeded with
/// `seed`) and MH−HH (`seed + 1`).
pub fn run_robustness(scores: &RewpScores, settings: &RobustnessSettings) -> Result<RobustnessReport> {
    check_shape(scores)?;
    let mut perm = Vec::with_capacity(2);
    let mut boot = Vec::with_capacity(2);
    for (k, (label, a, b)) in COMPARISONS.iter().enumerate() {
        let (x1, x2) = (column(scores, *a), column(scores, *b));
        let seed = settings.seed + k as u64;
        let p = paired_permutation_test(&x1, &x2, settings.n_perm, settings.stat, seed, settings.alternative);
        log::info!("{label} permutation: p = {:.4}, stat = {:.4}, n = {}", p.p_perm, p.stat_obs, p.n);
        let bs = paired_bootstrap_ci(&x1, &x2, settings.n_boot, seed, settings.ci)?;
        log::info!(
            "{label} bootstrap: mean diff = {:.4} CI {:?}, d = {:.4} CI {:?}",
            bs.mean_diff,
            bs.ci_mean,
            bs.d,
            bs.ci_d
        );
        perm.push(p);
        boot.push(bs);
    }
    let (perm_mh_hh, perm_ml_ll) = (perm.remove(1), perm.remove(0));
    Ok(RobustnessReport { perm_ml_ll, perm_mh_hh, boot_ml_ll: boot[0], boot_mh_hh: boot[1] })
}

impl RobustnessReport {
    pub fn save(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let h = &ROBUSTNESS_HEADER[..];
        let mut rows = Vec::new();
        for ((label, _, _), p) in COMPARISONS.iter().zip([&self.perm_ml_ll, &self.perm_mh_hh]) {
            rows.push(
                Row::new(h)
                    .set("method", "permutation")
                    .set("comparison", label)
                    .set("stat_type", p.stat.as_str())
                    .set("stat_obs", p.stat_obs)
                    .set("p_perm", p.p_perm)
                    .set("n_perm", p.n_perm)
                    .set("n", p.n),
            );
        }
        for ((label, _, _), b) in COMPARISONS.iter().zip([&self.boot_ml_ll, &self.boot_mh_hh]) {
            rows.push(
                Row::new(h)
                    .set("method", "bootstrap")
                    .set("comparison", label)
                    .set("mean_diff", b.mean_diff)
                    .set("d", b.d)
                    .set("ci_mean_low", b.ci_mean.0)
                    .set("ci_mean_high", b.ci_mean.1)
                    .set("ci_d_low", b.ci_d.0)
                    .set("ci_d_high", b.ci_d.1)
                    .set("ci", b.ci)
                    .set("n_boot", b.n_boot)
                    .set("n", b.n),
            );
        }
        write_table(path, h, &rows, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scores() -> RewpScores {
        RewpScores {
            subjects: (1..=6).map(SubjectId).collect(),
            scores: array![
                [1.0, 2.1, 3.0, 1.2],
                [0.5, 1.9, 2.2, 0.4],
                [1.2, 2.5, 2.9, 1.5],
                [0.1, 1.0, 1.7, 0.2],
                [0.9, 2.2, 3.3, 1.1],
                [0.4, 1.3, 2.0, f64::NAN],
            ],
            key_map: None,
        }
    }

    #[test]
    fn wrong_width_is_rejected() {
        let bad = RewpScores { subjects: vec![SubjectId(1)], scores: ndarray::Array2::zeros((1, 3)), key_map: None };
        assert!(run_parametric(&bad).is_err());
        assert!(run_robustness(&bad, &RobustnessSettings::default()).is_err());
    }

    #[test]
    fn parametric_table_layout() {
        let report = run_parametric(&scores()).unwrap();
        assert_eq!(report.ttest_ml_ll.n, 6);
        assert_eq!(report.ttest_mh_hh.n, 5);
        assert_eq!(report.anova.friedman_n, 5);

        let dir = tempfile::tempdir().unwrap();
        let path = report.save(&dir.path().join("param")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], PARAMETRIC_HEADER.join(","));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("rmANOVA,LL/ML/MH/HH,"));
        assert!(lines[2].starts_with("rmTTest,ML-LL,"));
        // t-test rows leave df2 and the ANOVA columns blank
        let cells: Vec<&str> = lines[3].split(',').collect();
        assert_eq!(cells[4], "");
        assert_eq!(cells[13], "");
        assert!(dir.path().join("param_raw.json").exists());
    }

    #[test]
    fn robustness_table_layout() {
        let settings = RobustnessSettings { n_perm: 200, n_boot: 200, ..Default::default() };
        let report = run_robustness(&scores(), &settings).unwrap();
        assert_eq!(report.perm_ml_ll.n, 6);
        assert_eq!(report.boot_mh_hh.n, 5);

        let dir = tempfile::tempdir().unwrap();
        let path = report.save(&dir.path().join("robust.csv")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("permutation,ML-LL,t,"));
        assert!(lines[3].starts_with("bootstrap,ML-LL,,"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("robust_raw.json")).unwrap()).unwrap();
        assert!(raw["perm_ml_ll"].get("perm_stats").is_none());
        assert_eq!(raw["perm_ml_ll"]["n_perm"], 200);
    }
}
